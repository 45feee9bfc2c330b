// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use moka::sync::Cache;
use serde::de::IgnoredAny;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use warden_auth::{
    AllowAll, Context, ContextExpander, DenyAll, GroupSubject, GroupTable, LiteralExpander,
    Subject,
};
use warden_events::{EventBus, EventType, Handler, Priority};
use warden_retry::SingleFlight;

use crate::actor::ActorId;
use crate::config::HiveConfig;
use crate::error::HiveError;
use crate::events::{RefreshUsersEvent, ReloadEvent};
use crate::messages::{HiveSnapshot, InviteRequest, LoginRequest, LoginResponse};
use crate::session::Session;
use crate::transport::{Method, Transport, TransportError, UNKNOWN_REASON};

/// Sessions and permissions of all actors known to this service.
///
/// Group data is loaded from upstream in the background when the hive gets created and again on
/// every [`ReloadEvent`]. Failed loads are retried until they succeed, in the meantime the
/// previous data stays in use. Before the first load completed no group grants anything.
pub struct Hive<T> {
    inner: Arc<HiveInner<T>>,
    refresh: SingleFlight,
    bus: Arc<EventBus>,
    reload_handler: Handler,
    timer: JoinHandle<()>,
}

impl<T> Hive<T>
where
    T: Transport,
{
    /// Create a hive and start loading groups.
    ///
    /// Needs to be called from within a tokio runtime, background work is spawned onto it.
    pub fn new(config: HiveConfig, transport: T, bus: Arc<EventBus>) -> Result<Self, HiveError> {
        Self::with_expander(config, transport, bus, Arc::new(LiteralExpander))
    }

    /// Create a hive which expands permissions with the given expander before checking them.
    pub fn with_expander(
        config: HiveConfig,
        transport: T,
        bus: Arc<EventBus>,
        expander: Arc<dyn ContextExpander>,
    ) -> Result<Self, HiveError> {
        let handle = Handle::try_current()?;
        let (generation, _) = watch::channel(0);

        let inner = Arc::new(HiveInner {
            sessions: Cache::builder().time_to_idle(config.session_ttl).build(),
            state: Mutex::new(State::default()),
            config,
            transport,
            expander,
            generation,
        });

        let refresh = {
            let inner = inner.clone();
            let backoff = inner.config.backoff.clone();
            SingleFlight::new("hive", handle.clone(), backoff, move || {
                let inner = inner.clone();
                async move { inner.refresh().await }
            })
        };

        let reload_handler = {
            let refresh = refresh.clone();
            Handler::of::<ReloadEvent, _>(Priority::Normal, move |_| {
                if refresh.start() {
                    debug!("reloading user groups");
                }
                Ok(())
            })
        };
        bus.subscribe(EventType::of::<ReloadEvent>(), reload_handler.clone());

        refresh.start();

        let timer = handle.spawn(post_refresh_users(
            Arc::downgrade(&bus),
            inner.config.refresh_users_interval,
        ));

        Ok(Self {
            inner,
            refresh,
            bus,
            reload_handler,
            timer,
        })
    }

    /// Ask upstream to open a session for an actor.
    ///
    /// The session replaces any session cached for the actor before.
    pub async fn login(&self, actor: ActorId) -> Result<Arc<Session>, HiveError> {
        let request = LoginRequest {
            service: self.inner.config.service_id.clone(),
            actor: actor.clone(),
        };

        let response: LoginResponse = self
            .inner
            .transport
            .send(Method::Post, "/sessions", &request)
            .await
            .inspect_err(|err| warn!(%actor, "could not log in: {}", err))?;

        if !response.accepted {
            let message = response
                .reject_message
                .unwrap_or_else(|| UNKNOWN_REASON.to_string());
            debug!(%actor, reason = %message, "session rejected");
            return Err(HiveError::SessionRejected(message));
        }

        let session = Arc::new(response.session);
        self.inner.sessions.insert(actor, session.clone());
        Ok(session)
    }

    /// Cached session of an actor.
    pub fn get(&self, actor: &ActorId) -> Option<Arc<Session>> {
        self.inner.sessions.get(actor)
    }

    /// Drop the cached session of an actor.
    pub fn forget(&self, actor: &ActorId) -> Option<Arc<Session>> {
        self.inner.sessions.remove(actor)
    }

    /// Subject answering permission checks for an actor.
    ///
    /// The console may do everything, actors without a session nothing. Everyone else gets a
    /// subject for the groups of their session.
    pub fn subject(&self, actor: &ActorId) -> Arc<dyn Subject> {
        if actor.is_console() {
            return Arc::new(AllowAll);
        }

        match self.get(actor) {
            Some(session) => self.inner.group_subject(&session),
            None => Arc::new(DenyAll),
        }
    }

    pub fn has_permission(&self, actor: &ActorId, permission: &str, context: &Context) -> bool {
        self.subject(actor).has_permission(permission, context)
    }

    /// Invite a player to the network on behalf of another actor.
    pub async fn invite(&self, name: &str, referrer: ActorId) -> Result<(), HiveError> {
        let path = format!("/invites/{name}");
        let request = InviteRequest { referrer };

        let result: Result<IgnoredAny, _> = self
            .inner
            .transport
            .send(Method::Post, &path, &request)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err @ TransportError::Validation { .. }) => {
                let message = err.first_message().unwrap_or(UNKNOWN_REASON).to_string();
                debug!(invitee = name, reason = %message, "invite rejected");
                Err(HiveError::InviteRejected(message))
            }
            Err(err) => {
                warn!(invitee = name, "could not send invite: {}", err);
                Err(err.into())
            }
        }
    }

    /// Load groups again, unless a load is already in progress.
    ///
    /// Returns `true` if a new load was started.
    pub fn reload(&self) -> bool {
        self.refresh.start()
    }

    /// Counter increased with every successfully loaded group table.
    pub fn generation(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    /// Number of groups in the current table.
    pub fn group_count(&self) -> usize {
        self.inner.state().table.len()
    }
}

impl<T> Hive<T> {
    pub fn config(&self) -> &HiveConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub(crate) fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T> Drop for Hive<T> {
    fn drop(&mut self) {
        self.timer.abort();
        self.refresh.abort();
        self.bus
            .unsubscribe(EventType::of::<ReloadEvent>(), &self.reload_handler);
    }
}

impl<T> Debug for Hive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hive")
            .field("service_id", &self.inner.config.service_id)
            .field("sessions", &self.inner.sessions.entry_count())
            .field("refresh", &self.refresh)
            .finish()
    }
}

struct HiveInner<T> {
    config: HiveConfig,
    transport: T,
    expander: Arc<dyn ContextExpander>,
    /// Sessions expire after not being accessed for a while.
    sessions: Cache<ActorId, Arc<Session>>,
    state: Mutex<State>,
    generation: watch::Sender<u64>,
}

/// Group table and the subjects built from it, replaced together.
#[derive(Default)]
struct State {
    table: Arc<GroupTable>,

    /// Subjects by address of the session they were built for.
    subjects: HashMap<usize, CachedSubject>,
}

struct CachedSubject {
    /// Keeps the session's address from being reused while the entry exists.
    session: Weak<Session>,
    subject: Arc<GroupSubject>,
}

impl<T> HiveInner<T>
where
    T: Transport,
{
    async fn refresh(&self) -> Result<(), HiveError> {
        let path = format!("/services/{}/hive", self.config.service_id);
        let snapshot: HiveSnapshot = self.transport.fetch(&path).await?;
        let table = Arc::new(GroupTable::build(&snapshot.groups)?);
        let count = table.len();

        {
            let mut state = self.state();
            state.table = table;
            state.subjects.clear();
        }

        self.generation.send_modify(|generation| *generation += 1);
        info!(service = %self.config.service_id, "loaded {} user group(s)", count);

        Ok(())
    }

    fn group_subject(&self, session: &Arc<Session>) -> Arc<GroupSubject> {
        let key = Arc::as_ptr(session) as usize;
        let mut state = self.state();

        if let Some(cached) = state.subjects.get(&key) {
            return cached.subject.clone();
        }

        state
            .subjects
            .retain(|_, cached| cached.session.strong_count() > 0);

        let subject = Arc::new(GroupSubject::new(
            state.table.clone(),
            session.groups(),
            self.expander.clone(),
            self.config.permission_ttl,
        ));

        state.subjects.insert(
            key,
            CachedSubject {
                session: Arc::downgrade(session),
                subject: subject.clone(),
            },
        );

        subject
    }
}

impl<T> HiveInner<T> {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Posts a [`RefreshUsersEvent`] once per period until the bus is gone. A zero period disables
/// the event.
async fn post_refresh_users(bus: Weak<EventBus>, period: Duration) {
    if period.is_zero() {
        return;
    }

    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let Some(bus) = bus.upgrade() else {
            return;
        };
        bus.post(&RefreshUsersEvent);
    }
}
