// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commands which are defined and executed by upstream.
//!
//! Servers only know the names and permission requirements of these commands. When an actor
//! sends one, the permission check happens locally before the message is forwarded.
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use warden_auth::Context;
use warden_events::{EventType, Handler, Priority};
use warden_retry::SingleFlight;

use crate::actor::ActorId;
use crate::error::{CommandError, HiveError};
use crate::events::ReloadEvent;
use crate::hive::Hive;
use crate::messages::{CommandRequest, CommandResponse, CommandSet, CommandSpec};
use crate::transport::{Method, Transport, TransportError, UNKNOWN_REASON};

/// Requirement letting every actor use a command.
const EVERYONE: &str = "*";

type Lookup = HashMap<String, Arc<CommandSpec>>;

/// Registry of upstream commands.
///
/// The command list is loaded in the background when the registry gets created and again on
/// every [`ReloadEvent`], failed loads are retried until they succeed.
pub struct RemoteCommands<T> {
    inner: Arc<CommandsInner<T>>,
    refresh: SingleFlight,
    reload_handler: Handler,
}

impl<T> RemoteCommands<T>
where
    T: Transport,
{
    /// Create the registry and start loading commands.
    ///
    /// Needs to be called from within a tokio runtime.
    pub fn new(hive: Arc<Hive<T>>) -> Result<Self, HiveError> {
        let handle = Handle::try_current()?;
        let (generation, _) = watch::channel(0);

        let inner = Arc::new(CommandsInner {
            hive,
            lookup: Mutex::new(Arc::new(HashMap::new())),
            generation,
        });

        let refresh = {
            let inner = inner.clone();
            let backoff = inner.hive.config().backoff.clone();
            SingleFlight::new("commands", handle, backoff, move || {
                let inner = inner.clone();
                async move { inner.refresh().await }
            })
        };

        let reload_handler = {
            let refresh = refresh.clone();
            Handler::of::<ReloadEvent, _>(Priority::Normal, move |_| {
                if refresh.start() {
                    info!("reloading remote commands");
                }
                Ok(())
            })
        };
        inner
            .hive
            .bus()
            .subscribe(EventType::of::<ReloadEvent>(), reload_handler.clone());

        refresh.start();

        Ok(Self {
            inner,
            refresh,
            reload_handler,
        })
    }

    /// Look up a command by name or alias, ignoring case.
    pub fn get(&self, label: &str) -> Option<Arc<CommandSpec>> {
        self.inner.lookup().get(&label.to_lowercase()).cloned()
    }

    /// All known commands, sorted by name.
    pub fn commands(&self) -> Vec<Arc<CommandSpec>> {
        let lookup = self.inner.lookup();
        let mut commands: Vec<Arc<CommandSpec>> = Vec::new();
        for command in lookup.values() {
            if !commands.iter().any(|known| Arc::ptr_eq(known, command)) {
                commands.push(command.clone());
            }
        }
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    /// Execute a command message like `party invite sam` on behalf of an actor.
    ///
    /// Returns `None` if the first word of the message is not a known command.
    pub async fn execute(
        &self,
        sender: &ActorId,
        message: &str,
        context: &Context,
    ) -> Option<Result<CommandResponse, CommandError>> {
        let label = message.split_whitespace().next()?;
        let command = self.get(label)?;
        Some(self.inner.execute(&command, sender, message, context).await)
    }

    /// Load commands again, unless a load is already in progress.
    pub fn reload(&self) -> bool {
        self.refresh.start()
    }

    /// Counter increased with every successfully loaded command list.
    pub fn generation(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }
}

impl<T> Drop for RemoteCommands<T> {
    fn drop(&mut self) {
        self.refresh.abort();
        self.inner
            .hive
            .bus()
            .unsubscribe(EventType::of::<ReloadEvent>(), &self.reload_handler);
    }
}

impl<T> Debug for RemoteCommands<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCommands")
            .field("labels", &self.inner.lookup().len())
            .field("refresh", &self.refresh)
            .finish()
    }
}

struct CommandsInner<T> {
    hive: Arc<Hive<T>>,
    lookup: Mutex<Arc<Lookup>>,
    generation: watch::Sender<u64>,
}

impl<T> CommandsInner<T>
where
    T: Transport,
{
    async fn refresh(&self) -> Result<(), HiveError> {
        let path = format!("/services/{}/commands", self.hive.config().service_id());
        let set: CommandSet = self.hive.transport().fetch(&path).await?;

        let mut lookup = Lookup::new();
        for command in set.commands {
            let command = Arc::new(command);
            for label in command.aliases.iter().chain([&command.name]) {
                lookup.insert(label.to_lowercase(), command.clone());
            }
        }

        let count = lookup.len();
        *self.lookup.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(lookup);
        self.generation.send_modify(|generation| *generation += 1);
        info!("loaded {} command label(s)", count);

        Ok(())
    }

    async fn execute(
        &self,
        command: &CommandSpec,
        sender: &ActorId,
        message: &str,
        context: &Context,
    ) -> Result<CommandResponse, CommandError> {
        if !command.require.contains(EVERYONE) {
            let subject = self.hive.subject(sender);
            let permitted = !command.require.is_empty()
                && command
                    .require
                    .iter()
                    .all(|permission| subject.has_permission(permission, context));

            if !permitted {
                debug!(%sender, command = %command.name, "missing permission for command");
                return Err(CommandError::PermissionDenied);
            }
        }

        let path = format!(
            "/services/{}/commands/execute",
            self.hive.config().service_id()
        );
        let request = CommandRequest {
            sender: sender.clone(),
            message: message.to_string(),
            context: context.clone(),
        };

        match self
            .hive
            .transport()
            .send(Method::Post, &path, &request)
            .await
        {
            Ok(response) => Ok(response),
            Err(err @ TransportError::Validation { .. }) => Err(CommandError::Rejected(
                err.first_message().unwrap_or(UNKNOWN_REASON).to_string(),
            )),
            Err(err) => {
                warn!(%sender, command = %command.name, "could not execute command: {}", err);
                Err(CommandError::Unreachable(err))
            }
        }
    }
}

impl<T> CommandsInner<T> {
    /// Current lookup table, labels are lowercase.
    fn lookup(&self) -> Arc<Lookup> {
        self.lookup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
