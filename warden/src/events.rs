// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events posted on the network's event bus.
use warden_events::{Cancellable, Cancellation, Event, EventKind, EventType};

use crate::actor::ActorId;

/// Marker for all events concerning users and their data.
pub struct HiveEvent;

impl EventKind for HiveEvent {}

/// Asks every component to load its data from upstream again.
#[derive(Debug, Default)]
pub struct ReloadEvent;

impl EventKind for ReloadEvent {
    fn supertypes() -> Vec<EventType> {
        vec![EventType::of::<HiveEvent>()]
    }
}

impl Event for ReloadEvent {}

/// Posted periodically so components can refresh the data of connected users.
#[derive(Debug, Default)]
pub struct RefreshUsersEvent;

impl EventKind for RefreshUsersEvent {
    fn supertypes() -> Vec<EventType> {
        vec![EventType::of::<HiveEvent>()]
    }
}

impl Event for RefreshUsersEvent {}

/// Asks servers to disconnect the given actors.
#[derive(Debug, Default)]
pub struct UserKickEvent {
    pub actors: Vec<ActorId>,
    pub reason: Option<String>,
    cancellation: Cancellation,
}

impl UserKickEvent {
    pub fn new(actors: Vec<ActorId>) -> Self {
        Self {
            actors,
            ..Default::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl EventKind for UserKickEvent {
    fn supertypes() -> Vec<EventType> {
        vec![EventType::of::<HiveEvent>()]
    }
}

impl Event for UserKickEvent {
    fn cancellation(&self) -> Option<&dyn Cancellable> {
        Some(&self.cancellation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use uuid::Uuid;
    use warden_events::{Event, EventBus, EventType, Handler, Priority};

    use crate::actor::ActorId;

    use super::{HiveEvent, ReloadEvent, UserKickEvent};

    #[test]
    fn hive_events_share_a_supertype() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = seen.clone();
            bus.subscribe(
                EventType::of::<HiveEvent>(),
                Handler::new(Priority::Normal, move |event| {
                    seen.lock().unwrap().push(format!("{event:?}"));
                    Ok(())
                }),
            );
        }

        bus.post(&ReloadEvent);
        bus.post(&UserKickEvent::new(vec![ActorId::Console]));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], "ReloadEvent");
    }

    #[test]
    fn kicks_can_be_cancelled() {
        let bus = EventBus::new();
        let kicked = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            EventType::of::<UserKickEvent>(),
            Handler::of::<UserKickEvent, _>(Priority::Early, |event| {
                if event.reason.is_none() {
                    event.cancellation.cancel();
                }
                Ok(())
            }),
        );

        {
            let kicked = kicked.clone();
            bus.subscribe(
                EventType::of::<UserKickEvent>(),
                Handler::of::<UserKickEvent, _>(Priority::Late, move |event| {
                    kicked.lock().unwrap().extend(event.actors.iter().cloned());
                    Ok(())
                }),
            );
        }

        let actor = ActorId::network(Uuid::from_u128(3), "griefer");
        let silent = UserKickEvent::new(vec![actor.clone()]);
        bus.post(&silent);
        assert!((&silent as &dyn Event).is_cancelled());

        bus.post(&UserKickEvent::new(vec![actor.clone()]).with_reason("griefing"));
        assert_eq!(*kicked.lock().unwrap(), vec![actor]);
    }
}
