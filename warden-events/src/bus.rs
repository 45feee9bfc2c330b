// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::TypeId;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{error, trace};

use crate::event::{Event, EventKind, EventType};
use crate::handler::Handler;
use crate::hierarchy::HierarchyCache;

/// Object providing a set of handlers to register on the event bus in one go.
pub trait Subscriber {
    fn subscriptions(&self) -> Vec<(EventType, Handler)>;
}

/// Handlers added to the bus through [`EventBus::register`].
///
/// Pass it to [`EventBus::unregister`] to remove all of them again.
#[derive(Debug)]
#[must_use = "handlers can only be unregistered through their registration"]
pub struct Registration(Vec<(EventType, Handler)>);

impl Registration {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Dispatches events to handlers subscribed to the event's type or any of its supertypes.
///
/// Events are delivered synchronously on the posting thread, in order of handler priority. Posting
/// from within a handler is allowed and dispatches the nested event immediately. Handlers are
/// collected before dispatch starts, changes to subscriptions made by a handler take effect with
/// the next posted event.
///
/// A failing or panicking handler is logged and does not affect delivery to other handlers.
#[derive(Debug, Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<TypeId, Vec<Handler>>>,
    hierarchy: HierarchyCache,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to events of the given type and all of its subtypes.
    pub fn subscribe(&self, event_type: EventType, handler: Handler) {
        let mut handlers = self.write();
        Self::insert(&mut handlers, event_type, handler);
    }

    pub fn subscribe_all(&self, subscriptions: impl IntoIterator<Item = (EventType, Handler)>) {
        let mut handlers = self.write();
        for (event_type, handler) in subscriptions {
            Self::insert(&mut handlers, event_type, handler);
        }
    }

    /// Remove a handler from the given type.
    ///
    /// Returns `true` if the handler was subscribed.
    pub fn unsubscribe(&self, event_type: EventType, handler: &Handler) -> bool {
        let mut handlers = self.write();
        Self::remove(&mut handlers, event_type, handler)
    }

    pub fn unsubscribe_all<'a>(
        &self,
        subscriptions: impl IntoIterator<Item = &'a (EventType, Handler)>,
    ) {
        let mut handlers = self.write();
        for (event_type, handler) in subscriptions {
            Self::remove(&mut handlers, *event_type, handler);
        }
    }

    /// Subscribe all handlers of a subscriber.
    pub fn register(&self, subscriber: &dyn Subscriber) -> Registration {
        let subscriptions = subscriber.subscriptions();
        self.subscribe_all(subscriptions.iter().cloned());
        Registration(subscriptions)
    }

    pub fn unregister(&self, registration: Registration) {
        self.unsubscribe_all(&registration.0);
    }

    /// Number of handlers subscribed to exactly this type.
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.read()
            .get(&event_type.id())
            .map_or(0, |handlers| handlers.len())
    }

    /// Post an event to all handlers subscribed to its type hierarchy.
    pub fn post<E>(&self, event: &E)
    where
        E: Event + EventKind,
    {
        let hierarchy = self.hierarchy.get(EventType::of::<E>());

        let mut dispatching: Vec<Handler> = {
            let handlers = self.read();
            hierarchy
                .iter()
                .filter_map(|type_id| handlers.get(type_id))
                .flatten()
                .cloned()
                .collect()
        };

        // Stable sort, handlers of equal priority keep their subscription order.
        dispatching.sort_by_key(Handler::priority);

        trace!(?event, handlers = dispatching.len(), "posting event");

        for handler in dispatching {
            Self::dispatch(event, &handler);
        }
    }

    fn dispatch(event: &dyn Event, handler: &Handler) {
        match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
            Ok(Ok(())) => (),
            Ok(Err(err)) => {
                error!(?event, ?handler, "could not dispatch event to handler: {}", err);
            }
            Err(_) => {
                error!(?event, ?handler, "handler panicked while dispatching event");
            }
        }
    }

    fn insert(
        handlers: &mut HashMap<TypeId, Vec<Handler>>,
        event_type: EventType,
        handler: Handler,
    ) {
        let entry = handlers.entry(event_type.id()).or_default();
        if !entry.contains(&handler) {
            entry.push(handler);
        }
    }

    fn remove(
        handlers: &mut HashMap<TypeId, Vec<Handler>>,
        event_type: EventType,
        handler: &Handler,
    ) -> bool {
        let Some(entry) = handlers.get_mut(&event_type.id()) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|h| h != handler);
        let removed = entry.len() < before;

        if entry.is_empty() {
            handlers.remove(&event_type.id());
        }

        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Vec<Handler>>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Vec<Handler>>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::event::{AnyEvent, Cancellable, Cancellation, Event, EventKind, EventType};
    use crate::handler::{Handler, Priority};

    use super::{EventBus, Subscriber};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    /// Marker for all chat related events.
    struct ChatEvent;

    impl EventKind for ChatEvent {}

    #[derive(Debug, Default)]
    struct Message {
        cancellation: Cancellation,
    }

    impl EventKind for Message {
        fn supertypes() -> Vec<EventType> {
            vec![EventType::of::<ChatEvent>()]
        }
    }

    impl Event for Message {
        fn cancellation(&self) -> Option<&dyn Cancellable> {
            Some(&self.cancellation)
        }
    }

    #[derive(Debug)]
    struct Weather;

    impl EventKind for Weather {}

    impl Event for Weather {}

    fn recorder(log: &Log, name: &'static str, priority: Priority) -> Handler {
        let log = log.clone();
        Handler::new(priority, move |_| {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    fn entries(log: &Log) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn dispatches_in_priority_order() {
        let bus = EventBus::new();
        let log = Log::default();

        bus.subscribe(EventType::of::<Message>(), recorder(&log, "late", Priority::Late));
        bus.subscribe(EventType::of::<Message>(), recorder(&log, "early", Priority::Early));
        bus.subscribe(EventType::of::<Message>(), recorder(&log, "normal", Priority::Normal));

        for _ in 0..3 {
            bus.post(&Message::default());
        }

        assert_eq!(entries(&log), ["early", "normal", "late"].repeat(3));
    }

    #[test]
    fn supertype_handlers_receive_subtypes() {
        let bus = EventBus::new();
        let log = Log::default();

        bus.subscribe(EventType::of::<ChatEvent>(), recorder(&log, "chat", Priority::Normal));
        bus.subscribe(EventType::of::<Weather>(), recorder(&log, "weather", Priority::Normal));
        bus.subscribe(EventType::of::<AnyEvent>(), recorder(&log, "any", Priority::VeryLate));

        bus.post(&Message::default());
        assert_eq!(entries(&log), ["chat", "any"]);

        bus.post(&Weather);
        assert_eq!(entries(&log), ["chat", "any", "weather", "any"]);
    }

    #[test]
    fn failing_handlers_do_not_stop_dispatch() {
        let bus = EventBus::new();
        let log = Log::default();

        bus.subscribe(
            EventType::of::<Weather>(),
            Handler::new(Priority::VeryEarly, |_| Err("broken".into())),
        );
        bus.subscribe(
            EventType::of::<Weather>(),
            Handler::new(Priority::Early, |_| panic!("handler bug")),
        );
        bus.subscribe(EventType::of::<Weather>(), recorder(&log, "after", Priority::Late));

        bus.post(&Weather);
        assert_eq!(entries(&log), ["after"]);
    }

    #[test]
    fn cancellation_is_checked_per_handler() {
        let bus = EventBus::new();
        let log = Log::default();

        let canceller = {
            let log = log.clone();
            Handler::of::<Message, _>(Priority::Early, move |message| {
                log.lock().unwrap().push("cancel");
                message.cancellation.cancel();
                Ok(())
            })
        };

        bus.subscribe(EventType::of::<Message>(), canceller);
        bus.subscribe(EventType::of::<Message>(), recorder(&log, "skipped", Priority::Normal));
        bus.subscribe(
            EventType::of::<Message>(),
            recorder(&log, "monitor", Priority::Late).ignore_cancelled(false),
        );

        let message = Message::default();
        bus.post(&message);

        assert!(message.cancellation.is_cancelled());
        assert_eq!(entries(&log), ["cancel", "monitor"]);
    }

    #[test]
    fn nested_posts_and_subscriptions() {
        let bus = Arc::new(EventBus::new());
        let log = Log::default();

        let relay = {
            let bus = Arc::downgrade(&bus);
            let log = log.clone();
            Handler::new(Priority::Normal, move |_| {
                let bus = bus.upgrade().ok_or("bus dropped")?;
                bus.subscribe(
                    EventType::of::<Weather>(),
                    recorder(&log, "late subscriber", Priority::Normal),
                );
                bus.post(&Weather);
                Ok(())
            })
        };

        bus.subscribe(EventType::of::<Message>(), relay);
        bus.subscribe(EventType::of::<Weather>(), recorder(&log, "weather", Priority::Early));

        bus.post(&Message::default());
        assert_eq!(entries(&log), ["weather", "late subscriber"]);
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let bus = EventBus::new();
        let log = Log::default();
        let handler = recorder(&log, "weather", Priority::Normal);

        bus.subscribe(EventType::of::<Weather>(), handler.clone());
        bus.subscribe(EventType::of::<Weather>(), handler.clone());
        assert_eq!(bus.handler_count(EventType::of::<Weather>()), 1);

        bus.post(&Weather);
        assert!(bus.unsubscribe(EventType::of::<Weather>(), &handler));
        assert!(!bus.unsubscribe(EventType::of::<Weather>(), &handler));
        bus.post(&Weather);

        assert_eq!(entries(&log), ["weather"]);
    }

    struct Listener {
        log: Log,
    }

    impl Subscriber for Listener {
        fn subscriptions(&self) -> Vec<(EventType, Handler)> {
            vec![
                (
                    EventType::of::<Message>(),
                    recorder(&self.log, "message", Priority::Normal),
                ),
                (
                    EventType::of::<Weather>(),
                    recorder(&self.log, "weather", Priority::Normal),
                ),
            ]
        }
    }

    #[test]
    fn register_and_unregister() {
        let bus = EventBus::new();
        let log = Log::default();

        let registration = bus.register(&Listener { log: log.clone() });
        assert_eq!(registration.len(), 2);

        bus.post(&Message::default());
        bus.post(&Weather);
        bus.unregister(registration);
        bus.post(&Weather);

        assert_eq!(entries(&log), ["message", "weather"]);
        assert_eq!(bus.handler_count(EventType::of::<Weather>()), 0);
    }
}
