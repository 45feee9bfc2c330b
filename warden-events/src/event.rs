// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

/// Type which can take part in an event hierarchy, either as a concrete event or as a marker
/// standing for a family of events.
///
/// Handlers subscribed to a type receive all events which list it (directly or transitively)
/// as one of their supertypes.
///
/// ```
/// use warden_events::{EventKind, EventType};
///
/// /// Marker for everything concerning users.
/// struct UserEvent;
///
/// impl EventKind for UserEvent {}
///
/// #[derive(Debug)]
/// struct UserJoined;
///
/// impl EventKind for UserJoined {
///     fn supertypes() -> Vec<EventType> {
///         vec![EventType::of::<UserEvent>()]
///     }
/// }
/// ```
pub trait EventKind: 'static {
    /// Direct supertypes of this type.
    fn supertypes() -> Vec<EventType> {
        Vec::new()
    }
}

/// Root of every event hierarchy, handlers subscribed to it receive every posted event.
#[derive(Debug)]
pub struct AnyEvent;

impl EventKind for AnyEvent {}

/// Runtime descriptor of a type implementing [`EventKind`].
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
    supertypes: fn() -> Vec<EventType>,
}

impl EventType {
    pub fn of<K: EventKind>() -> Self {
        Self {
            id: TypeId::of::<K>(),
            name: std::any::type_name::<K>(),
            supertypes: K::supertypes,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Direct supertypes as declared by the type.
    pub fn supertypes(&self) -> Vec<EventType> {
        (self.supertypes)()
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventType").field(&self.name).finish()
    }
}

/// Upcast helper to allow handlers to downcast events to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Something which can be posted on the event bus.
pub trait Event: AsAny + Debug + Send + Sync {
    /// Events which can be cancelled by handlers return their cancellation state here.
    fn cancellation(&self) -> Option<&dyn Cancellable> {
        None
    }
}

impl<'a> dyn Event + 'a {
    /// Returns the concrete event if it is of type `E`.
    pub fn downcast_ref<E: Event + 'static>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Returns `true` if the event can be cancelled and was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation()
            .is_some_and(|cancellation| cancellation.is_cancelled())
    }
}

pub trait Cancellable {
    fn is_cancelled(&self) -> bool;

    fn set_cancelled(&self, cancelled: bool);
}

/// Cancellation state to embed into cancellable events.
///
/// Handlers only get shared access to events, the state is therefore kept in an atomic.
#[derive(Debug, Default)]
pub struct Cancellation(AtomicBool);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.set_cancelled(true);
    }
}

impl Cancellable for Cancellation {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set_cancelled(&self, cancelled: bool) {
        self.0.store(cancelled, Ordering::Release);
    }
}
