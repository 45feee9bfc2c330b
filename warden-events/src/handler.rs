// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::event::Event;

/// Error returned by failing event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Arc<dyn Fn(&dyn Event) -> Result<(), HandlerError> + Send + Sync>;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(0);

/// Order in which handlers receive an event, from first to last.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    VeryEarly,
    Early,
    #[default]
    Normal,
    Late,
    VeryLate,
}

/// Unique identifier of a handler, shared by all of its clones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Callback receiving events from the event bus.
///
/// Handlers compare equal when they are clones of each other, subscribing the same handler
/// twice to the same event type has no effect.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    priority: Priority,
    ignore_cancelled: bool,
    callback: Callback,
}

impl Handler {
    /// Creates a handler receiving every event it gets subscribed to.
    ///
    /// By default the handler is not called for events which were cancelled already.
    pub fn new<F>(priority: Priority, callback: F) -> Self
    where
        F: Fn(&dyn Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            id: HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)),
            priority,
            ignore_cancelled: true,
            callback: Arc::new(callback),
        }
    }

    /// Creates a handler for events of the concrete type `E`.
    ///
    /// Events of any other type are ignored, which is why typed handlers are usually subscribed
    /// to `E` itself.
    pub fn of<E, F>(priority: Priority, callback: F) -> Self
    where
        E: Event + 'static,
        F: Fn(&E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self::new(priority, move |event| match event.downcast_ref::<E>() {
            Some(event) => callback(event),
            None => {
                trace!(?event, "typed handler received event of another type");
                Ok(())
            }
        })
    }

    /// Sets whether the handler should be skipped for cancelled events.
    pub fn ignore_cancelled(mut self, ignore_cancelled: bool) -> Self {
        self.ignore_cancelled = ignore_cancelled;
        self
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn ignores_cancelled(&self) -> bool {
        self.ignore_cancelled
    }

    /// Calls the handler unless the event got cancelled and the handler ignores those.
    pub fn handle(&self, event: &dyn Event) -> Result<(), HandlerError> {
        if self.ignore_cancelled && event.is_cancelled() {
            return Ok(());
        }

        (self.callback)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

impl Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("ignore_cancelled", &self.ignore_cancelled)
            .finish()
    }
}
