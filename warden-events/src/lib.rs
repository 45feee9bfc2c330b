// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous event bus.
//!
//! Events are plain Rust types implementing [`Event`] and [`EventKind`]. Every event type can
//! declare supertypes, a handler subscribed to a supertype receives all of its subtypes as well.
//! [`AnyEvent`] sits at the root of every hierarchy.
//!
//! Handlers run on the posting thread in order of their [`Priority`]. Cancellable events can be
//! stopped from reaching later handlers, unless a handler explicitly asks to see them anyway.
mod bus;
mod event;
mod handler;
mod hierarchy;

pub use bus::{EventBus, Registration, Subscriber};
pub use event::{AnyEvent, AsAny, Cancellable, Cancellation, Event, EventKind, EventType};
pub use handler::{Handler, HandlerError, HandlerId, Priority};
pub use hierarchy::HierarchyCache;
