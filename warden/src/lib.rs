// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity, sessions and authorization of a network of servers.
//!
//! A [`Hive`] keeps the sessions of all actors connected to one service and answers permission
//! checks for them. Group data lives upstream and is kept up-to-date in the background: loads are
//! retried with backoff until they succeed and triggered again by a [`ReloadEvent`] posted on the
//! shared event bus.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use warden::{ActorId, Hive, HiveConfig, Transport};
//! # use warden_auth::Context;
//! # use warden_events::EventBus;
//! # async fn run(transport: impl Transport) -> Result<(), warden::HiveError> {
//! let bus = Arc::new(EventBus::new());
//! let hive = Hive::new(HiveConfig::new("lobby"), transport, bus)?;
//!
//! let actor = ActorId::Console;
//! if hive.has_permission(&actor, "region.claim.create", &Context::new()) {
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```
mod actor;
mod commands;
mod config;
mod error;
pub mod events;
mod hive;
pub mod messages;
mod notices;
mod session;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod transport;

pub use actor::ActorId;
pub use commands::RemoteCommands;
pub use config::HiveConfig;
pub use error::{CommandError, HiveError};
pub use events::{HiveEvent, RefreshUsersEvent, ReloadEvent, UserKickEvent};
pub use hive::Hive;
pub use notices::Notices;
pub use session::Session;
pub use transport::{Method, Transport, TransportError};
