// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background retries which never hammer the upstream.
//!
//! [`SingleFlight`] makes sure that at most one instance of an operation is running at any time
//! and keeps retrying it with a jittered, exponential [`Backoff`] until it succeeds.
pub mod backoff;
mod single_flight;

pub use backoff::{Backoff, Config};
pub use single_flight::SingleFlight;
