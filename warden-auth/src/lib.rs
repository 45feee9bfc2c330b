// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group-based permission resolution.
//!
//! Permissions are dot-delimited strings like `region.claim.create`. Groups hold rules for
//! such strings and inherit the rules of their parents, subjects combine the groups of one actor
//! and answer permission checks.
//!
//! Rules come in three flavours:
//!
//! - `build` allows the permission and all of its sub-permissions
//! - `-build` denies it, this wins over any allow
//! - `!build` denies it and stops looking at any other group
//!
//! A single `*` rule allows every permission.
mod context;
mod grant;
pub mod group;
pub mod subject;

pub use context::{Context, ContextExpander, LiteralExpander};
pub use grant::Grant;
pub use group::{Group, GroupDefinition, GroupId, GroupTable, GroupTableError};
pub use subject::{AllowAll, DenyAll, GroupSubject, Subject};
