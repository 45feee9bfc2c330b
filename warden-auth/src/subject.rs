// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decision makers answering "may this actor do X".
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::trace;

use crate::context::{Context, ContextExpander};
use crate::group::{GroupId, GroupTable};
use crate::Grant;

/// Default time after which an unused cached permission decision is dropped.
pub const DEFAULT_PERMISSION_TTL: Duration = Duration::from_secs(10 * 60);

pub trait Subject: Debug + Send + Sync {
    /// Returns `true` if the subject holds the given permission in the given context.
    fn has_permission(&self, permission: &str, context: &Context) -> bool;
}

/// Subject of actors we know nothing about.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenyAll;

impl Subject for DenyAll {
    fn has_permission(&self, _permission: &str, _context: &Context) -> bool {
        false
    }
}

/// Subject of privileged system actors.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl Subject for AllowAll {
    fn has_permission(&self, _permission: &str, _context: &Context) -> bool {
        true
    }
}

/// Subject backed by a snapshot of the groups an actor is a member of.
///
/// Resolved grants are cached per permission string and dropped once they were not accessed for
/// the permission TTL. The cache belongs to the table generation the subject was built from, a
/// new subject needs to be built when the table gets replaced.
pub struct GroupSubject {
    table: Arc<GroupTable>,
    groups: Vec<GroupId>,
    expander: Arc<dyn ContextExpander>,
    grants: Cache<String, Grant>,
}

impl GroupSubject {
    /// Creates a subject for the given group names.
    ///
    /// Names which are not part of the table are ignored.
    pub fn new<'a>(
        table: Arc<GroupTable>,
        names: impl IntoIterator<Item = &'a String>,
        expander: Arc<dyn ContextExpander>,
        permission_ttl: Duration,
    ) -> Self {
        let groups = table.ids(names);

        Self {
            table,
            groups,
            expander,
            grants: Cache::builder().time_to_idle(permission_ttl).build(),
        }
    }

    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    /// Resolve a single, concrete permission string against all groups of this subject.
    pub fn grant(&self, permission: &str) -> Grant {
        let permission = permission.to_lowercase();

        self.grants
            .get_with(permission.clone(), || self.resolve(&permission))
    }

    fn resolve(&self, permission: &str) -> Grant {
        let mut grant = Grant::Unset;

        for group in &self.groups {
            let mut visited = HashSet::new();
            grant = grant.combine(self.table.resolve(*group, permission, &mut visited));
            if grant.is_absolute() {
                break;
            }
        }

        trace!(%permission, %grant, "resolved permission");
        grant
    }
}

impl Subject for GroupSubject {
    fn has_permission(&self, permission: &str, context: &Context) -> bool {
        self.expander
            .expand(permission, context)
            .iter()
            .fold(Grant::Unset, |grant, permission| {
                grant.combine(self.grant(permission))
            })
            .permits()
    }
}

impl Debug for GroupSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .groups
            .iter()
            .filter_map(|id| self.table.group(*id))
            .map(|group| group.name())
            .collect();

        f.debug_struct("GroupSubject")
            .field("groups", &names)
            .field("cached", &self.grants.entry_count())
            .finish()
    }
}
