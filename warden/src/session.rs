// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Snapshot of what the network knows about a logged-in actor.
///
/// Sessions are never changed after they were handed out, a new login replaces them as a whole.
/// The group names are a copy taken at login time and do not follow later changes of the group
/// table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    /// Key of the host the actor connected through, if it sent one.
    #[serde(default)]
    host_key: Option<String>,

    #[serde(default)]
    groups: BTreeSet<String>,
}

impl Session {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            host_key: None,
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_host_key(mut self, host_key: impl Into<String>) -> Self {
        self.host_key = Some(host_key.into());
        self
    }

    pub fn host_key(&self) -> Option<&str> {
        self.host_key.as_deref()
    }

    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Returns `true` if the session lists the group, ignoring case.
    pub fn is_member(&self, group: &str) -> bool {
        let group = group.to_lowercase();
        self.groups.iter().any(|name| name.to_lowercase() == group)
    }
}
