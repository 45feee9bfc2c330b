// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission groups and the graph they form through their parents.
use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::Grant;

/// Rule granting every permission.
pub const WILDCARD: &str = "*";

/// Prefix of rules which deny a permission, overriding any allow.
pub const NEVER_PREFIX: char = '!';

/// Prefix of rules which deny a permission.
pub const DENY_PREFIX: char = '-';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupTableError {
    #[error("group \"{0}\" is defined more than once")]
    DuplicateGroup(String),
}

/// Group as delivered by the upstream data source.
///
/// Parents are referenced by name and get resolved when a [`GroupTable`] is built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct GroupDefinition {
    pub name: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub parents: Vec<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub permissions: Vec<String>,
}

impl GroupDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }
}

/// Handle of a group inside the [`GroupTable`] it was created by.
///
/// Handles are only meaningful for the table generation which issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(NodeIndex);

/// A named set of permission rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    name: String,
    rules: HashSet<String>,
}

impl Group {
    fn new(name: String, rules: &[String]) -> Self {
        Self {
            name,
            rules: rules.iter().map(|rule| rule.to_lowercase()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.rules.contains(rule)
    }

    /// Evaluate the rules of this group only, ignoring any parents.
    ///
    /// The permission is checked from its most specific to its least specific form by dropping
    /// the last dot-delimited segment each step. `!` and `-` rules end the walk immediately,
    /// while a matching allow rule is remembered and the walk continues. This means a broader
    /// deny in the same group overrides a narrower allow.
    ///
    /// Expects a lowercase permission string.
    pub fn local_grant(&self, permission: &str) -> Grant {
        if self.rules.contains(WILDCARD) {
            return Grant::Allow;
        }

        let mut grant = Grant::Unset;
        let mut segment = permission;

        loop {
            if self.has_prefixed_rule(NEVER_PREFIX, segment) {
                return Grant::Never;
            } else if self.has_prefixed_rule(DENY_PREFIX, segment) {
                return Grant::Deny;
            } else if self.rules.contains(segment) {
                grant = Grant::Allow;
            }

            match segment.rfind('.') {
                Some(index) => segment = &segment[..index],
                None => return grant,
            }
        }
    }

    fn has_prefixed_rule(&self, prefix: char, segment: &str) -> bool {
        let mut rule = String::with_capacity(segment.len() + 1);
        rule.push(prefix);
        rule.push_str(segment);
        self.rules.contains(&rule)
    }
}

/// All groups of one refresh generation.
///
/// Groups are stored in a directed graph where every edge points from a group to one of its
/// parents. The graph may contain cycles, resolution keeps track of visited groups.
#[derive(Clone, Debug, Default)]
pub struct GroupTable {
    graph: DiGraph<Group, ()>,
    names: HashMap<String, NodeIndex>,
}

impl GroupTable {
    /// Returns an empty table, every permission resolves to [`Grant::Unset`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from upstream group definitions.
    ///
    /// Group names are matched case-insensitively. Parents referring to groups which do not
    /// exist are skipped.
    pub fn build(definitions: &[GroupDefinition]) -> Result<Self, GroupTableError> {
        let mut table = Self::new();

        for definition in definitions {
            let key = definition.name.to_lowercase();
            if table.names.contains_key(&key) {
                return Err(GroupTableError::DuplicateGroup(definition.name.clone()));
            }

            let node = table
                .graph
                .add_node(Group::new(definition.name.clone(), &definition.permissions));
            table.names.insert(key, node);
        }

        for definition in definitions {
            let child = table.names[&definition.name.to_lowercase()];

            for parent in &definition.parents {
                match table.names.get(&parent.to_lowercase()) {
                    Some(parent) => {
                        table.graph.update_edge(child, *parent, ());
                    }
                    None => {
                        warn!(
                            group = %definition.name,
                            parent = %parent,
                            "ignoring unknown parent group"
                        );
                    }
                }
            }
        }

        Ok(table)
    }

    /// Number of groups in this table.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Look up a group by its (case-insensitive) name.
    pub fn id(&self, name: &str) -> Option<GroupId> {
        self.names.get(&name.to_lowercase()).copied().map(GroupId)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.graph.node_weight(id.0)
    }

    /// Direct parents of a group.
    pub fn parents(&self, id: GroupId) -> impl Iterator<Item = GroupId> + '_ {
        self.graph.neighbors(id.0).map(GroupId)
    }

    /// Map group names to handles of this table, dropping names which do not exist (anymore).
    pub fn ids<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Vec<GroupId> {
        names
            .into_iter()
            .filter_map(|name| {
                let id = self.id(name);
                if id.is_none() {
                    trace!(group = %name, "group not found in current table");
                }
                id
            })
            .collect()
    }

    /// Resolve a permission for a group and all of its ancestors.
    ///
    /// Every group which gets evaluated is added to `visited`, groups already contained in it
    /// are skipped and contribute [`Grant::Unset`]. Traversal stops as soon as the combined
    /// grant is absolute.
    pub fn resolve(&self, id: GroupId, permission: &str, visited: &mut HashSet<GroupId>) -> Grant {
        if !visited.insert(id) {
            return Grant::Unset;
        }

        let Some(group) = self.group(id) else {
            return Grant::Unset;
        };

        let mut grant = group.local_grant(&permission.to_lowercase());
        if grant.is_absolute() {
            return grant;
        }

        for parent in self.parents(id) {
            grant = grant.combine(self.resolve(parent, permission, visited));
            if grant.is_absolute() {
                return grant;
            }
        }

        grant
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::Grant;

    use super::{GroupDefinition, GroupTable, GroupTableError};

    fn group(name: &str, parents: &[&str], permissions: &[&str]) -> GroupDefinition {
        GroupDefinition {
            name: name.to_string(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn resolve(table: &GroupTable, name: &str, permission: &str) -> Grant {
        let id = table.id(name).unwrap();
        table.resolve(id, permission, &mut HashSet::new())
    }

    #[test]
    fn local_rules() {
        let table = GroupTable::build(&[
            group("builder", &[], &["build", "region.claim"]),
            group("guest", &[], &["-build"]),
            group("banned", &[], &["!build"]),
            group("vip", &[], &["*"]),
        ])
        .unwrap();

        assert_eq!(resolve(&table, "builder", "build"), Grant::Allow);
        assert_eq!(resolve(&table, "builder", "build.bricks"), Grant::Allow);
        assert_eq!(resolve(&table, "builder", "region"), Grant::Unset);
        assert_eq!(resolve(&table, "builder", "region.claim.big"), Grant::Allow);
        assert_eq!(resolve(&table, "guest", "build.bricks"), Grant::Deny);
        assert_eq!(resolve(&table, "banned", "build"), Grant::Never);
        assert_eq!(resolve(&table, "vip", "anything.goes"), Grant::Allow);
    }

    #[test]
    fn broader_deny_overrides_narrower_allow() {
        // The walk keeps going after an allow and hits the broader deny rule.
        let table =
            GroupTable::build(&[group("mixed", &[], &["build.bricks", "-build"])]).unwrap();

        assert_eq!(resolve(&table, "mixed", "build.bricks"), Grant::Deny);
    }

    #[test]
    fn case_insensitive() {
        let table = GroupTable::build(&[group("Admin", &[], &["World.Edit"])]).unwrap();

        assert!(table.id("admin").is_some());
        assert!(table.id("ADMIN").is_some());
        assert_eq!(resolve(&table, "admin", "WORLD.EDIT"), Grant::Allow);
    }

    #[test]
    fn inherits_from_parents() {
        let table = GroupTable::build(&[
            group("default", &[], &["chat"]),
            group("member", &["default"], &["build"]),
            group("moderator", &["member"], &["kick", "-build.lava"]),
        ])
        .unwrap();

        assert_eq!(resolve(&table, "moderator", "chat"), Grant::Allow);
        assert_eq!(resolve(&table, "moderator", "build.stone"), Grant::Allow);
        assert_eq!(resolve(&table, "moderator", "build.lava"), Grant::Deny);
        assert_eq!(resolve(&table, "member", "kick"), Grant::Unset);
    }

    #[test]
    fn deny_from_ancestor_beats_local_allow() {
        let table = GroupTable::build(&[
            group("restricted", &[], &["-fly"]),
            group("pilot", &["restricted"], &["fly"]),
        ])
        .unwrap();

        assert_eq!(resolve(&table, "pilot", "fly"), Grant::Deny);
    }

    #[test]
    fn cycles_terminate() {
        const N: usize = 64;

        let definitions: Vec<_> = (0..N)
            .map(|i| {
                let parent = format!("g{}", (i + 1) % N);
                group(&format!("g{}", i), &[parent.as_str(), "g0"], &[])
            })
            .collect();
        let table = GroupTable::build(&definitions).unwrap();

        let mut visited = HashSet::new();
        let grant = table.resolve(table.id("g0").unwrap(), "anything", &mut visited);

        assert_eq!(grant, Grant::Unset);
        assert_eq!(visited.len(), N);
    }

    #[test]
    fn never_stops_traversal() {
        let table = GroupTable::build(&[
            group("root", &[], &["fly"]),
            group("middle", &["root"], &[]),
            group("banned", &["middle"], &["!fly"]),
        ])
        .unwrap();

        let banned = table.id("banned").unwrap();
        let mut visited = HashSet::new();
        assert_eq!(table.resolve(banned, "fly", &mut visited), Grant::Never);

        // No ancestor was consulted after the local "!" rule matched.
        assert_eq!(visited, HashSet::from([banned]));

        // Without a "!" rule the whole ancestry gets walked.
        let mut visited = HashSet::new();
        let middle = table.id("middle").unwrap();
        assert_eq!(table.resolve(middle, "fly", &mut visited), Grant::Allow);
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn never_from_ancestor_stops_traversal() {
        for parents in [["muted", "staff"], ["staff", "muted"]] {
            let table = GroupTable::build(&[
                group("root", &[], &["fly"]),
                group("banned", &["root"], &["!fly"]),
                group("muted", &["banned"], &[]),
                group("staff", &[], &["fly"]),
                group("player", &parents, &[]),
            ])
            .unwrap();

            let player = table.id("player").unwrap();
            let mut visited = HashSet::new();
            assert_eq!(table.resolve(player, "fly", &mut visited), Grant::Never);

            // The walk ended at the "!" rule, whatever branch came first.
            assert!(visited.contains(&table.id("banned").unwrap()));
            assert!(!visited.contains(&table.id("root").unwrap()));
            assert!(visited.len() < table.len());
        }
    }

    #[test]
    fn visited_groups_are_skipped() {
        let table = GroupTable::build(&[group("member", &[], &["build"])]).unwrap();
        let member = table.id("member").unwrap();

        let mut visited = HashSet::from([member]);
        assert_eq!(table.resolve(member, "build", &mut visited), Grant::Unset);
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn unknown_parents_are_ignored() {
        let table = GroupTable::build(&[group("member", &["ghost"], &["build"])]).unwrap();
        let member = table.id("member").unwrap();

        assert_eq!(table.parents(member).count(), 0);
        assert_eq!(resolve(&table, "member", "build"), Grant::Allow);
    }

    #[test]
    fn duplicate_groups() {
        let result = GroupTable::build(&[group("member", &[], &[]), group("MEMBER", &[], &[])]);

        assert_eq!(
            result.unwrap_err(),
            GroupTableError::DuplicateGroup("MEMBER".to_string())
        );
    }

    #[test]
    fn stale_names_are_dropped() {
        let table = GroupTable::build(&[group("member", &[], &[])]).unwrap();
        let names = vec!["member".to_string(), "retired".to_string()];

        assert_eq!(table.ids(&names), vec![table.id("member").unwrap()]);
    }
}
