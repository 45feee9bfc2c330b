// SPDX-License-Identifier: MIT OR Apache-2.0

use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use crate::event::{AnyEvent, EventType};

/// Cache of flattened event type hierarchies.
///
/// For every concrete event type the list contains the type itself, all of its supertypes
/// (transitively) and [`AnyEvent`], each exactly once. Lists are computed on first use and kept
/// for the lifetime of the cache.
#[derive(Debug, Default)]
pub struct HierarchyCache {
    cache: RwLock<HashMap<TypeId, Arc<[TypeId]>>>,
}

impl HierarchyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, event_type: EventType) -> Arc<[TypeId]> {
        if let Some(hierarchy) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event_type.id())
        {
            return hierarchy.clone();
        }

        let hierarchy: Arc<[TypeId]> = flatten(event_type).into();
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_type.id())
            .or_insert(hierarchy)
            .clone()
    }
}

/// Breadth-first walk over all declared supertypes.
fn flatten(event_type: EventType) -> Vec<TypeId> {
    let mut seen = HashSet::new();
    let mut hierarchy = Vec::new();
    let mut queue = VecDeque::from([event_type]);

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.id()) {
            continue;
        }

        hierarchy.push(current.id());
        queue.extend(current.supertypes());
    }

    let any = TypeId::of::<AnyEvent>();
    if !seen.contains(&any) {
        hierarchy.push(any);
    }

    hierarchy
}
