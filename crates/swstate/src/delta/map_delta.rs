//! Per-collection differences.

use crate::node::{Frozen, NodeKey, NodeMap, ScopedNode, StateEntity};
use crate::scope::SwitchMatcher;

/// One difference between the old and new version of a collection.
#[derive(Debug)]
pub enum DeltaValue<'a, K, V> {
    Changed {
        key: &'a K,
        old: &'a ScopedNode<V>,
        new: &'a ScopedNode<V>,
    },
    Added {
        key: &'a K,
        new: &'a ScopedNode<V>,
    },
    Removed {
        key: &'a K,
        old: &'a ScopedNode<V>,
    },
}

impl<'a, K, V> DeltaValue<'a, K, V> {
    pub fn key(&self) -> &'a K {
        match self {
            DeltaValue::Changed { key, .. }
            | DeltaValue::Added { key, .. }
            | DeltaValue::Removed { key, .. } => *key,
        }
    }

    pub fn old(&self) -> Option<&'a Frozen<V>> {
        match self {
            DeltaValue::Changed { old, .. } | DeltaValue::Removed { old, .. } => Some(&old.node),
            DeltaValue::Added { .. } => None,
        }
    }

    pub fn new(&self) -> Option<&'a Frozen<V>> {
        match self {
            DeltaValue::Changed { new, .. } | DeltaValue::Added { new, .. } => Some(&new.node),
            DeltaValue::Removed { .. } => None,
        }
    }

    /// Scope of the entry after the change, or before it for removals.
    pub fn scope(&self) -> &'a SwitchMatcher {
        match self {
            DeltaValue::Changed { new, .. } | DeltaValue::Added { new, .. } => &new.scope,
            DeltaValue::Removed { old, .. } => &old.scope,
        }
    }
}

/// Difference between two versions of one collection.
///
/// Iterating yields changed and added entries in the new map's order, then
/// removed entries in the old map's order. Identical collections (the same
/// published node) yield nothing without being walked.
pub struct MapDelta<'a, K, V> {
    old: &'a Frozen<NodeMap<K, V>>,
    new: &'a Frozen<NodeMap<K, V>>,
}

impl<'a, K, V> MapDelta<'a, K, V>
where
    K: NodeKey,
    V: StateEntity,
{
    pub fn new(old: &'a Frozen<NodeMap<K, V>>, new: &'a Frozen<NodeMap<K, V>>) -> Self {
        Self { old, new }
    }

    pub fn old_map(&self) -> &'a NodeMap<K, V> {
        self.old
    }

    pub fn new_map(&self) -> &'a NodeMap<K, V> {
        self.new
    }

    pub fn iter(&self) -> DeltaIter<'a, K, V> {
        let unchanged = Frozen::ptr_eq(self.old, self.new);
        DeltaIter {
            old: self.old,
            new: self.new,
            unchanged,
            new_entries: Box::new(self.new.iter()),
            old_entries: Box::new(self.old.iter()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn changed(&self) -> impl Iterator<Item = (&'a K, &'a Frozen<V>, &'a Frozen<V>)> {
        self.iter().filter_map(|d| match d {
            DeltaValue::Changed { key, old, new } => Some((key, &old.node, &new.node)),
            _ => None,
        })
    }

    pub fn added(&self) -> impl Iterator<Item = (&'a K, &'a Frozen<V>)> {
        self.iter().filter_map(|d| match d {
            DeltaValue::Added { key, new } => Some((key, &new.node)),
            _ => None,
        })
    }

    pub fn removed(&self) -> impl Iterator<Item = (&'a K, &'a Frozen<V>)> {
        self.iter().filter_map(|d| match d {
            DeltaValue::Removed { key, old } => Some((key, &old.node)),
            _ => None,
        })
    }
}

impl<'a, K, V> IntoIterator for MapDelta<'a, K, V>
where
    K: NodeKey,
    V: StateEntity,
{
    type Item = DeltaValue<'a, K, V>;
    type IntoIter = DeltaIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

type EntryIter<'a, K, V> = Box<dyn Iterator<Item = (&'a K, &'a ScopedNode<V>)> + 'a>;

/// Lazy, single-pass iterator over a [`MapDelta`].
pub struct DeltaIter<'a, K, V> {
    old: &'a NodeMap<K, V>,
    new: &'a NodeMap<K, V>,
    unchanged: bool,
    new_entries: EntryIter<'a, K, V>,
    old_entries: EntryIter<'a, K, V>,
}

impl<'a, K, V> Iterator for DeltaIter<'a, K, V>
where
    K: NodeKey,
    V: StateEntity,
{
    type Item = DeltaValue<'a, K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.unchanged {
            return None;
        }

        for (key, new) in self.new_entries.by_ref() {
            match self.old.get_scoped(key) {
                Some(old) if old.same_as(new) => continue,
                Some(old) => return Some(DeltaValue::Changed { key, old, new }),
                None => return Some(DeltaValue::Added { key, new }),
            }
        }

        for (key, old) in self.old_entries.by_ref() {
            if !self.new.contains_key(key) {
                return Some(DeltaValue::Removed { key, old });
            }
        }

        None
    }
}
