//! Keyed collections of scoped state nodes.

use super::cell::Frozen;
use crate::error::{Result, StateError};
use crate::scope::SwitchMatcher;
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;

/// A value stored in a [`NodeMap`].
pub trait StateEntity: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Collection name used in error messages and logs.
    const KIND: &'static str;
}

/// Key of a [`NodeMap`].
pub trait NodeKey: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {}

impl<T> NodeKey for T where T: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {}

/// A published node tagged with the switches it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedNode<V> {
    pub node: Frozen<V>,
    pub scope: SwitchMatcher,
}

impl<V: PartialEq> ScopedNode<V> {
    /// Returns true when both entries are the same node, or hold equal
    /// values under the same scope.
    pub fn same_as(&self, other: &ScopedNode<V>) -> bool {
        if self.scope != other.scope {
            return false;
        }
        Frozen::ptr_eq(&self.node, &other.node) || *self.node == *other.node
    }
}

/// Insertion-ordered map of scoped nodes with unique keys.
///
/// Iteration order is only for listing; equality ignores it.
#[derive(Clone)]
pub struct NodeMap<K, V> {
    entries: IndexMap<K, ScopedNode<V>>,
}

impl<K, V> Default for NodeMap<K, V> {
    fn default() -> Self {
        NodeMap {
            entries: IndexMap::new(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for NodeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, &v.node)))
            .finish()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for NodeMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K, V> NodeMap<K, V>
where
    K: NodeKey,
    V: StateEntity,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&Frozen<V>> {
        self.entries.get(key).map(|e| &e.node)
    }

    pub fn get_scoped(&self, key: &K) -> Option<&ScopedNode<V>> {
        self.entries.get(key)
    }

    pub fn scope_of(&self, key: &K) -> Option<&SwitchMatcher> {
        self.entries.get(key).map(|e| &e.scope)
    }

    /// Like [`NodeMap::get`], failing with `NotFound` for a missing key.
    pub fn require(&self, key: &K) -> Result<&Frozen<V>> {
        self.get(key)
            .ok_or_else(|| StateError::not_found(V::KIND, key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &ScopedNode<V>)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Frozen<V>> {
        self.entries.values().map(|e| &e.node)
    }

    /// Entries whose scope shares at least one switch with `scope`.
    pub fn iter_in_scope<'a>(
        &'a self,
        scope: &'a SwitchMatcher,
    ) -> impl Iterator<Item = (&'a K, &'a Frozen<V>)> + 'a {
        self.entries
            .iter()
            .filter(move |(_, e)| e.scope.intersects(scope))
            .map(|(k, e)| (k, &e.node))
    }

    pub fn add(&mut self, key: K, node: Frozen<V>, scope: SwitchMatcher) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(StateError::already_exists(V::KIND, &key));
        }
        self.entries.insert(key, ScopedNode { node, scope });
        Ok(())
    }

    pub fn update(&mut self, key: K, node: Frozen<V>, scope: SwitchMatcher) -> Result<()> {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                *entry = ScopedNode { node, scope };
                Ok(())
            }
            None => Err(StateError::not_found(V::KIND, &key)),
        }
    }

    /// Adds or replaces the entry, returning the previous one.
    pub fn upsert(&mut self, key: K, node: Frozen<V>, scope: SwitchMatcher) -> Option<ScopedNode<V>> {
        self.entries.insert(key, ScopedNode { node, scope })
    }

    pub fn remove(&mut self, key: &K) -> Result<ScopedNode<V>> {
        self.entries
            .shift_remove(key)
            .ok_or_else(|| StateError::not_found(V::KIND, key))
    }

    pub fn remove_if_present(&mut self, key: &K) -> Option<ScopedNode<V>> {
        self.entries.shift_remove(key)
    }

    /// Copies the entry into a draft, applies `f` and reinstalls it under the
    /// same scope. The map is untouched when `f` fails.
    pub fn modify_entry<R, F>(&mut self, key: &K, f: F) -> Result<R>
    where
        F: FnOnce(&mut V) -> Result<R>,
    {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| StateError::not_found(V::KIND, key))?;
        let mut draft = entry.node.modify();
        let out = f(&mut draft)?;
        entry.node = draft.freeze();
        Ok(out)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &Frozen<V>) -> bool,
    {
        self.entries.retain(|k, e| keep(k, &e.node));
    }
}

#[derive(Serialize)]
struct EntryRef<'a, K, V> {
    key: &'a K,
    scope: &'a SwitchMatcher,
    node: &'a V,
}

#[derive(Deserialize)]
struct EntryOwned<K, V> {
    key: K,
    #[serde(default)]
    scope: SwitchMatcher,
    node: V,
}

impl<K: Serialize, V: Serialize> Serialize for NodeMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter().map(|(key, entry)| EntryRef {
            key,
            scope: &entry.scope,
            node: &*entry.node,
        }))
    }
}

impl<'de, K, V> Deserialize<'de> for NodeMap<K, V>
where
    K: Deserialize<'de> + Hash + Eq + fmt::Display,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Vec<EntryOwned<K, V>> = Vec::deserialize(deserializer)?;
        let mut entries = IndexMap::with_capacity(raw.len());
        for entry in raw {
            if entries.contains_key(&entry.key) {
                return Err(D::Error::custom(format!("duplicate key {}", entry.key)));
            }
            entries.insert(
                entry.key,
                ScopedNode {
                    node: Frozen::new(entry.node),
                    scope: entry.scope,
                },
            );
        }
        Ok(NodeMap { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use swstate_types::SwitchId;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    impl StateEntity for Counter {
        const KIND: &'static str = "counter";
    }

    fn scope() -> SwitchMatcher {
        SwitchMatcher::single(SwitchId(0))
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut map: NodeMap<u32, Counter> = NodeMap::new();
        map.add(1, Frozen::new(Counter { hits: 0 }), scope()).unwrap();

        let err = map
            .add(1, Frozen::new(Counter { hits: 5 }), scope())
            .unwrap_err();
        assert_eq!(err, StateError::already_exists("counter", 1));
        assert_eq!(map.get(&1).unwrap().hits, 0);
    }

    #[test]
    fn test_update_and_remove_missing() {
        let mut map: NodeMap<u32, Counter> = NodeMap::new();
        assert!(map.update(9, Frozen::new(Counter { hits: 1 }), scope()).is_err());
        assert!(map.remove(&9).is_err());
        assert!(map.remove_if_present(&9).is_none());
    }

    #[test]
    fn test_modify_entry_keeps_old_node_intact() {
        let mut map: NodeMap<u32, Counter> = NodeMap::new();
        map.add(1, Frozen::new(Counter { hits: 1 }), scope()).unwrap();
        let before = map.get(&1).unwrap().clone();

        map.modify_entry(&1, |c| {
            c.hits += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(before.hits, 1);
        assert_eq!(map.get(&1).unwrap().hits, 2);
        assert_eq!(map.get(&1).unwrap().generation(), 1);
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let mut a: NodeMap<u32, Counter> = NodeMap::new();
        let mut b: NodeMap<u32, Counter> = NodeMap::new();
        a.add(1, Frozen::new(Counter { hits: 1 }), scope()).unwrap();
        a.add(2, Frozen::new(Counter { hits: 2 }), scope()).unwrap();
        b.add(2, Frozen::new(Counter { hits: 2 }), scope()).unwrap();
        b.add(1, Frozen::new(Counter { hits: 1 }), scope()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_iter_in_scope() {
        let mut map: NodeMap<u32, Counter> = NodeMap::new();
        map.add(1, Frozen::new(Counter { hits: 1 }), scope()).unwrap();
        map.add(
            2,
            Frozen::new(Counter { hits: 2 }),
            SwitchMatcher::single(SwitchId(1)),
        )
        .unwrap();

        let on_one: Vec<u32> = map
            .iter_in_scope(&SwitchMatcher::single(SwitchId(1)))
            .map(|(k, _)| *k)
            .collect();
        assert_eq!(on_one, vec![2]);
    }

    #[test]
    fn test_serde_preserves_scope_and_rejects_duplicate_keys() {
        let mut map: NodeMap<u32, Counter> = NodeMap::new();
        map.add(7, Frozen::new(Counter { hits: 3 }), scope()).unwrap();

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"[{"key":7,"scope":[0],"node":{"hits":3}}]"#);
        let back: NodeMap<u32, Counter> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);

        let dup = r#"[{"key":7,"node":{"hits":3}},{"key":7,"node":{"hits":4}}]"#;
        assert!(serde_json::from_str::<NodeMap<u32, Counter>>(dup).is_err());
    }
}
