//! Reference-counted table that prevents auto-vivification.
//!
//! Reference bookkeeping goes wrong in a familiar way: a release for a key
//! that was never acquired silently creates a zero-count entry, and the
//! count then drifts. `RefCountTable` only creates entries through
//! [`RefCountTable::acquire`]; releases and lookups of unknown keys are
//! reported as errors or `None`, never materialized.

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Error type for RefCountTable operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefTableError {
    #[error("Key not found")]
    KeyNotFound,

    #[error("Reference count underflow")]
    RefCountUnderflow,
}

/// Result of releasing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Other holders remain; carries the new count.
    Remaining(u32),
    /// The last reference was dropped and the entry removed.
    Removed,
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    refs: u32,
}

/// A table of values, each alive for as long as at least one holder
/// references it.
///
/// ```
/// use swstate_common::{RefCountTable, Released};
///
/// let mut table: RefCountTable<&str, ()> = RefCountTable::new();
/// assert!(table.release(&"missing").is_err());
/// assert!(table.ref_count(&"missing").is_none());
///
/// table.acquire("nh1", || ());
/// table.acquire("nh1", || ());
/// assert_eq!(table.ref_count(&"nh1"), Some(2));
/// assert_eq!(table.release(&"nh1"), Ok(Released::Remaining(1)));
/// assert_eq!(table.release(&"nh1"), Ok(Released::Removed));
/// ```
#[derive(Debug, Clone)]
pub struct RefCountTable<K, V> {
    inner: HashMap<K, Slot<V>>,
}

impl<K, V> RefCountTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Returns the value for `key`. **Never creates entries.**
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key).map(|slot| &slot.value)
    }

    /// Takes one reference on `key`, creating the entry with `make` if this
    /// is the first holder. Returns the new count.
    pub fn acquire<F>(&mut self, key: K, make: F) -> u32
    where
        F: FnOnce() -> V,
    {
        let slot = self.inner.entry(key).or_insert_with(|| Slot {
            value: make(),
            refs: 0,
        });
        slot.refs += 1;
        slot.refs
    }

    /// Drops one reference on `key`, removing the entry when the count
    /// reaches zero.
    pub fn release(&mut self, key: &K) -> Result<Released, RefTableError> {
        let slot = self.inner.get_mut(key).ok_or(RefTableError::KeyNotFound)?;
        if slot.refs == 0 {
            return Err(RefTableError::RefCountUnderflow);
        }
        slot.refs -= 1;
        if slot.refs == 0 {
            self.inner.remove(key);
            Ok(Released::Removed)
        } else {
            Ok(Released::Remaining(slot.refs))
        }
    }

    /// Returns the reference count for `key`, `None` when unknown.
    pub fn ref_count(&self, key: &K) -> Option<u32> {
        self.inner.get(key).map(|slot| slot.refs)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V, u32)> {
        self.inner.iter().map(|(k, slot)| (k, &slot.value, slot.refs))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<K, V> Default for RefCountTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_never_creates() {
        let mut table: RefCountTable<String, u32> = RefCountTable::new();

        assert!(table.get(&"missing".to_string()).is_none());
        assert!(table.ref_count(&"missing".to_string()).is_none());
        assert_eq!(
            table.release(&"missing".to_string()),
            Err(RefTableError::KeyNotFound)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_acquire_creates_once() {
        let mut table: RefCountTable<String, u32> = RefCountTable::new();
        let mut made = 0;

        assert_eq!(table.acquire("a".to_string(), || { made += 1; 7 }), 1);
        assert_eq!(table.acquire("a".to_string(), || { made += 1; 9 }), 2);

        assert_eq!(made, 1);
        assert_eq!(table.get(&"a".to_string()), Some(&7));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_removes_at_zero() {
        let mut table: RefCountTable<u32, ()> = RefCountTable::new();
        table.acquire(1, || ());
        table.acquire(1, || ());

        assert_eq!(table.release(&1), Ok(Released::Remaining(1)));
        assert_eq!(table.release(&1), Ok(Released::Removed));
        assert!(!table.contains_key(&1));
        assert_eq!(table.release(&1), Err(RefTableError::KeyNotFound));
    }

    #[test]
    fn test_iter_reports_counts() {
        let mut table: RefCountTable<u32, &str> = RefCountTable::new();
        table.acquire(1, || "one");
        table.acquire(2, || "two");
        table.acquire(2, || "two");

        let mut counts: Vec<(u32, u32)> = table.iter().map(|(k, _, n)| (*k, n)).collect();
        counts.sort();
        assert_eq!(counts, vec![(1, 1), (2, 2)]);
    }
}
