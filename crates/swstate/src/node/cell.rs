//! Published (`Frozen`) and unpublished (`Draft`) state nodes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Storage behind a [`Frozen`] node.
#[derive(Debug)]
pub struct NodeCell<T> {
    generation: u64,
    value: T,
}

/// A published, immutable, reference-counted node.
///
/// Cloning a `Frozen` shares the node. There is no way to obtain `&mut T`
/// from it: a change goes through [`Frozen::modify`], which copies the value
/// into a [`Draft`], and comes back through [`Draft::freeze`].
pub struct Frozen<T>(Arc<NodeCell<T>>);

impl<T> Frozen<T> {
    /// Publishes a fresh node at generation 0.
    pub fn new(value: T) -> Self {
        Frozen(Arc::new(NodeCell {
            generation: 0,
            value,
        }))
    }

    /// Number of copy-on-write rounds this node has been through.
    pub fn generation(&self) -> u64 {
        self.0.generation
    }

    /// Returns true if both handles point at the same published node.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn from_cell(cell: Arc<NodeCell<T>>) -> Self {
        Frozen(cell)
    }

    pub(crate) fn into_cell(self) -> Arc<NodeCell<T>> {
        self.0
    }
}

impl<T: Clone> Frozen<T> {
    /// Copies the node into a draft one generation newer.
    pub fn modify(&self) -> Draft<T> {
        Draft {
            generation: self.0.generation + 1,
            value: self.0.value.clone(),
        }
    }
}

impl<T> Clone for Frozen<T> {
    fn clone(&self) -> Self {
        Frozen(Arc::clone(&self.0))
    }
}

impl<T> Deref for Frozen<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0.value
    }
}

impl<T> AsRef<T> for Frozen<T> {
    fn as_ref(&self) -> &T {
        &self.0.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Frozen<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.value.fmt(f)
    }
}

impl<T: Default> Default for Frozen<T> {
    fn default() -> Self {
        Frozen::new(T::default())
    }
}

/// Value equality. Generations are bookkeeping and do not take part.
impl<T: PartialEq> PartialEq for Frozen<T> {
    fn eq(&self, other: &Self) -> bool {
        Frozen::ptr_eq(self, other) || self.0.value == other.0.value
    }
}

impl<T: Eq> Eq for Frozen<T> {}

impl<T: Serialize> Serialize for Frozen<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.value.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Frozen<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Frozen::new)
    }
}

/// An unpublished node, exclusively owned by the code building the next
/// snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft<T> {
    generation: u64,
    value: T,
}

impl<T> Draft<T> {
    pub fn new(value: T) -> Self {
        Draft {
            generation: 0,
            value,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Publishes the draft. This is the only way to create a `Frozen` from
    /// a modified value.
    pub fn freeze(self) -> Frozen<T> {
        Frozen(Arc::new(NodeCell {
            generation: self.generation,
            value: self.value,
        }))
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Draft<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Draft<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Replaces the node in `slot` with a modified copy when `f` succeeds.
///
/// On error `slot` keeps the original node.
pub fn try_modify<T, R, E, F>(slot: &mut Frozen<T>, f: F) -> Result<R, E>
where
    T: Clone,
    F: FnOnce(&mut T) -> Result<R, E>,
{
    let mut draft = slot.modify();
    let out = f(&mut draft)?;
    *slot = draft.freeze();
    Ok(out)
}

/// Infallible form of [`try_modify`].
pub fn modify<T, R, F>(slot: &mut Frozen<T>, f: F) -> R
where
    T: Clone,
    F: FnOnce(&mut T) -> R,
{
    let mut draft = slot.modify();
    let out = f(&mut draft);
    *slot = draft.freeze();
    out
}
