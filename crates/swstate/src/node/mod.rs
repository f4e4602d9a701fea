//! Copy-on-write node primitives for the state tree.
//!
//! Every piece of state is either a [`Frozen`] node, reachable from a
//! published snapshot and never mutated again, or a [`Draft`] owned by the
//! code building the next snapshot. Collections are [`NodeMap`]s whose
//! entries carry the [`SwitchMatcher`](crate::scope::SwitchMatcher) they
//! apply to.

mod cell;
mod map;

pub use cell::{modify, try_modify, Draft, Frozen};
pub(crate) use cell::NodeCell;
pub use map::{NodeKey, NodeMap, ScopedNode, StateEntity};
