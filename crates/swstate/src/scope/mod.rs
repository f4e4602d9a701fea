//! Multi-element scoping.
//!
//! One state tree describes every switch element of the chassis. Each entry
//! carries a [`SwitchMatcher`] naming the elements it applies to, computed by
//! the [`ScopeResolver`] from the switch table.

mod matcher;
mod resolver;

pub use matcher::SwitchMatcher;
pub use resolver::{HasScope, ScopeResolver};

use swstate_types::{SwitchId, VlanId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("No switches configured")]
    NoSwitches,

    #[error("NPU and VOQ switches cannot be mixed in one chassis ({npu} NPU, {voq} VOQ)")]
    ConflictingSwitchTypes { npu: usize, voq: usize },

    #[error("Overlapping {kind} ranges on switches {first} and {second}")]
    OverlappingRanges {
        kind: &'static str,
        first: SwitchId,
        second: SwitchId,
    },

    #[error("No owner found for {0}")]
    NoOwner(String),

    #[error("No {0} switches in this chassis")]
    NoSuchSwitchType(&'static str),

    #[error("Unknown vlan {0}")]
    UnknownVlan(VlanId),
}
