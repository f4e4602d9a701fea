//! Sets of switch elements an entry applies to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use swstate_types::SwitchId;

/// Immutable, ordered set of switch ids attached to every state entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchMatcher(BTreeSet<SwitchId>);

impl SwitchMatcher {
    pub fn new(ids: impl IntoIterator<Item = SwitchId>) -> Self {
        SwitchMatcher(ids.into_iter().collect())
    }

    pub fn single(id: SwitchId) -> Self {
        SwitchMatcher(BTreeSet::from([id]))
    }

    pub fn contains(&self, id: SwitchId) -> bool {
        self.0.contains(&id)
    }

    pub fn switch_ids(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn union(&self, other: &SwitchMatcher) -> SwitchMatcher {
        SwitchMatcher(self.0.union(&other.0).copied().collect())
    }

    /// Returns true if at least one switch is in both matchers.
    pub fn intersects(&self, other: &SwitchMatcher) -> bool {
        !self.0.is_disjoint(&other.0)
    }
}

impl FromIterator<SwitchId> for SwitchMatcher {
    fn from_iter<I: IntoIterator<Item = SwitchId>>(iter: I) -> Self {
        SwitchMatcher::new(iter)
    }
}

impl fmt::Display for SwitchMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id=")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}
