//! Next-hop reference bookkeeping for routes.

use crate::delta::{DeltaValue, StateDelta};
use crate::pipeline::StateObserver;
use crate::state::{NextHop, NextHopSet, SwitchState};
use crate::{debug_log, error_log};
use parking_lot::Mutex;
use swstate_common::{RefCountTable, Released};

/// Counts, for every next hop, the routes whose resolved entry uses it.
///
/// Only the counting is maintained here; nothing is reconciled against
/// hardware next-hop groups.
#[derive(Default)]
pub struct RouteRefTracker {
    refs: Mutex<RefCountTable<NextHop, ()>>,
}

impl RouteRefTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker pre-loaded with the routes of `state`, for observers
    /// registered after a reload.
    pub fn seeded(state: &SwitchState) -> Self {
        let tracker = Self::default();
        {
            let mut table = tracker.refs.lock();
            for route in state.routes.values() {
                Self::acquire(&mut table, route.resolved_next_hops());
            }
        }
        tracker
    }

    /// Number of routes referencing `nh`; zero when none does.
    pub fn ref_count(&self, nh: &NextHop) -> u32 {
        self.refs.lock().ref_count(nh).unwrap_or(0)
    }

    /// Number of distinct referenced next hops.
    pub fn len(&self) -> usize {
        self.refs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.lock().is_empty()
    }

    fn acquire(table: &mut RefCountTable<NextHop, ()>, next_hops: Option<&NextHopSet>) {
        for nh in next_hops.into_iter().flatten() {
            table.acquire(nh.clone(), || ());
        }
    }

    fn release(table: &mut RefCountTable<NextHop, ()>, next_hops: Option<&NextHopSet>) {
        for nh in next_hops.into_iter().flatten() {
            match table.release(nh) {
                Ok(Released::Removed) => {
                    debug_log!("RouteRefTracker", next_hop = %nh, "Next hop no longer referenced");
                }
                Ok(Released::Remaining(_)) => {}
                Err(e) => {
                    error_log!("RouteRefTracker", next_hop = %nh, error = %e, "Released unreferenced next hop");
                }
            }
        }
    }
}

impl StateObserver for RouteRefTracker {
    fn name(&self) -> &str {
        "RouteRefTracker"
    }

    fn state_updated(&self, delta: &StateDelta) {
        let routes = delta.routes();
        if routes.is_empty() {
            return;
        }

        let mut table = self.refs.lock();
        for change in routes.iter() {
            match change {
                DeltaValue::Changed { old, new, .. } => {
                    // Acquire first so a shared next hop never drops to zero.
                    Self::acquire(&mut table, new.node.resolved_next_hops());
                    Self::release(&mut table, old.node.resolved_next_hops());
                }
                DeltaValue::Added { new, .. } => Self::acquire(&mut table, new.node.resolved_next_hops()),
                DeltaValue::Removed { old, .. } => Self::release(&mut table, old.node.resolved_next_hops()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{modify, Frozen};
    use crate::scope::SwitchMatcher;
    use crate::state::{NextHopEntry, Route, RouteKey, RouteTable};
    use pretty_assertions::assert_eq;
    use swstate_types::{AdminDistance, ClientId, RouterId, SwitchId};

    fn nh(addr: &str) -> NextHop {
        NextHop::new(addr.parse().unwrap())
    }

    fn route(prefix: &str, next_hops: &[&str]) -> (RouteKey, Route) {
        let key = RouteKey::new(RouterId::default(), prefix.parse().unwrap());
        let entry = NextHopEntry::new(next_hops.iter().map(|a| nh(a)).collect(), AdminDistance(20));
        (key, Route::new(key, ClientId::BGP, entry))
    }

    fn publish(old: &Frozen<SwitchState>, f: impl FnOnce(&mut RouteTable)) -> Frozen<SwitchState> {
        let mut draft = old.modify();
        modify(&mut draft.routes, f);
        draft.freeze()
    }

    #[test]
    fn test_counts_follow_route_deltas() {
        let tracker = RouteRefTracker::new();
        let scope = SwitchMatcher::single(SwitchId(0));
        let s0 = Frozen::new(SwitchState::default());

        let s1 = publish(&s0, |routes| {
            let (k1, r1) = route("10.1.0.0/16", &["10.0.0.1", "10.0.0.2"]);
            let (k2, r2) = route("10.2.0.0/16", &["10.0.0.1"]);
            routes.add(k1, Frozen::new(r1), scope.clone()).unwrap();
            routes.add(k2, Frozen::new(r2), scope.clone()).unwrap();
        });
        tracker.state_updated(&StateDelta::new(s0, s1.clone()));
        assert_eq!(tracker.ref_count(&nh("10.0.0.1")), 2);
        assert_eq!(tracker.ref_count(&nh("10.0.0.2")), 1);

        let s2 = publish(&s1, |routes| {
            let (k1, r1) = route("10.1.0.0/16", &["10.0.0.1"]);
            routes.update(k1, Frozen::new(r1), scope.clone()).unwrap();
        });
        tracker.state_updated(&StateDelta::new(s1, s2.clone()));
        assert_eq!(tracker.ref_count(&nh("10.0.0.1")), 2);
        assert_eq!(tracker.ref_count(&nh("10.0.0.2")), 0);

        let s3 = publish(&s2, |routes| {
            routes.retain(|_, _| false);
        });
        tracker.state_updated(&StateDelta::new(s2.clone(), s3));
        assert!(tracker.is_empty());

        let reloaded = RouteRefTracker::seeded(&s2);
        assert_eq!(reloaded.ref_count(&nh("10.0.0.1")), 2);
        assert_eq!(reloaded.len(), 1);
    }
}
