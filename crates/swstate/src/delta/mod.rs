//! Structural differences between two snapshots.
//!
//! A [`StateDelta`] pairs the previous and the new published root. Each
//! accessor returns a [`MapDelta`] for one collection; collections that were
//! not touched share the same node in both snapshots and cost nothing to
//! diff.

mod map_delta;

pub use map_delta::{DeltaIter, DeltaValue, MapDelta};

use crate::node::Frozen;
use crate::state::{
    AggregatePort, DsfNode, Interface, LabelForwardingEntry, Mirror, Port, Route, RouteKey,
    SwitchSettings, SwitchState, SystemPort, TeFlowEntry, TeFlowKey, Vlan,
};
use serde_json::json;
use swstate_types::{
    AggregatePortId, InterfaceId, Label, PortId, SwitchId, SystemPortId, VlanId,
};

#[derive(Debug, Clone)]
pub struct StateDelta {
    old: Frozen<SwitchState>,
    new: Frozen<SwitchState>,
}

impl StateDelta {
    pub fn new(old: Frozen<SwitchState>, new: Frozen<SwitchState>) -> Self {
        Self { old, new }
    }

    pub fn old_state(&self) -> &Frozen<SwitchState> {
        &self.old
    }

    pub fn new_state(&self) -> &Frozen<SwitchState> {
        &self.new
    }

    pub fn ports(&self) -> MapDelta<'_, PortId, Port> {
        MapDelta::new(&self.old.ports, &self.new.ports)
    }

    pub fn system_ports(&self) -> MapDelta<'_, SystemPortId, SystemPort> {
        MapDelta::new(&self.old.system_ports, &self.new.system_ports)
    }

    pub fn remote_system_ports(&self) -> MapDelta<'_, SystemPortId, SystemPort> {
        MapDelta::new(&self.old.remote_system_ports, &self.new.remote_system_ports)
    }

    pub fn vlans(&self) -> MapDelta<'_, VlanId, Vlan> {
        MapDelta::new(&self.old.vlans, &self.new.vlans)
    }

    pub fn aggregate_ports(&self) -> MapDelta<'_, AggregatePortId, AggregatePort> {
        MapDelta::new(&self.old.aggregate_ports, &self.new.aggregate_ports)
    }

    pub fn interfaces(&self) -> MapDelta<'_, InterfaceId, Interface> {
        MapDelta::new(&self.old.interfaces, &self.new.interfaces)
    }

    pub fn remote_interfaces(&self) -> MapDelta<'_, InterfaceId, Interface> {
        MapDelta::new(&self.old.remote_interfaces, &self.new.remote_interfaces)
    }

    pub fn routes(&self) -> MapDelta<'_, RouteKey, Route> {
        MapDelta::new(&self.old.routes, &self.new.routes)
    }

    pub fn label_fib(&self) -> MapDelta<'_, Label, LabelForwardingEntry> {
        MapDelta::new(&self.old.label_fib, &self.new.label_fib)
    }

    pub fn mirrors(&self) -> MapDelta<'_, String, Mirror> {
        MapDelta::new(&self.old.mirrors, &self.new.mirrors)
    }

    pub fn te_flows(&self) -> MapDelta<'_, TeFlowKey, TeFlowEntry> {
        MapDelta::new(&self.old.te_flows, &self.new.te_flows)
    }

    pub fn fabric_nodes(&self) -> MapDelta<'_, SwitchId, DsfNode> {
        MapDelta::new(&self.old.fabric_nodes, &self.new.fabric_nodes)
    }

    /// Old and new settings when they differ.
    pub fn settings(&self) -> Option<(&SwitchSettings, &SwitchSettings)> {
        if Frozen::ptr_eq(&self.old.settings, &self.new.settings)
            || *self.old.settings == *self.new.settings
        {
            None
        } else {
            Some((&*self.old.settings, &*self.new.settings))
        }
    }

    /// Returns true if no collection differs.
    pub fn is_empty(&self) -> bool {
        if Frozen::ptr_eq(&self.old, &self.new) {
            return true;
        }
        self.ports().is_empty()
            && self.system_ports().is_empty()
            && self.remote_system_ports().is_empty()
            && self.vlans().is_empty()
            && self.aggregate_ports().is_empty()
            && self.interfaces().is_empty()
            && self.remote_interfaces().is_empty()
            && self.routes().is_empty()
            && self.label_fib().is_empty()
            && self.mirrors().is_empty()
            && self.te_flows().is_empty()
            && self.fabric_nodes().is_empty()
            && self.settings().is_none()
    }

    /// Number of changed entries per non-empty collection, for logs and
    /// audit records.
    pub fn summary(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        let mut add = |name: &str, count: usize| {
            if count > 0 {
                out.insert(name.to_string(), json!(count));
            }
        };
        add("ports", self.ports().iter().count());
        add("system_ports", self.system_ports().iter().count());
        add("remote_system_ports", self.remote_system_ports().iter().count());
        add("vlans", self.vlans().iter().count());
        add("aggregate_ports", self.aggregate_ports().iter().count());
        add("interfaces", self.interfaces().iter().count());
        add("remote_interfaces", self.remote_interfaces().iter().count());
        add("routes", self.routes().iter().count());
        add("label_fib", self.label_fib().iter().count());
        add("mirrors", self.mirrors().iter().count());
        add("te_flows", self.te_flows().iter().count());
        add("fabric_nodes", self.fabric_nodes().iter().count());
        add("settings", usize::from(self.settings().is_some()));
        serde_json::Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::modify;
    use crate::scope::SwitchMatcher;
    use pretty_assertions::assert_eq;
    use swstate_types::AdminState;

    fn scope() -> SwitchMatcher {
        SwitchMatcher::single(SwitchId(0))
    }

    fn with_ports(ids: &[u32]) -> Frozen<SwitchState> {
        let mut state = SwitchState::default();
        modify(&mut state.ports, |ports| {
            for id in ids {
                let port = Port::new(PortId(*id), format!("eth{}", id));
                ports.add(PortId(*id), Frozen::new(port), scope()).unwrap();
            }
        });
        Frozen::new(state)
    }

    #[test]
    fn test_port_delta() {
        let old = with_ports(&[1, 2]);
        let mut draft = old.modify();
        modify(&mut draft.ports, |ports| {
            ports.remove(&PortId(1)).unwrap();
            ports
                .modify_entry(&PortId(2), |p| {
                    p.admin_state = AdminState::Enabled;
                    Ok(())
                })
                .unwrap();
            ports
                .add(PortId(3), Frozen::new(Port::new(PortId(3), "eth3")), scope())
                .unwrap();
        });
        let delta = StateDelta::new(old, draft.freeze());

        let changed: Vec<PortId> = delta.ports().changed().map(|(k, _, _)| *k).collect();
        let added: Vec<PortId> = delta.ports().added().map(|(k, _)| *k).collect();
        let removed: Vec<PortId> = delta.ports().removed().map(|(k, _)| *k).collect();
        assert_eq!(changed, vec![PortId(2)]);
        assert_eq!(added, vec![PortId(3)]);
        assert_eq!(removed, vec![PortId(1)]);

        assert!(delta.vlans().is_empty());
        assert!(!delta.is_empty());
        assert_eq!(delta.summary(), json!({"ports": 3}));
    }

    #[test]
    fn test_identical_snapshots() {
        let state = with_ports(&[1]);
        let delta = StateDelta::new(state.clone(), state);
        assert!(delta.is_empty());
        assert_eq!(delta.summary(), json!({}));
    }

    #[test]
    fn test_settings_delta() {
        let old = Frozen::new(SwitchState::default());
        let mut draft = old.modify();
        modify(&mut draft.settings, |s| s.arp_timeout_secs = 120);
        let delta = StateDelta::new(old, draft.freeze());

        let (before, after) = delta.settings().unwrap();
        assert_eq!(before.arp_timeout_secs, 60);
        assert_eq!(after.arp_timeout_secs, 120);
    }
}
