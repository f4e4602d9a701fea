//! Root of the state tree.

use super::dsf_node::DsfNode;
use super::interface::Interface;
use super::label_fib::LabelForwardingEntry;
use super::mirror::Mirror;
use super::port::Port;
use super::route::{Route, RouteKey};
use super::settings::SwitchSettings;
use super::system_port::SystemPort;
use super::te_flow::{TeFlowEntry, TeFlowKey};
use super::vlan::{AggregatePort, Vlan};
use crate::node::{Frozen, NodeMap};
use serde::{Deserialize, Serialize};
use swstate_types::{
    AggregatePortId, InterfaceId, IpAddress, Label, PortId, RouterId, SwitchId, SystemPortId,
    VlanId,
};

pub type PortMap = NodeMap<PortId, Port>;
pub type SystemPortMap = NodeMap<SystemPortId, SystemPort>;
pub type VlanMap = NodeMap<VlanId, Vlan>;
pub type AggregatePortMap = NodeMap<AggregatePortId, AggregatePort>;
pub type InterfaceMap = NodeMap<InterfaceId, Interface>;
pub type RouteTable = NodeMap<RouteKey, Route>;
pub type LabelForwardingBase = NodeMap<Label, LabelForwardingEntry>;
pub type MirrorMap = NodeMap<String, Mirror>;
pub type TeFlowTable = NodeMap<TeFlowKey, TeFlowEntry>;
pub type DsfNodeMap = NodeMap<SwitchId, DsfNode>;

/// One complete snapshot of switch state.
///
/// Each collection is its own [`Frozen`] node, so a change to one collection
/// copies only that collection and the root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchState {
    pub ports: Frozen<PortMap>,
    pub system_ports: Frozen<SystemPortMap>,
    /// System ports owned by remote fabric elements
    pub remote_system_ports: Frozen<SystemPortMap>,
    pub vlans: Frozen<VlanMap>,
    pub aggregate_ports: Frozen<AggregatePortMap>,
    pub interfaces: Frozen<InterfaceMap>,
    /// Interfaces (and their neighbors) of remote fabric elements
    pub remote_interfaces: Frozen<InterfaceMap>,
    pub routes: Frozen<RouteTable>,
    pub label_fib: Frozen<LabelForwardingBase>,
    pub mirrors: Frozen<MirrorMap>,
    pub te_flows: Frozen<TeFlowTable>,
    pub fabric_nodes: Frozen<DsfNodeMap>,
    pub settings: Frozen<SwitchSettings>,
}

impl SwitchState {
    pub fn new(settings: SwitchSettings) -> Self {
        Self {
            settings: Frozen::new(settings),
            ..Self::default()
        }
    }

    pub fn port(&self, id: PortId) -> Option<&Frozen<Port>> {
        self.ports.get(&id)
    }

    pub fn vlan(&self, id: VlanId) -> Option<&Frozen<Vlan>> {
        self.vlans.get(&id)
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&Frozen<Interface>> {
        self.interfaces.get(&id)
    }

    pub fn label_entry(&self, label: Label) -> Option<&Frozen<LabelForwardingEntry>> {
        self.label_fib.get(&label)
    }

    /// Longest-prefix match among resolved routes of `router_id`.
    pub fn longest_prefix_match(&self, router_id: RouterId, addr: &IpAddress) -> Option<&Frozen<Route>> {
        self.routes
            .iter()
            .filter(|(key, entry)| {
                key.router_id == router_id && key.prefix.contains(addr) && entry.node.is_resolved()
            })
            .max_by_key(|(key, _)| key.prefix.prefix_len())
            .map(|(_, entry)| &entry.node)
    }

    /// Interface whose subnet contains `addr`, if any.
    pub fn connected_interface(&self, router_id: RouterId, addr: &IpAddress) -> Option<&Frozen<Interface>> {
        self.interfaces
            .values()
            .find(|intf| intf.router_id == router_id && intf.is_directly_connected(addr))
    }

    /// Physical egress for a neighbor learned on `desc`, picking the first
    /// member of an aggregate port.
    pub fn physical_port_for(&self, desc: &super::interface::PortDescriptor) -> Option<PortId> {
        use super::interface::PortDescriptor;
        match desc {
            PortDescriptor::Physical(id) => self.ports.contains_key(id).then_some(*id),
            PortDescriptor::Aggregate(id) => self
                .aggregate_ports
                .get(id)
                .and_then(|agg| agg.first_member()),
            PortDescriptor::System(_) => None,
        }
    }
}
