//! Routed interfaces and their neighbor tables.

use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use swstate_types::{
    AggregatePortId, InterfaceId, IpAddress, IpPrefix, MacAddress, PortId, RouterId, SystemPortId,
    VlanId,
};

/// What an interface is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Vlan(VlanId),
    Port(PortId),
    SystemPort(SystemPortId),
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceKind::Vlan(id) => write!(f, "vlan {}", id),
            InterfaceKind::Port(id) => write!(f, "port {}", id),
            InterfaceKind::SystemPort(id) => write!(f, "system port {}", id),
        }
    }
}

/// Egress a neighbor was learned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDescriptor {
    Physical(PortId),
    Aggregate(AggregatePortId),
    System(SystemPortId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborState {
    #[default]
    Pending,
    Reachable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub ip: IpAddress,
    pub mac: MacAddress,
    #[serde(default)]
    pub port: Option<PortDescriptor>,
    #[serde(default)]
    pub state: NeighborState,
    /// False for entries learned from a remote fabric element
    #[serde(default = "default_true")]
    pub is_local: bool,
}

fn default_true() -> bool {
    true
}

impl NeighborEntry {
    pub fn reachable(ip: IpAddress, mac: MacAddress, port: PortDescriptor) -> Self {
        Self {
            ip,
            mac,
            port: Some(port),
            state: NeighborState::Reachable,
            is_local: true,
        }
    }

    pub fn pending(ip: IpAddress) -> Self {
        Self {
            ip,
            mac: MacAddress::ZERO,
            port: None,
            state: NeighborState::Pending,
            is_local: true,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state == NeighborState::Reachable && self.port.is_some()
    }
}

fn default_mtu() -> u32 {
    9000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub id: InterfaceId,
    #[serde(default)]
    pub name: String,
    pub kind: InterfaceKind,
    #[serde(default)]
    pub router_id: RouterId,
    #[serde(default)]
    pub mac: MacAddress,
    /// Interface addresses with their prefix lengths
    #[serde(default)]
    pub addresses: BTreeMap<IpAddress, u8>,
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default)]
    pub neighbors: BTreeMap<IpAddress, NeighborEntry>,
}

impl Interface {
    pub fn new(id: InterfaceId, kind: InterfaceKind) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            router_id: RouterId::default(),
            mac: MacAddress::ZERO,
            addresses: BTreeMap::new(),
            mtu: default_mtu(),
            neighbors: BTreeMap::new(),
        }
    }

    pub fn neighbor(&self, ip: &IpAddress) -> Option<&NeighborEntry> {
        self.neighbors.get(ip)
    }

    pub fn resolved_neighbor(&self, ip: &IpAddress) -> Option<&NeighborEntry> {
        self.neighbors.get(ip).filter(|n| n.is_resolved())
    }

    /// Connected subnets derived from the interface addresses.
    pub fn subnets(&self) -> impl Iterator<Item = IpPrefix> + '_ {
        self.addresses
            .iter()
            .filter_map(|(addr, len)| IpPrefix::new(*addr, *len).ok())
    }

    /// Returns true if `ip` is inside one of the interface's subnets.
    pub fn is_directly_connected(&self, ip: &IpAddress) -> bool {
        self.subnets().any(|subnet| subnet.contains(ip))
    }

    /// First configured address of the same family as `ip`.
    pub fn source_address_for(&self, ip: &IpAddress) -> Option<IpAddress> {
        self.addresses
            .keys()
            .find(|addr| addr.family() == ip.family())
            .copied()
    }
}

impl StateEntity for Interface {
    const KIND: &'static str = "interface";
}
