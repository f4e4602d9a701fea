//! VLANs and link aggregation groups.

use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use swstate_types::{AggregatePortId, InterfaceId, PortId, VlanId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: VlanId,
    pub name: String,
    /// Member ports, port to tagged flag
    #[serde(default)]
    pub members: BTreeMap<PortId, bool>,
    /// Routed interface bound to this VLAN
    #[serde(default)]
    pub interface_id: Option<InterfaceId>,
}

impl Vlan {
    pub fn new(id: VlanId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: BTreeMap::new(),
            interface_id: None,
        }
    }

    pub fn member_ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.members.keys().copied()
    }
}

impl StateEntity for Vlan {
    const KIND: &'static str = "vlan";
}

fn default_min_links() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatePort {
    pub id: AggregatePortId,
    pub name: String,
    #[serde(default)]
    pub members: BTreeSet<PortId>,
    #[serde(default = "default_min_links")]
    pub minimum_links: u8,
}

impl AggregatePort {
    pub fn new(id: AggregatePortId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: BTreeSet::new(),
            minimum_links: default_min_links(),
        }
    }

    /// Lowest-numbered member, used when one egress port must be chosen.
    pub fn first_member(&self) -> Option<PortId> {
        self.members.iter().next().copied()
    }
}

impl StateEntity for AggregatePort {
    const KIND: &'static str = "aggregate_port";
}
