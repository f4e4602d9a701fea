//! Fabric (DSF) node records.

use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use swstate_types::{IdRange, IpPrefix, SwitchId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsfNodeType {
    /// Element with front-panel ports and system ports
    InterfaceNode,
    /// Fabric-only element
    FabricNode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsfNode {
    pub switch_id: SwitchId,
    pub name: String,
    pub node_type: DsfNodeType,
    #[serde(default)]
    pub system_port_range: Option<IdRange>,
    #[serde(default)]
    pub loopback_ips: Vec<IpPrefix>,
}

impl DsfNode {
    pub fn is_interface_node(&self) -> bool {
        self.node_type == DsfNodeType::InterfaceNode
    }

    pub fn owns_system_port(&self, id: u32) -> bool {
        self.system_port_range
            .map(|range| range.contains(id))
            .unwrap_or(false)
    }
}

impl StateEntity for DsfNode {
    const KIND: &'static str = "dsf_node";
}
