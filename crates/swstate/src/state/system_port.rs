//! System ports of a disaggregated fabric, local and remote.

use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use swstate_types::{SwitchId, SystemPortId};

fn default_num_voqs() -> u8 {
    8
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPort {
    pub id: SystemPortId,
    /// Switch element owning the port
    pub switch_id: SwitchId,
    pub port_name: String,
    #[serde(default)]
    pub core_index: u32,
    #[serde(default)]
    pub core_port_index: u32,
    #[serde(default)]
    pub speed_mbps: u32,
    #[serde(default = "default_num_voqs")]
    pub num_voqs: u8,
    #[serde(default)]
    pub enabled: bool,
}

impl SystemPort {
    pub fn new(id: SystemPortId, switch_id: SwitchId, port_name: impl Into<String>) -> Self {
        Self {
            id,
            switch_id,
            port_name: port_name.into(),
            core_index: 0,
            core_port_index: 0,
            speed_mbps: 0,
            num_voqs: default_num_voqs(),
            enabled: true,
        }
    }
}

impl StateEntity for SystemPort {
    const KIND: &'static str = "system_port";
}
