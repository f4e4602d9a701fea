//! Front-panel and internal ports.

use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swstate_types::{AdminState, LoopbackMode, OperState, PortId, PortType, VlanId};

fn default_speed() -> u32 {
    100_000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub name: String,
    #[serde(default)]
    pub port_type: PortType,
    /// Configured administrative state
    #[serde(default)]
    pub admin_state: AdminState,
    /// Operational state last reported by hardware
    #[serde(default)]
    pub oper_state: OperState,
    /// Optics powered off; such ports are expected to be down
    #[serde(default)]
    pub powered_off: bool,
    #[serde(default)]
    pub loopback_mode: LoopbackMode,
    #[serde(default = "default_speed")]
    pub speed_mbps: u32,
    /// VLAN memberships, vlan to tagged flag
    #[serde(default)]
    pub vlans: BTreeMap<VlanId, bool>,
    #[serde(default)]
    pub description: String,
}

impl Port {
    pub fn new(id: PortId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            port_type: PortType::default(),
            admin_state: AdminState::Disabled,
            oper_state: OperState::Down,
            powered_off: false,
            loopback_mode: LoopbackMode::None,
            speed_mbps: default_speed(),
            vlans: BTreeMap::new(),
            description: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.admin_state.is_enabled()
    }

    pub fn is_up(&self) -> bool {
        self.oper_state.is_up()
    }

    /// Configured up, powered, not looped back, yet down in hardware.
    pub fn is_unexpectedly_down(&self) -> bool {
        self.is_enabled()
            && !self.powered_off
            && self.loopback_mode == LoopbackMode::None
            && self.oper_state.is_down()
    }
}

impl StateEntity for Port {
    const KIND: &'static str = "port";
}
