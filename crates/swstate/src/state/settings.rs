//! Switch-wide settings and the switch element table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use swstate_types::{IdRange, MacAddress, ParseError, SwitchId, VlanId};

/// Kind of switching element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchType {
    /// Integrated switching element
    Npu,
    /// Virtual-output-queue element of a disaggregated fabric
    Voq,
    /// Fabric-only element
    Fabric,
}

impl SwitchType {
    pub fn is_l3(&self) -> bool {
        matches!(self, SwitchType::Npu | SwitchType::Voq)
    }
}

impl fmt::Display for SwitchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchType::Npu => write!(f, "npu"),
            SwitchType::Voq => write!(f, "voq"),
            SwitchType::Fabric => write!(f, "fabric"),
        }
    }
}

impl FromStr for SwitchType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npu" => Ok(SwitchType::Npu),
            "voq" => Ok(SwitchType::Voq),
            "fabric" => Ok(SwitchType::Fabric),
            _ => Err(ParseError::InvalidEnum {
                kind: "switch type",
                value: s.to_string(),
            }),
        }
    }
}

/// One locally managed switching element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub switch_type: SwitchType,
    /// Index of the element within this chassis
    #[serde(default)]
    pub switch_index: u16,
    pub port_id_range: IdRange,
    #[serde(default)]
    pub system_port_range: Option<IdRange>,
    #[serde(default)]
    pub mac: Option<MacAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum L2LearningMode {
    #[default]
    Hardware,
    Software,
}

fn default_arp_timeout() -> u32 {
    60
}

fn default_max_neighbor_probes() -> u32 {
    300
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchSettings {
    pub switch_infos: BTreeMap<SwitchId, SwitchInfo>,
    pub default_vlan: VlanId,
    pub arp_timeout_secs: u32,
    pub ndp_timeout_secs: u32,
    pub max_neighbor_probes: u32,
    pub l2_learning_mode: L2LearningMode,
}

impl Default for SwitchSettings {
    fn default() -> Self {
        Self {
            switch_infos: BTreeMap::new(),
            default_vlan: VlanId::DEFAULT,
            arp_timeout_secs: default_arp_timeout(),
            ndp_timeout_secs: default_arp_timeout(),
            max_neighbor_probes: default_max_neighbor_probes(),
            l2_learning_mode: L2LearningMode::default(),
        }
    }
}
