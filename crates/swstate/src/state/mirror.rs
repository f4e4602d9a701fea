//! Port mirroring sessions (SPAN and ERSPAN).

use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use swstate_types::{IpAddress, MacAddress, PortId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorDirection {
    Ingress,
    Egress,
    #[default]
    Both,
}

/// Where mirrored traffic goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorDestination {
    /// Local SPAN to a port
    Port(PortId),
    /// ERSPAN to a remote collector
    Tunnel {
        dst_ip: IpAddress,
        #[serde(default)]
        src_ip: Option<IpAddress>,
    },
}

/// Resolved ERSPAN encapsulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorTunnel {
    pub src_ip: IpAddress,
    pub dst_ip: IpAddress,
    pub src_mac: MacAddress,
    pub dst_mac: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub name: String,
    pub destination: MirrorDestination,
    #[serde(default)]
    pub direction: MirrorDirection,
    #[serde(default)]
    pub dscp: u8,
    /// Egress port once resolved
    #[serde(default)]
    pub egress_port: Option<PortId>,
    #[serde(default)]
    pub tunnel: Option<MirrorTunnel>,
}

impl Mirror {
    pub fn new(name: impl Into<String>, destination: MirrorDestination) -> Self {
        Self {
            name: name.into(),
            destination,
            direction: MirrorDirection::default(),
            dscp: 0,
            egress_port: None,
            tunnel: None,
        }
    }

    pub fn is_tunnel(&self) -> bool {
        matches!(self.destination, MirrorDestination::Tunnel { .. })
    }

    pub fn is_resolved(&self) -> bool {
        self.egress_port.is_some() && (!self.is_tunnel() || self.tunnel.is_some())
    }
}

impl StateEntity for Mirror {
    const KIND: &'static str = "mirror";
}
