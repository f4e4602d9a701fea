//! Traffic-engineering flow entries.

use super::nexthop::NextHop;
use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use std::fmt;
use swstate_types::{IpPrefix, PortId};

/// A flow is matched on ingress port and destination prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeFlowKey {
    pub src_port: PortId,
    pub dst_prefix: IpPrefix,
}

impl TeFlowKey {
    pub fn new(src_port: PortId, dst_prefix: IpPrefix) -> Self {
        Self {
            src_port,
            dst_prefix,
        }
    }
}

impl fmt::Display for TeFlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port{}:{}", self.src_port, self.dst_prefix)
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeFlowEntry {
    pub key: TeFlowKey,
    /// Next hops as requested by the client
    pub next_hops: Vec<NextHop>,
    /// Requested next hops whose neighbor is resolved
    #[serde(default)]
    pub resolved_next_hops: Vec<NextHop>,
    #[serde(default)]
    pub counter_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TeFlowEntry {
    pub fn new(key: TeFlowKey, next_hops: Vec<NextHop>) -> Self {
        Self {
            key,
            next_hops,
            resolved_next_hops: Vec::new(),
            counter_id: None,
            enabled: default_enabled(),
        }
    }

    pub fn is_programmable(&self) -> bool {
        self.enabled && !self.resolved_next_hops.is_empty()
    }
}

impl StateEntity for TeFlowEntry {
    const KIND: &'static str = "te_flow";
}
