//! Label forwarding entries.

use super::nexthop::{NextHopEntry, NextHopSet, NextHopsMulti};
use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use swstate_types::{ClientId, Label};

/// One label's multi-client next-hop table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelForwardingEntry {
    pub label: Label,
    #[serde(default)]
    pub next_hops_multi: NextHopsMulti,
}

impl LabelForwardingEntry {
    /// Creates an entry seeded from one client, already resolved.
    pub fn new(label: Label, client: ClientId, entry: NextHopEntry) -> Self {
        Self {
            label,
            next_hops_multi: NextHopsMulti::with_client(client, entry),
        }
    }

    pub fn resolved_next_hops(&self) -> Option<&NextHopSet> {
        self.next_hops_multi.resolved_next_hops()
    }

    pub fn resolved_client(&self) -> Option<ClientId> {
        self.next_hops_multi.resolved().map(|r| r.client)
    }
}

impl StateEntity for LabelForwardingEntry {
    const KIND: &'static str = "label_entry";
}
