//! Unicast routes.

use super::nexthop::{NextHopEntry, NextHopSet, NextHopsMulti};
use crate::node::StateEntity;
use serde::{Deserialize, Serialize};
use std::fmt;
use swstate_types::{ClientId, IpPrefix, RouterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    #[serde(default)]
    pub router_id: RouterId,
    pub prefix: IpPrefix,
}

impl RouteKey {
    pub fn new(router_id: RouterId, prefix: IpPrefix) -> Self {
        Self { router_id, prefix }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vrf{}:{}", self.router_id, self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub key: RouteKey,
    #[serde(default)]
    pub next_hops_multi: NextHopsMulti,
}

impl Route {
    pub fn new(key: RouteKey, client: ClientId, entry: NextHopEntry) -> Self {
        Self {
            key,
            next_hops_multi: NextHopsMulti::with_client(client, entry),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.next_hops_multi.resolved().is_some()
    }

    pub fn resolved_next_hops(&self) -> Option<&NextHopSet> {
        self.next_hops_multi.resolved_next_hops()
    }
}

impl StateEntity for Route {
    const KIND: &'static str = "route";
}
