//! Keeps mirror sessions resolved to an egress port.
//!
//! A SPAN session resolves when its destination port exists. An ERSPAN
//! session needs a path to the collector: a directly connected interface
//! with a resolved neighbor, or else the longest-prefix route whose resolved
//! next hops lead to one. The neighbor's port gives the egress; the
//! interface and neighbor give the tunnel MAC addresses.

use crate::delta::StateDelta;
use crate::node::modify;
use crate::pipeline::{StateObserver, UpdateResult, UpdateSubmitter};
use crate::state::{Interface, Mirror, MirrorDestination, MirrorTunnel, NeighborEntry, SwitchState};
use crate::{debug_log, info_log};
use swstate_types::{IpAddress, PortId, RouterId};

/// Egress port and tunnel for one mirror in `state`.
pub fn resolve_mirror(state: &SwitchState, mirror: &Mirror) -> (Option<PortId>, Option<MirrorTunnel>) {
    match mirror.destination {
        MirrorDestination::Port(port) => (state.port(port).map(|_| port), None),
        MirrorDestination::Tunnel { dst_ip, src_ip } => {
            let Some((intf, neighbor)) = find_path(state, &dst_ip) else {
                return (None, None);
            };
            let Some(egress) = neighbor.port.and_then(|desc| state.physical_port_for(&desc)) else {
                return (None, None);
            };
            let Some(src_ip) = src_ip.or_else(|| intf.source_address_for(&dst_ip)) else {
                return (None, None);
            };
            let tunnel = MirrorTunnel {
                src_ip,
                dst_ip,
                src_mac: intf.mac,
                dst_mac: neighbor.mac,
            };
            (Some(egress), Some(tunnel))
        }
    }
}

fn find_path<'a>(state: &'a SwitchState, dst: &IpAddress) -> Option<(&'a Interface, &'a NeighborEntry)> {
    let router = RouterId::default();

    if let Some(intf) = state.connected_interface(router, dst) {
        if let Some(neighbor) = intf.resolved_neighbor(dst) {
            return Some((&**intf, neighbor));
        }
    }

    let route = state.longest_prefix_match(router, dst)?;
    route.resolved_next_hops()?.iter().find_map(|nh| {
        let intf = match nh.interface {
            Some(id) => state.interface(id)?,
            None => state.connected_interface(router, &nh.addr)?,
        };
        intf.resolved_neighbor(&nh.addr).map(|neighbor| (&**intf, neighbor))
    })
}

/// Re-resolves every mirror. Returns true if any resolution changed.
pub fn refresh_mirror_resolution(state: &mut SwitchState) -> bool {
    let stale: Vec<(String, Option<PortId>, Option<MirrorTunnel>)> = state
        .mirrors
        .values()
        .filter_map(|mirror| {
            let (egress, tunnel) = resolve_mirror(state, mirror);
            (egress != mirror.egress_port || tunnel != mirror.tunnel)
                .then(|| (mirror.name.clone(), egress, tunnel))
        })
        .collect();
    if stale.is_empty() {
        return false;
    }

    modify(&mut state.mirrors, |mirrors| {
        for (name, egress, tunnel) in stale {
            let updated = mirrors.modify_entry(&name, |mirror| {
                mirror.egress_port = egress;
                mirror.tunnel = tunnel;
                Ok(())
            });
            match updated {
                Ok(()) => info_log!(
                    "MirrorResolver",
                    mirror = %name,
                    egress = ?egress,
                    resolved = egress.is_some(),
                    "Mirror resolution changed"
                ),
                Err(_) => debug_log!("MirrorResolver", mirror = %name, "Mirror vanished during resolution"),
            }
        }
    });
    true
}

/// Observer scheduling mirror re-resolution after relevant changes.
pub struct MirrorResolver {
    submitter: UpdateSubmitter,
}

impl MirrorResolver {
    pub fn new(submitter: UpdateSubmitter) -> Self {
        Self { submitter }
    }

    fn is_relevant(delta: &StateDelta) -> bool {
        !delta.mirrors().is_empty()
            || !delta.routes().is_empty()
            || !delta.interfaces().is_empty()
            || !delta.ports().is_empty()
            || !delta.aggregate_ports().is_empty()
    }
}

impl StateObserver for MirrorResolver {
    fn name(&self) -> &str {
        "MirrorResolver"
    }

    fn state_updated(&self, delta: &StateDelta) {
        if delta.new_state().mirrors.is_empty() || !Self::is_relevant(delta) {
            return;
        }
        // Resolution runs against the state current when the update is
        // applied, not this delta's snapshot.
        let _ticket = self.submitter.submit("resolve mirrors", |state| -> UpdateResult {
            let mut draft = state.modify();
            if refresh_mirror_resolution(&mut draft) {
                Ok(Some(draft))
            } else {
                Ok(None)
            }
        });
    }
}
