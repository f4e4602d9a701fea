//! Mirrors remote fabric elements' system ports and neighbors.
//!
//! In a disaggregated chassis every VOQ element must know the system ports
//! and resolved neighbors of its peers. Peers are the interface-type fabric
//! nodes that are not local; their entries land in the `remote_*`
//! collections, scoped to every local VOQ element.

use crate::delta::{DeltaValue, StateDelta};
use crate::error::{Result, StateError};
use crate::node::{modify, try_modify, Frozen, StateEntity};
use crate::pipeline::{StateObserver, UpdateResult, UpdateSubmitter, UpdateTicket};
use crate::scope::ScopeResolver;
use crate::state::{DsfNode, Interface, InterfaceKind, SwitchState, SystemPort};
use crate::{debug_log, info_log, warn_log};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use swstate_types::{SwitchId, SystemPortId};

fn peer_system_ports(state: &SwitchState, peer: SwitchId) -> BTreeSet<SystemPortId> {
    state
        .remote_system_ports
        .values()
        .filter(|sp| sp.switch_id == peer)
        .map(|sp| sp.id)
        .collect()
}

fn is_peer_interface(intf: &Interface, ports: &BTreeSet<SystemPortId>) -> bool {
    matches!(intf.kind, InterfaceKind::SystemPort(sp) if ports.contains(&sp))
}

/// Removes every remote system port and interface learned from `peer`.
/// Returns true if anything was removed.
pub fn purge_remote_entries(state: &mut SwitchState, peer: SwitchId) -> bool {
    let ports = peer_system_ports(state, peer);
    if ports.is_empty() {
        return false;
    }
    modify(&mut state.remote_interfaces, |intfs| {
        intfs.retain(|_, intf| !is_peer_interface(intf, &ports));
    });
    modify(&mut state.remote_system_ports, |sps| {
        sps.retain(|id, _| !ports.contains(id));
    });
    true
}

fn validate_remote_update(
    resolver: &ScopeResolver,
    peer: SwitchId,
    system_ports: &[SystemPort],
    interfaces: &[Interface],
) -> Result<BTreeSet<SystemPortId>> {
    let mut ids = BTreeSet::new();
    for sp in system_ports {
        if sp.switch_id != peer {
            return Err(StateError::invalid(
                SystemPort::KIND,
                format!("{} belongs to switch {}, not {}", sp.id, sp.switch_id, peer),
            ));
        }
        let local = resolver
            .switch_infos()
            .values()
            .any(|info| info.system_port_range.is_some_and(|r| r.contains(sp.id.get())));
        if local {
            return Err(StateError::invalid(
                SystemPort::KIND,
                format!("{} is a local system port", sp.id),
            ));
        }
        ids.insert(sp.id);
    }
    for intf in interfaces {
        if !is_peer_interface(intf, &ids) {
            return Err(StateError::invalid(
                Interface::KIND,
                format!("{} on {} is not a system port of switch {}", intf.id, intf.kind, peer),
            ));
        }
    }
    Ok(ids)
}

/// Replaces everything known about `peer` with the given system ports and
/// interfaces. Neighbors are recorded as non-local.
pub fn replace_remote_entries(
    state: &mut SwitchState,
    resolver: &ScopeResolver,
    peer: SwitchId,
    system_ports: Vec<SystemPort>,
    interfaces: Vec<Interface>,
) -> Result<()> {
    let ids = validate_remote_update(resolver, peer, &system_ports, &interfaces)?;
    let scope = resolver.remote_scope()?;
    let previous = peer_system_ports(state, peer);
    let intf_ids: BTreeSet<_> = interfaces.iter().map(|intf| intf.id).collect();

    try_modify(&mut state.remote_system_ports, |sps| {
        sps.retain(|id, sp| sp.switch_id != peer || ids.contains(id));
        for sp in system_ports {
            match sps.get(&sp.id) {
                Some(existing) if **existing == sp => continue,
                Some(existing) if existing.switch_id != peer => {
                    return Err(StateError::already_exists(SystemPort::KIND, sp.id));
                }
                _ => {}
            }
            sps.upsert(sp.id, Frozen::new(sp), scope.clone());
        }
        Ok(())
    })?;

    try_modify(&mut state.remote_interfaces, |intfs| {
        intfs.retain(|id, intf| !is_peer_interface(intf, &previous) || intf_ids.contains(id));
        for mut intf in interfaces {
            for neighbor in intf.neighbors.values_mut() {
                neighbor.is_local = false;
            }
            match intfs.get(&intf.id) {
                Some(existing) if **existing == intf => continue,
                Some(existing) if !is_peer_interface(existing, &previous) => {
                    return Err(StateError::already_exists(Interface::KIND, intf.id));
                }
                _ => {}
            }
            intfs.upsert(intf.id, Frozen::new(intf), scope.clone());
        }
        Ok(())
    })
}

/// Observer tracking fabric peers and applying their remote state.
pub struct RemoteNeighborSync {
    submitter: UpdateSubmitter,
    resolver: Arc<ScopeResolver>,
    peers: Mutex<BTreeMap<SwitchId, String>>,
}

impl RemoteNeighborSync {
    /// Seeds the peer set from `initial`, the snapshot current at
    /// registration.
    pub fn new(submitter: UpdateSubmitter, resolver: Arc<ScopeResolver>, initial: &SwitchState) -> Self {
        let peers = initial
            .fabric_nodes
            .values()
            .filter(|node| Self::is_peer(&resolver, node))
            .map(|node| (node.switch_id, node.name.clone()))
            .collect();
        Self {
            submitter,
            resolver,
            peers: Mutex::new(peers),
        }
    }

    fn is_peer(resolver: &ScopeResolver, node: &DsfNode) -> bool {
        node.is_interface_node() && !resolver.is_local_switch(node.switch_id)
    }

    pub fn peers(&self) -> Vec<SwitchId> {
        self.peers.lock().keys().copied().collect()
    }

    /// Submits a replacement of `peer`'s remote entries. Returns `None`,
    /// after logging, when `peer` is not a known fabric peer.
    pub fn apply_remote_update(
        &self,
        peer: SwitchId,
        system_ports: Vec<SystemPort>,
        interfaces: Vec<Interface>,
    ) -> Option<UpdateTicket> {
        let Some(name) = self.peers.lock().get(&peer).cloned() else {
            warn_log!("RemoteNeighborSync", switch_id = peer.get(), "Dropping update from unknown peer");
            return None;
        };
        debug_log!(
            "RemoteNeighborSync",
            peer = %name,
            system_ports = system_ports.len(),
            interfaces = interfaces.len(),
            "Applying remote update"
        );

        let resolver = Arc::clone(&self.resolver);
        let ticket = self
            .submitter
            .submit(format!("remote update from {}", name), move |state| -> UpdateResult {
                let mut draft = state.modify();
                replace_remote_entries(&mut draft, &resolver, peer, system_ports, interfaces)?;
                Ok(Some(draft))
            });
        Some(ticket)
    }

    fn schedule_purge(&self, peer: SwitchId, name: &str) {
        info_log!("RemoteNeighborSync", peer = %name, switch_id = peer.get(), "Fabric peer removed, purging remote entries");
        let _ticket = self
            .submitter
            .submit(format!("purge remote entries of {}", name), move |state| -> UpdateResult {
                let mut draft = state.modify();
                if purge_remote_entries(&mut draft, peer) {
                    Ok(Some(draft))
                } else {
                    Ok(None)
                }
            });
    }
}

impl StateObserver for RemoteNeighborSync {
    fn name(&self) -> &str {
        "RemoteNeighborSync"
    }

    fn state_updated(&self, delta: &StateDelta) {
        for change in delta.fabric_nodes() {
            match change {
                DeltaValue::Added { new, .. } | DeltaValue::Changed { new, .. } => {
                    let node = &new.node;
                    if Self::is_peer(&self.resolver, node) {
                        let added = self.peers.lock().insert(node.switch_id, node.name.clone()).is_none();
                        if added {
                            info_log!("RemoteNeighborSync", peer = %node.name, switch_id = node.switch_id.get(), "Tracking fabric peer");
                        }
                    } else if let Some(name) = self.peers.lock().remove(&node.switch_id) {
                        self.schedule_purge(node.switch_id, &name);
                    }
                }
                DeltaValue::Removed { old, .. } => {
                    let removed = self.peers.lock().remove(&old.node.switch_id);
                    if let Some(name) = removed {
                        self.schedule_purge(old.node.switch_id, &name);
                    }
                }
            }
        }
    }
}
