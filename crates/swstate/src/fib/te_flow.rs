//! Traffic-engineering flow table.
//!
//! A TE flow steers traffic from one source port towards a destination
//! prefix over explicit next hops. Each next hop names its egress
//! interface; it is usable once that interface has a resolved neighbor for
//! the next-hop address.

use crate::context::AgentContext;
use crate::error::{Result, StateError};
use crate::node::{modify, try_modify, Frozen, StateEntity};
use crate::pipeline::UpdateResult;
use crate::scope::ScopeResolver;
use crate::state::{NextHop, SwitchState, TeFlowEntry, TeFlowKey, TeFlowTable};
use crate::{debug_log, info_log};
use std::collections::HashSet;
use std::sync::Arc;

fn validate_te_flow(state: &SwitchState, entry: &TeFlowEntry) -> Result<()> {
    if state.port(entry.key.src_port).is_none() {
        return Err(StateError::invalid(
            TeFlowEntry::KIND,
            format!("{}: unknown source port {}", entry.key, entry.key.src_port),
        ));
    }
    if let Some(nh) = entry.next_hops.iter().find(|nh| nh.interface.is_none()) {
        return Err(StateError::invalid(
            TeFlowEntry::KIND,
            format!("{}: next hop {} has no interface", entry.key, nh),
        ));
    }
    Ok(())
}

/// Next hops of `entry` that currently have a resolved neighbor.
pub fn resolve_te_flow(state: &SwitchState, entry: &TeFlowEntry) -> Vec<NextHop> {
    entry
        .next_hops
        .iter()
        .filter(|nh| {
            nh.interface
                .and_then(|id| state.interface(id))
                .map(|intf| intf.resolved_neighbor(&nh.addr).is_some())
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

fn install(table: &mut TeFlowTable, resolver: &ScopeResolver, state: &SwitchState, mut entry: TeFlowEntry) -> Result<()> {
    entry.resolved_next_hops = resolve_te_flow(state, &entry);
    let scope = resolver.scope(&entry)?;
    let key = entry.key;
    if table.get_scoped(&key).is_some_and(|existing| *existing.node == entry && existing.scope == scope) {
        return Ok(());
    }
    table.upsert(key, Frozen::new(entry), scope);
    Ok(())
}

/// Adds or replaces each flow in `entries`. Nothing is installed if any
/// entry is invalid.
pub fn add_te_flows(state: &mut SwitchState, resolver: &ScopeResolver, entries: Vec<TeFlowEntry>) -> Result<()> {
    for entry in &entries {
        validate_te_flow(state, entry)?;
    }
    let snapshot = state.clone();
    try_modify(&mut state.te_flows, |table| {
        entries
            .into_iter()
            .try_for_each(|entry| install(table, resolver, &snapshot, entry))
    })
}

/// Removes each flow in `keys`.
///
/// # Errors
///
/// `NotFound` for a key with no flow; the table is left unchanged.
pub fn delete_te_flows(state: &mut SwitchState, keys: &[TeFlowKey]) -> Result<()> {
    try_modify(&mut state.te_flows, |table| {
        keys.iter().try_for_each(|key| table.remove(key).map(|_| ()))
    })
}

/// Replaces the whole table with `entries`. Flows that did not change keep
/// their published node.
pub fn sync_te_flows(state: &mut SwitchState, resolver: &ScopeResolver, entries: Vec<TeFlowEntry>) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in &entries {
        validate_te_flow(state, entry)?;
        if !seen.insert(entry.key) {
            return Err(StateError::already_exists(TeFlowEntry::KIND, entry.key));
        }
    }

    let snapshot = state.clone();
    try_modify(&mut state.te_flows, |table| {
        table.retain(|key, _| seen.contains(key));
        entries
            .into_iter()
            .try_for_each(|entry| install(table, resolver, &snapshot, entry))
    })
}

/// Recomputes resolved next hops for every flow. Returns true if any flow
/// changed.
pub fn refresh_te_flow_resolution(state: &mut SwitchState) -> bool {
    let stale: Vec<(TeFlowKey, Vec<NextHop>)> = state
        .te_flows
        .values()
        .filter_map(|flow| {
            let resolved = resolve_te_flow(state, flow);
            (resolved != flow.resolved_next_hops).then_some((flow.key, resolved))
        })
        .collect();
    if stale.is_empty() {
        return false;
    }

    modify(&mut state.te_flows, |table| {
        for (key, resolved) in stale {
            let updated = table.modify_entry(&key, |flow| {
                flow.resolved_next_hops = resolved;
                Ok(())
            });
            if updated.is_err() {
                debug_log!("TeFlow", flow = %key, "Flow vanished during re-resolution");
            }
        }
    });
    true
}

/// Submits TE flow changes through the update pipeline.
pub struct TeFlowManager {
    ctx: AgentContext,
}

impl TeFlowManager {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn add_te_flows(&self, entries: Vec<TeFlowEntry>) -> Result<Frozen<SwitchState>> {
        let resolver = Arc::clone(&self.ctx.resolver);
        let name = format!("add {} te flows", entries.len());
        self.ctx
            .pipeline
            .submit_and_wait(name, move |state| -> UpdateResult {
                let mut draft = state.modify();
                add_te_flows(&mut draft, &resolver, entries)?;
                Ok(Some(draft))
            })
            .await
    }

    pub async fn delete_te_flows(&self, keys: Vec<TeFlowKey>) -> Result<Frozen<SwitchState>> {
        let name = format!("delete {} te flows", keys.len());
        self.ctx
            .pipeline
            .submit_and_wait(name, move |state| -> UpdateResult {
                let mut draft = state.modify();
                delete_te_flows(&mut draft, &keys)?;
                Ok(Some(draft))
            })
            .await
    }

    pub async fn sync_te_flows(&self, entries: Vec<TeFlowEntry>) -> Result<Frozen<SwitchState>> {
        let resolver = Arc::clone(&self.ctx.resolver);
        info_log!("TeFlow", flows = entries.len(), "Syncing te flow table");
        self.ctx
            .pipeline
            .submit_and_wait("sync te flows", move |state| -> UpdateResult {
                let mut draft = state.modify();
                sync_te_flows(&mut draft, &resolver, entries)?;
                Ok(Some(draft))
            })
            .await
    }
}
