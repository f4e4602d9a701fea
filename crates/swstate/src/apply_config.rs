//! Applies the desired configuration to the state tree.
//!
//! Config owns ports, VLANs, aggregate ports, interfaces, mirrors, fabric
//! nodes and switch settings. Everything else (forwarding tables, remote
//! fabric entries) is left alone. Values learned at runtime survive a
//! re-apply: port oper state, interface neighbor tables, and mirror
//! resolution while the mirror destination is unchanged.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::config::AgentConfig;
use crate::context::AgentContext;
use crate::error::Result;
use crate::node::{modify, Frozen, NodeKey, NodeMap, StateEntity};
use crate::pipeline::UpdateResult;
use crate::scope::{ScopeResolver, SwitchMatcher};
use crate::state::{Interface, Mirror, Port, SwitchState, Vlan};
use crate::{audit_log, debug_log, error_log, info_log};
use std::collections::{BTreeMap, HashSet};
use swstate_types::{InterfaceId, PortId, VlanId};

/// Makes `slot` hold exactly `desired`, keeping the node of every entry
/// whose value and scope are unchanged. Returns true if anything changed.
fn reconcile<K, V>(slot: &mut Frozen<NodeMap<K, V>>, desired: Vec<(K, V, SwitchMatcher)>) -> bool
where
    K: NodeKey,
    V: StateEntity,
{
    let unchanged = slot.len() == desired.len()
        && desired.iter().all(|(key, value, scope)| {
            slot.get_scoped(key)
                .is_some_and(|entry| entry.scope == *scope && *entry.node == *value)
        });
    if unchanged {
        return false;
    }

    modify(slot, |map| {
        let keep: HashSet<K> = desired.iter().map(|(key, _, _)| key.clone()).collect();
        map.retain(|key, _| keep.contains(key));
        for (key, value, scope) in desired {
            let same = map
                .get_scoped(&key)
                .is_some_and(|entry| entry.scope == scope && *entry.node == value);
            if !same {
                debug_log!("ConfigApplier", kind = V::KIND, key = %key, "Entry changed");
                map.upsert(key, Frozen::new(value), scope);
            }
        }
    });
    true
}

fn desired_ports(
    state: &SwitchState,
    resolver: &ScopeResolver,
    config: &AgentConfig,
) -> Result<Vec<(PortId, Port, SwitchMatcher)>> {
    let mut memberships: BTreeMap<PortId, BTreeMap<VlanId, bool>> = BTreeMap::new();
    for vlan in &config.vlans {
        for (port, tagged) in vlan.members() {
            memberships.entry(port).or_default().insert(vlan.id, tagged);
        }
    }

    config
        .ports
        .iter()
        .map(|desired| {
            let mut port = desired.clone();
            port.vlans = memberships.remove(&port.id).unwrap_or_default();
            if let Some(current) = state.port(port.id) {
                port.oper_state = current.oper_state;
            }
            let scope = resolver.scope(&port)?;
            Ok((port.id, port, scope))
        })
        .collect()
}

fn desired_interfaces(
    state: &SwitchState,
    resolver: &ScopeResolver,
    config: &AgentConfig,
) -> Result<Vec<(InterfaceId, Interface, SwitchMatcher)>> {
    config
        .interfaces
        .iter()
        .map(|desired| {
            let mut intf = desired.clone();
            if let Some(current) = state.interface(intf.id) {
                intf.neighbors = current.neighbors.clone();
            }
            let scope = resolver.scope_interface(&intf, state)?;
            Ok((intf.id, intf, scope))
        })
        .collect()
}

fn desired_mirrors(
    state: &SwitchState,
    resolver: &ScopeResolver,
    config: &AgentConfig,
) -> Result<Vec<(String, Mirror, SwitchMatcher)>> {
    config
        .mirrors
        .iter()
        .map(|desired| {
            let mut mirror = desired.clone();
            match state.mirrors.get(&mirror.name) {
                Some(current) if current.destination == mirror.destination => {
                    mirror.egress_port = current.egress_port;
                    mirror.tunnel = current.tunnel;
                }
                _ => {
                    mirror.egress_port = None;
                    mirror.tunnel = None;
                }
            }
            let scope = resolver.scope(&mirror)?;
            Ok((mirror.name.clone(), mirror, scope))
        })
        .collect()
}

/// Builds the next root from `config`, or `None` if the state already
/// matches it.
pub fn apply_desired_config(
    state: &Frozen<SwitchState>,
    resolver: &ScopeResolver,
    config: &AgentConfig,
) -> UpdateResult {
    let mut draft = state.modify();
    let mut changed = false;

    let mut settings = config.settings.clone();
    settings.switch_infos = config.switch_infos();
    if *draft.settings != settings {
        draft.settings = Frozen::new(settings);
        changed = true;
    }

    let ports = desired_ports(state, resolver, config)?;
    changed |= reconcile(&mut draft.ports, ports);

    let vlans = config
        .vlans
        .iter()
        .map(|desired| {
            let mut vlan = Vlan::new(desired.id, desired.name());
            vlan.members = desired.members();
            vlan.interface_id = desired.interface_id;
            let scope = resolver.scope(&vlan)?;
            Ok((vlan.id, vlan, scope))
        })
        .collect::<Result<Vec<_>>>()?;
    changed |= reconcile(&mut draft.vlans, vlans);

    let aggregate_ports = config
        .aggregate_ports
        .iter()
        .map(|agg| Ok((agg.id, agg.clone(), resolver.scope(agg)?)))
        .collect::<Result<Vec<_>>>()?;
    changed |= reconcile(&mut draft.aggregate_ports, aggregate_ports);

    // VLAN interfaces take their scope from the VLANs just reconciled.
    let interfaces = desired_interfaces(&draft, resolver, config)?;
    changed |= reconcile(&mut draft.interfaces, interfaces);

    let mirrors = desired_mirrors(state, resolver, config)?;
    changed |= reconcile(&mut draft.mirrors, mirrors);

    let nodes = config
        .dsf_nodes
        .iter()
        .map(|node| Ok((node.switch_id, node.clone(), resolver.scope(node)?)))
        .collect::<Result<Vec<_>>>()?;
    changed |= reconcile(&mut draft.fabric_nodes, nodes);

    Ok(changed.then_some(draft))
}

/// Submits the desired configuration held by `ctx` and waits for it to be
/// published.
pub async fn apply_config(ctx: &AgentContext) -> Result<Frozen<SwitchState>> {
    let resolver = ctx.resolver.clone();
    let config = ctx.config.clone();
    let result = ctx
        .pipeline
        .submit("apply config", move |state| {
            apply_desired_config(state, &resolver, &config)
        })
        .wait()
        .await;

    match &result {
        Ok(state) => {
            info_log!(
                "ConfigApplier",
                ports = state.ports.len(),
                vlans = state.vlans.len(),
                interfaces = state.interfaces.len(),
                mirrors = state.mirrors.len(),
                "Configuration applied"
            );
            audit_log!(AuditRecord::new(AuditCategory::ConfigurationChange, "ConfigApplier", "apply_config")
                .with_outcome(AuditOutcome::Success)
                .with_details(serde_json::json!({
                    "ports": state.ports.len(),
                    "vlans": state.vlans.len(),
                    "aggregate_ports": state.aggregate_ports.len(),
                    "interfaces": state.interfaces.len(),
                    "mirrors": state.mirrors.len(),
                    "dsf_nodes": state.fabric_nodes.len(),
                })));
        }
        Err(e) => {
            error_log!("ConfigApplier", error = %e, "Configuration rejected");
            audit_log!(AuditRecord::new(AuditCategory::ConfigurationChange, "ConfigApplier", "apply_config")
                .with_outcome(AuditOutcome::Failure)
                .with_error(e.to_string()));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VlanConfig;
    use crate::pipeline::{NullHwSwitch, PipelineConfig, UpdatePipeline};
    use crate::state::{InterfaceKind, MirrorDestination, NeighborEntry, PortDescriptor};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use swstate_types::{AdminState, MacAddress, OperState};

    fn config() -> AgentConfig {
        let mut config = AgentConfig::default();
        let mut eth1 = Port::new(PortId(1), "eth1");
        eth1.admin_state = AdminState::Enabled;
        config.ports = vec![eth1, Port::new(PortId(2), "eth2")];
        config.vlans = vec![VlanConfig {
            id: VlanId::new(10).unwrap(),
            name: None,
            untagged: vec![PortId(1)],
            tagged: vec![PortId(2)],
            interface_id: Some(InterfaceId(10)),
        }];
        let mut intf = Interface::new(InterfaceId(10), InterfaceKind::Vlan(VlanId::new(10).unwrap()));
        intf.addresses.insert("10.0.0.1".parse().unwrap(), 24);
        config.interfaces = vec![intf];
        config.mirrors = vec![Mirror::new("span", MirrorDestination::Port(PortId(2)))];
        config
    }

    fn resolver(config: &AgentConfig) -> ScopeResolver {
        ScopeResolver::new(config.switch_infos()).unwrap()
    }

    #[test]
    fn test_apply_builds_state() {
        let config = config();
        let initial = Frozen::new(SwitchState::default());

        let state = apply_desired_config(&initial, &resolver(&config), &config)
            .unwrap()
            .unwrap()
            .freeze();

        assert_eq!(state.ports.len(), 2);
        assert_eq!(
            state.port(PortId(2)).unwrap().vlans,
            BTreeMap::from([(VlanId::new(10).unwrap(), true)])
        );
        assert_eq!(state.vlan(VlanId::new(10).unwrap()).unwrap().name, "Vlan10");
        assert!(state.interface(InterfaceId(10)).is_some());
        assert_eq!(state.settings.switch_infos, config.switch_infos());
        assert_eq!(initial.ports.len(), 0);
    }

    #[test]
    fn test_reapply_is_no_change() {
        let config = config();
        let resolver = resolver(&config);
        let state = apply_desired_config(&Frozen::new(SwitchState::default()), &resolver, &config)
            .unwrap()
            .unwrap()
            .freeze();

        assert!(apply_desired_config(&state, &resolver, &config).unwrap().is_none());
    }

    #[test]
    fn test_reapply_preserves_runtime_values() {
        let mut config = config();
        let resolver = resolver(&config);
        let mut state = apply_desired_config(&Frozen::new(SwitchState::default()), &resolver, &config)
            .unwrap()
            .unwrap();
        modify(&mut state.ports, |ports| {
            ports
                .modify_entry(&PortId(1), |port| {
                    port.oper_state = OperState::Up;
                    Ok(())
                })
                .unwrap();
        });
        modify(&mut state.interfaces, |intfs| {
            intfs
                .modify_entry(&InterfaceId(10), |intf| {
                    let ip = "10.0.0.2".parse().unwrap();
                    intf.neighbors.insert(
                        ip,
                        NeighborEntry::reachable(ip, MacAddress::new([2, 0, 0, 0, 0, 2]), PortDescriptor::Physical(PortId(1))),
                    );
                    Ok(())
                })
                .unwrap();
        });
        let state = state.freeze();
        let untouched_port = state.ports.get(&PortId(2)).unwrap().clone();

        config.ports[0].description = "uplink".to_string();
        let next = apply_desired_config(&state, &resolver, &config)
            .unwrap()
            .unwrap()
            .freeze();

        let port = next.port(PortId(1)).unwrap();
        assert_eq!(port.oper_state, OperState::Up);
        assert_eq!(port.description, "uplink");
        assert!(Frozen::ptr_eq(next.ports.get(&PortId(2)).unwrap(), &untouched_port));
        assert_eq!(next.interface(InterfaceId(10)).unwrap().neighbors.len(), 1);
        assert!(Frozen::ptr_eq(&next.interfaces, &state.interfaces));
    }

    #[test]
    fn test_removed_entries_are_deleted() {
        let mut config = config();
        let resolver = resolver(&config);
        let state = apply_desired_config(&Frozen::new(SwitchState::default()), &resolver, &config)
            .unwrap()
            .unwrap()
            .freeze();

        config.mirrors.clear();
        let next = apply_desired_config(&state, &resolver, &config)
            .unwrap()
            .unwrap()
            .freeze();
        assert!(next.mirrors.is_empty());
    }

    #[test]
    fn test_unowned_port_is_rejected() {
        let mut config = config();
        config.ports.push(Port::new(PortId(5000), "far"));
        let resolver = resolver(&config);

        assert!(apply_desired_config(&Frozen::new(SwitchState::default()), &resolver, &config).is_err());
    }

    #[tokio::test]
    async fn test_apply_config_through_pipeline() {
        let config = config();
        let resolver = Arc::new(resolver(&config));
        let pipeline = UpdatePipeline::start(
            Frozen::new(SwitchState::default()),
            Arc::new(NullHwSwitch),
            PipelineConfig::default(),
        )
        .unwrap();
        let ctx = AgentContext::with_config(resolver, pipeline.clone(), Arc::new(config));

        let state = apply_config(&ctx).await.unwrap();
        assert_eq!(state.ports.len(), 2);
        assert!(Frozen::ptr_eq(&state, &pipeline.snapshot()));

        let again = apply_config(&ctx).await.unwrap();
        assert!(Frozen::ptr_eq(&again, &state));
    }
}
