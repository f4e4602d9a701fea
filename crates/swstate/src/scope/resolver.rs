//! Maps logical entities to the switch elements responsible for them.

use super::{ScopeError, SwitchMatcher};
use crate::state::{
    AggregatePort, DsfNode, Interface, InterfaceKind, LabelForwardingEntry, Mirror, Port, Route,
    SwitchInfo, SwitchState, SwitchType, SystemPort, TeFlowEntry, Vlan,
};
use crate::{debug_log, warn_log};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use swstate_types::{PortId, SwitchId, SystemPortId};

pub type Result<T> = std::result::Result<T, ScopeError>;

/// An entity whose scope can be computed without looking at other state.
pub trait HasScope {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher>;
}

/// Resolves entity scopes against the chassis switch table.
///
/// The three convenience matchers are built on first use and cached.
#[derive(Debug)]
pub struct ScopeResolver {
    switches: BTreeMap<SwitchId, SwitchInfo>,
    all: OnceCell<SwitchMatcher>,
    l3: OnceCell<SwitchMatcher>,
    voq: OnceCell<SwitchMatcher>,
}

impl ScopeResolver {
    /// Validates the switch table.
    ///
    /// # Errors
    ///
    /// Fails on an empty table, on a chassis mixing NPU and VOQ elements,
    /// and on overlapping port or system port ranges.
    pub fn new(switches: BTreeMap<SwitchId, SwitchInfo>) -> Result<Self> {
        if switches.is_empty() {
            return Err(ScopeError::NoSwitches);
        }

        let npu = switches
            .values()
            .filter(|info| info.switch_type == SwitchType::Npu)
            .count();
        let voq = switches
            .values()
            .filter(|info| info.switch_type == SwitchType::Voq)
            .count();
        if npu > 0 && voq > 0 {
            return Err(ScopeError::ConflictingSwitchTypes { npu, voq });
        }

        let infos: Vec<(&SwitchId, &SwitchInfo)> = switches.iter().collect();
        for (i, (a_id, a)) in infos.iter().enumerate() {
            for (b_id, b) in &infos[i + 1..] {
                if a.port_id_range.overlaps(&b.port_id_range) {
                    return Err(ScopeError::OverlappingRanges {
                        kind: "port",
                        first: **a_id,
                        second: **b_id,
                    });
                }
                if let (Some(ra), Some(rb)) = (a.system_port_range, b.system_port_range) {
                    if ra.overlaps(&rb) {
                        return Err(ScopeError::OverlappingRanges {
                            kind: "system port",
                            first: **a_id,
                            second: **b_id,
                        });
                    }
                }
            }
        }

        debug_log!("ScopeResolver", switches = switches.len(), npu, voq, "Scope resolver created");
        Ok(Self {
            switches,
            all: OnceCell::new(),
            l3: OnceCell::new(),
            voq: OnceCell::new(),
        })
    }

    pub fn switch_infos(&self) -> &BTreeMap<SwitchId, SwitchInfo> {
        &self.switches
    }

    pub fn is_local_switch(&self, id: SwitchId) -> bool {
        self.switches.contains_key(&id)
    }

    pub fn has_switch_type(&self, switch_type: SwitchType) -> bool {
        self.switches.values().any(|info| info.switch_type == switch_type)
    }

    /// Every switch element.
    pub fn all_matcher(&self) -> &SwitchMatcher {
        self.all
            .get_or_init(|| SwitchMatcher::new(self.switches.keys().copied()))
    }

    /// Elements that route: NPU and VOQ.
    pub fn l3_matcher(&self) -> Result<&SwitchMatcher> {
        self.l3
            .get_or_try_init(|| self.build_matcher("l3", |info| info.switch_type.is_l3()))
    }

    /// Virtual-output-queue elements.
    pub fn voq_matcher(&self) -> Result<&SwitchMatcher> {
        self.voq.get_or_try_init(|| {
            self.build_matcher("voq", |info| info.switch_type == SwitchType::Voq)
        })
    }

    fn build_matcher<F>(&self, name: &'static str, filter: F) -> Result<SwitchMatcher>
    where
        F: Fn(&SwitchInfo) -> bool,
    {
        let matcher: SwitchMatcher = self
            .switches
            .iter()
            .filter(|(_, info)| filter(info))
            .map(|(id, _)| *id)
            .collect();
        if matcher.is_empty() {
            warn_log!("ScopeResolver", switch_type = name, "No switches of requested type");
            return Err(ScopeError::NoSuchSwitchType(name));
        }
        Ok(matcher)
    }

    pub fn scope<E: HasScope + ?Sized>(&self, entity: &E) -> Result<SwitchMatcher> {
        entity.resolve_scope(self)
    }

    pub fn scope_port(&self, id: PortId) -> Result<SwitchMatcher> {
        self.switches
            .iter()
            .find(|(_, info)| info.port_id_range.contains(id.get()))
            .map(|(switch_id, _)| SwitchMatcher::single(*switch_id))
            .ok_or_else(|| ScopeError::NoOwner(format!("port {}", id)))
    }

    /// A system port outside every local range is reachable through all VOQ
    /// elements.
    pub fn scope_system_port(&self, id: SystemPortId) -> Result<SwitchMatcher> {
        let local = self.switches.iter().find(|(_, info)| {
            info.system_port_range
                .map(|range| range.contains(id.get()))
                .unwrap_or(false)
        });
        match local {
            Some((switch_id, _)) => Ok(SwitchMatcher::single(*switch_id)),
            None => self.voq_matcher().cloned(),
        }
    }

    /// Union of the member port scopes, or the L3 matcher when there are no
    /// members.
    pub fn scope_ports<I>(&self, ports: I) -> Result<SwitchMatcher>
    where
        I: IntoIterator<Item = PortId>,
    {
        let mut matcher: Option<SwitchMatcher> = None;
        for port in ports {
            let scope = self.scope_port(port)?;
            matcher = Some(match matcher {
                Some(acc) => acc.union(&scope),
                None => scope,
            });
        }
        match matcher {
            Some(matcher) => Ok(matcher),
            None => self.l3_matcher().cloned(),
        }
    }

    /// Interfaces depend on state: a VLAN interface takes the scope of its
    /// VLAN's members.
    pub fn scope_interface(&self, intf: &Interface, state: &SwitchState) -> Result<SwitchMatcher> {
        match intf.kind {
            InterfaceKind::Vlan(vlan_id) => {
                let vlan = state
                    .vlan(vlan_id)
                    .ok_or(ScopeError::UnknownVlan(vlan_id))?;
                self.scope(&**vlan)
            }
            InterfaceKind::Port(port_id) => self.scope_port(port_id),
            InterfaceKind::SystemPort(sp) => self.scope_system_port(sp),
        }
    }

    /// Remote fabric entries live on every VOQ element.
    pub fn remote_scope(&self) -> Result<SwitchMatcher> {
        self.voq_matcher().cloned()
    }
}

impl HasScope for PortId {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.scope_port(*self)
    }
}

impl HasScope for SystemPortId {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.scope_system_port(*self)
    }
}

impl HasScope for Port {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.scope_port(self.id)
    }
}

impl HasScope for SystemPort {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.scope_system_port(self.id)
    }
}

impl HasScope for Vlan {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.scope_ports(self.member_ports())
    }
}

impl HasScope for AggregatePort {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.scope_ports(self.members.iter().copied())
    }
}

impl HasScope for LabelForwardingEntry {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.l3_matcher().cloned()
    }
}

impl HasScope for Route {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.l3_matcher().cloned()
    }
}

impl HasScope for Mirror {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.l3_matcher().cloned()
    }
}

impl HasScope for TeFlowEntry {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        resolver.l3_matcher().cloned()
    }
}

impl HasScope for DsfNode {
    fn resolve_scope(&self, resolver: &ScopeResolver) -> Result<SwitchMatcher> {
        Ok(resolver.all_matcher().clone())
    }
}
