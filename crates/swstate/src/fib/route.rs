//! Unicast route table with per-client next hops.

use super::multi::{program_entry, purge_client, unprogram_entry};
use crate::context::AgentContext;
use crate::error::{Result, StateError};
use crate::node::{modify, try_modify, Frozen, StateEntity};
use crate::pipeline::UpdateResult;
use crate::scope::ScopeResolver;
use crate::state::{validate_next_hops, NextHopEntry, NextHopSet, Route, RouteKey, SwitchState};
use crate::{debug_log, info_log};
use std::sync::Arc;
use swstate_types::{AdminDistance, ClientId};

/// Adds or replaces `client`'s next hops for the route at `key`.
pub fn program_route(
    state: &mut SwitchState,
    resolver: &ScopeResolver,
    key: RouteKey,
    client: ClientId,
    distance: AdminDistance,
    next_hops: NextHopSet,
) -> Result<()> {
    validate_next_hops(&next_hops)?;
    if let Some(nh) = next_hops.iter().find(|nh| nh.family() != key.prefix.family()) {
        return Err(StateError::InvalidNextHops(format!(
            "next hop {} does not match prefix {}",
            nh, key.prefix
        )));
    }
    let entry = NextHopEntry::new(next_hops, distance);

    try_modify(&mut state.routes, |routes| {
        program_entry(routes, resolver, key, client, entry, |client, entry| {
            Route::new(key, client, entry)
        })
    })
}

pub fn unprogram_route(state: &mut SwitchState, key: RouteKey, client: ClientId) -> Result<()> {
    try_modify(&mut state.routes, |routes| {
        unprogram_entry(routes, &key, client, || StateError::not_found(Route::KIND, key))
    })
}

/// Withdraws `client` from every route. Returns the number of routes touched.
pub fn purge_routes_for_client(state: &mut SwitchState, client: ClientId) -> usize {
    if !state.routes.values().any(|r| r.next_hops_multi.has_client(client)) {
        return 0;
    }
    modify(&mut state.routes, |routes| purge_client(routes, client))
}

/// Submits route changes through the update pipeline.
pub struct RouteManager {
    ctx: AgentContext,
}

impl RouteManager {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn program(
        &self,
        key: RouteKey,
        client: ClientId,
        distance: AdminDistance,
        next_hops: NextHopSet,
    ) -> Result<Frozen<SwitchState>> {
        let resolver = Arc::clone(&self.ctx.resolver);
        debug_log!("RouteManager", route = %key, client = %client, "Programming route");
        self.ctx
            .pipeline
            .submit_and_wait(format!("program route {} client {}", key, client), move |state| -> UpdateResult {
                let mut draft = state.modify();
                program_route(&mut draft, &resolver, key, client, distance, next_hops)?;
                Ok(Some(draft))
            })
            .await
    }

    pub async fn unprogram(&self, key: RouteKey, client: ClientId) -> Result<Frozen<SwitchState>> {
        self.ctx
            .pipeline
            .submit_and_wait(format!("unprogram route {} client {}", key, client), move |state| -> UpdateResult {
                let mut draft = state.modify();
                unprogram_route(&mut draft, key, client)?;
                Ok(Some(draft))
            })
            .await
    }

    pub async fn purge_routes_for_client(&self, client: ClientId) -> Result<Frozen<SwitchState>> {
        self.ctx
            .pipeline
            .submit_and_wait(format!("purge routes of client {}", client), move |state| -> UpdateResult {
                let mut draft = state.modify();
                let purged = purge_routes_for_client(&mut draft, client);
                if purged == 0 {
                    return Ok(None);
                }
                info_log!("RouteManager", client = %client, routes = purged, "Purged client routes");
                Ok(Some(draft))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{NextHop, SwitchInfo, SwitchType};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use swstate_types::{IdRange, RouterId, SwitchId};

    fn resolver() -> ScopeResolver {
        ScopeResolver::new(BTreeMap::from([(
            SwitchId(0),
            SwitchInfo {
                switch_type: SwitchType::Npu,
                switch_index: 0,
                port_id_range: IdRange::new(0, 1023).unwrap(),
                system_port_range: None,
                mac: None,
            },
        )]))
        .unwrap()
    }

    fn key(prefix: &str) -> RouteKey {
        RouteKey::new(RouterId::default(), prefix.parse().unwrap())
    }

    fn nhs(addrs: &[&str]) -> NextHopSet {
        addrs
            .iter()
            .map(|a| NextHop::new(a.parse().unwrap()))
            .collect()
    }

    #[test]
    fn test_program_and_unprogram() {
        let resolver = resolver();
        let mut state = SwitchState::default();
        let k = key("10.1.0.0/16");

        program_route(&mut state, &resolver, k, ClientId::BGP, AdminDistance::EBGP, nhs(&["10.0.0.1"])).unwrap();
        program_route(&mut state, &resolver, k, ClientId::STATIC_ROUTE, AdminDistance::STATIC_ROUTE, nhs(&["10.0.0.9"]))
            .unwrap();

        let route = state.routes.get(&k).unwrap();
        assert_eq!(route.resolved_next_hops(), Some(&nhs(&["10.0.0.9"])));
        assert_eq!(state.routes.scope_of(&k), Some(&resolver.l3_matcher().unwrap().clone()));

        unprogram_route(&mut state, k, ClientId::STATIC_ROUTE).unwrap();
        assert_eq!(state.routes.get(&k).unwrap().resolved_next_hops(), Some(&nhs(&["10.0.0.1"])));

        unprogram_route(&mut state, k, ClientId::BGP).unwrap();
        assert!(state.routes.is_empty());
        assert_eq!(
            unprogram_route(&mut state, k, ClientId::BGP).unwrap_err(),
            StateError::not_found(Route::KIND, k)
        );
    }

    #[test]
    fn test_family_mismatch_rejected() {
        let resolver = resolver();
        let mut state = SwitchState::default();
        let err = program_route(
            &mut state,
            &resolver,
            key("2001:db8::/32"),
            ClientId::BGP,
            AdminDistance::EBGP,
            nhs(&["10.0.0.1"]),
        )
        .unwrap_err();
        assert!(matches!(err, StateError::InvalidNextHops(_)));
    }

    #[test]
    fn test_purge_routes() {
        let resolver = resolver();
        let mut state = SwitchState::default();
        program_route(&mut state, &resolver, key("10.1.0.0/16"), ClientId::BGP, AdminDistance::EBGP, nhs(&["10.0.0.1"]))
            .unwrap();
        program_route(&mut state, &resolver, key("10.2.0.0/16"), ClientId::OPENR, AdminDistance::OPENR, nhs(&["10.0.0.2"]))
            .unwrap();

        assert_eq!(purge_routes_for_client(&mut state, ClientId::BGP), 1);
        assert_eq!(purge_routes_for_client(&mut state, ClientId::BGP), 0);
        assert_eq!(state.routes.len(), 1);
    }
}
