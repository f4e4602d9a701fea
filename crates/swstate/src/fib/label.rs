//! MPLS label forwarding base.
//!
//! Every label entry collects next hops from any number of clients. The
//! entry forwards with the best contribution (lowest admin distance, ties to
//! the lowest client id) and falls back to the next best when that client
//! withdraws.

use super::multi::{program_entry, purge_client, unprogram_entry};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::context::AgentContext;
use crate::error::{Result, StateError};
use crate::node::{modify, try_modify, Frozen};
use crate::pipeline::UpdateResult;
use crate::scope::ScopeResolver;
use crate::state::{
    validate_next_hops, LabelForwardingEntry, NextHopEntry, NextHopSet, ResolvedNextHops,
    SwitchState,
};
use crate::{audit_log, info_log};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use swstate_types::{AdminDistance, ClientId, Label};

/// Adds or replaces `client`'s next hops for `label`.
///
/// # Errors
///
/// `InvalidLabel` above the 20-bit label space, `InvalidNextHops` for an
/// empty or mixed-family set.
pub fn program_label(
    state: &mut SwitchState,
    resolver: &ScopeResolver,
    label: u32,
    client: ClientId,
    distance: AdminDistance,
    next_hops: NextHopSet,
) -> Result<()> {
    let label = Label::new(label)?;
    validate_next_hops(&next_hops)?;
    let entry = NextHopEntry::new(next_hops, distance);

    try_modify(&mut state.label_fib, |fib| {
        program_entry(fib, resolver, label, client, entry, |client, entry| {
            LabelForwardingEntry::new(label, client, entry)
        })
    })
}

/// Withdraws `client`'s next hops for `label`, deleting the entry once no
/// client is left.
pub fn unprogram_label(state: &mut SwitchState, label: Label, client: ClientId) -> Result<()> {
    try_modify(&mut state.label_fib, |fib| {
        unprogram_entry(fib, &label, client, || StateError::LabelNotFound(label))
    })
}

/// Withdraws `client` from every label entry. Returns the number of entries
/// touched; running it twice touches nothing the second time.
pub fn purge_entries_for_client(state: &mut SwitchState, client: ClientId) -> usize {
    let has_client = state
        .label_fib
        .values()
        .any(|entry| entry.next_hops_multi.has_client(client));
    if !has_client {
        return 0;
    }
    modify(&mut state.label_fib, |fib| purge_client(fib, client))
}

/// Submits label forwarding changes through the update pipeline.
pub struct LabelForwardingManager {
    ctx: AgentContext,
}

impl LabelForwardingManager {
    pub fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    pub async fn program(
        &self,
        label: u32,
        client: ClientId,
        distance: AdminDistance,
        next_hops: NextHopSet,
    ) -> Result<Frozen<SwitchState>> {
        let resolver = Arc::clone(&self.ctx.resolver);
        let name = format!("program label {} client {}", label, client);
        let created = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&created);
        let state = self
            .ctx
            .pipeline
            .submit_and_wait(name, move |state| -> UpdateResult {
                let existed = Label::new(label).is_ok_and(|l| state.label_entry(l).is_some());
                let mut draft = state.modify();
                program_label(&mut draft, &resolver, label, client, distance, next_hops)?;
                seen.store(!existed, Ordering::Relaxed);
                Ok(Some(draft))
            })
            .await?;

        let category = AuditCategory::for_change(!created.load(Ordering::Relaxed), true);
        audit_log!(AuditRecord::new(category, "LabelFib", "program")
            .with_outcome(AuditOutcome::Success)
            .with_object_type("label_entry")
            .with_object_id(label.to_string())
            .with_details(serde_json::json!({ "client": client.get() })));
        Ok(state)
    }

    pub async fn unprogram(&self, label: Label, client: ClientId) -> Result<Frozen<SwitchState>> {
        let name = format!("unprogram label {} client {}", label, client);
        let state = self
            .ctx
            .pipeline
            .submit_and_wait(name, move |state| -> UpdateResult {
                let mut draft = state.modify();
                unprogram_label(&mut draft, label, client)?;
                Ok(Some(draft))
            })
            .await?;

        // The entry is gone once its last client withdrew.
        let category = AuditCategory::for_change(true, state.label_entry(label).is_some());
        audit_log!(AuditRecord::new(category, "LabelFib", "unprogram")
            .with_outcome(AuditOutcome::Success)
            .with_object_type("label_entry")
            .with_object_id(label.to_string())
            .with_details(serde_json::json!({ "client": client.get() })));
        Ok(state)
    }

    pub async fn purge_entries_for_client(&self, client: ClientId) -> Result<Frozen<SwitchState>> {
        let name = format!("purge labels of client {}", client);
        self.ctx
            .pipeline
            .submit_and_wait(name, move |state| -> UpdateResult {
                let mut draft = state.modify();
                let purged = purge_entries_for_client(&mut draft, client);
                if purged == 0 {
                    return Ok(None);
                }
                info_log!("LabelFib", client = client.get(), entries = purged, "Purged client label entries");
                Ok(Some(draft))
            })
            .await
    }

    /// Best contribution for `label` in the published snapshot.
    pub fn resolved(&self, label: Label) -> Option<ResolvedNextHops> {
        self.ctx
            .pipeline
            .snapshot()
            .label_entry(label)
            .and_then(|entry| entry.next_hops_multi.resolved().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{NullHwSwitch, PipelineConfig, UpdatePipeline};
    use crate::state::{NextHop, SwitchInfo, SwitchType};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use swstate_types::{IdRange, SwitchId};

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

    fn nhs(addrs: &[&str]) -> NextHopSet {
        addrs
            .iter()
            .map(|a| NextHop::new(a.parse().unwrap()))
            .collect()
    }

    fn label(value: u32) -> Label {
        Label::new(value).unwrap()
    }

    #[test]
    fn test_fallback_to_next_best_client() {
        let resolver = resolver();
        let mut state = SwitchState::default();
        program_label(&mut state, &resolver, 100, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"])).unwrap();
        program_label(&mut state, &resolver, 100, ClientId(2), AdminDistance(20), nhs(&["10.0.0.2"])).unwrap();

        let entry = state.label_entry(label(100)).unwrap();
        assert_eq!(entry.resolved_client(), Some(ClientId(1)));
        assert_eq!(entry.resolved_next_hops(), Some(&nhs(&["10.0.0.1"])));

        unprogram_label(&mut state, label(100), ClientId(1)).unwrap();
        let entry = state.label_entry(label(100)).unwrap();
        assert_eq!(entry.resolved_client(), Some(ClientId(2)));
        assert_eq!(entry.resolved_next_hops(), Some(&nhs(&["10.0.0.2"])));

        unprogram_label(&mut state, label(100), ClientId(2)).unwrap();
        assert!(state.label_entry(label(100)).is_none());
    }

    #[test]
    fn test_program_validation() {
        let resolver = resolver();
        let mut state = SwitchState::default();

        let err = program_label(&mut state, &resolver, 1 << 20, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"]))
            .unwrap_err();
        assert_eq!(err, StateError::InvalidLabel(1 << 20));

        let err = program_label(&mut state, &resolver, 5, ClientId(1), AdminDistance(10), NextHopSet::new())
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidNextHops(_)));

        let err = program_label(
            &mut state,
            &resolver,
            5,
            ClientId(1),
            AdminDistance(10),
            nhs(&["10.0.0.1", "2001:db8::1"]),
        )
        .unwrap_err();
        assert!(matches!(err, StateError::InvalidNextHops(_)));
        assert!(state.label_fib.is_empty());
    }

    #[test]
    fn test_unprogram_missing() {
        let resolver = resolver();
        let mut state = SwitchState::default();
        assert_eq!(
            unprogram_label(&mut state, label(7), ClientId(1)).unwrap_err(),
            StateError::LabelNotFound(label(7))
        );

        program_label(&mut state, &resolver, 7, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"])).unwrap();
        let before = state.label_fib.clone();
        assert!(matches!(
            unprogram_label(&mut state, label(7), ClientId(9)),
            Err(StateError::ClientNotFound { .. })
        ));
        assert!(Frozen::ptr_eq(&before, &state.label_fib));
    }

    #[test]
    fn test_purge_is_idempotent() {
        let resolver = resolver();
        let mut state = SwitchState::default();
        program_label(&mut state, &resolver, 1, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"])).unwrap();
        program_label(&mut state, &resolver, 2, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"])).unwrap();
        program_label(&mut state, &resolver, 2, ClientId(2), AdminDistance(20), nhs(&["10.0.0.2"])).unwrap();
        program_label(&mut state, &resolver, 3, ClientId(2), AdminDistance(20), nhs(&["10.0.0.2"])).unwrap();

        assert_eq!(purge_entries_for_client(&mut state, ClientId(1)), 2);
        let after_first = state.clone();
        assert_eq!(purge_entries_for_client(&mut state, ClientId(1)), 0);
        assert_eq!(state, after_first);

        assert!(state.label_entry(label(1)).is_none());
        assert_eq!(state.label_entry(label(2)).unwrap().resolved_client(), Some(ClientId(2)));
        assert!(state.label_entry(label(3)).is_some());
    }

    #[tokio::test]
    async fn test_manager_round_trip() {
        let resolver = Arc::new(resolver());
        let pipeline = UpdatePipeline::start(
            Frozen::new(SwitchState::default()),
            Arc::new(NullHwSwitch),
            PipelineConfig::default(),
        )
        .unwrap();
        let manager = LabelForwardingManager::new(AgentContext::new(resolver, pipeline.clone()));

        manager
            .program(100, ClientId(1), AdminDistance(10), nhs(&["10.0.0.1"]))
            .await
            .unwrap();
        assert_eq!(manager.resolved(label(100)).unwrap().client, ClientId(1));

        manager.unprogram(label(100), ClientId(1)).await.unwrap();
        assert!(manager.resolved(label(100)).is_none());

        let before = pipeline.snapshot();
        let after = manager.purge_entries_for_client(ClientId(1)).await.unwrap();
        assert!(Frozen::ptr_eq(&before, &after));
    }
}
