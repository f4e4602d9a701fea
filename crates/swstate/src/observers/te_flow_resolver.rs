//! Re-resolves TE flows when neighbor tables move.

use crate::delta::StateDelta;
use crate::fib::refresh_te_flow_resolution;
use crate::pipeline::{StateObserver, UpdateResult, UpdateSubmitter};

pub struct TeFlowResolver {
    submitter: UpdateSubmitter,
}

impl TeFlowResolver {
    pub fn new(submitter: UpdateSubmitter) -> Self {
        Self { submitter }
    }
}

impl StateObserver for TeFlowResolver {
    fn name(&self) -> &str {
        "TeFlowResolver"
    }

    fn state_updated(&self, delta: &StateDelta) {
        if delta.new_state().te_flows.is_empty() || delta.interfaces().is_empty() {
            return;
        }
        let _ticket = self.submitter.submit("resolve te flows", |state| -> UpdateResult {
            let mut draft = state.modify();
            if refresh_te_flow_resolution(&mut draft) {
                Ok(Some(draft))
            } else {
                Ok(None)
            }
        });
    }
}
