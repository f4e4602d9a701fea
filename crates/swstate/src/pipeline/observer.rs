//! Observers notified of every published delta.

use crate::delta::StateDelta;
use crate::{debug_log, warn_log};
use parking_lot::RwLock;
use std::sync::Arc;

/// Reacts to published state transitions.
///
/// Runs synchronously on the pipeline task, in registration order. An
/// observer that wants to change state submits a follow-up update through an
/// [`UpdateSubmitter`](super::UpdateSubmitter) and never waits on it.
pub trait StateObserver: Send + Sync {
    fn name(&self) -> &str;

    fn state_updated(&self, delta: &StateDelta);
}

#[derive(Clone, Default)]
pub(crate) struct ObserverRegistry {
    observers: Arc<RwLock<Vec<Arc<dyn StateObserver>>>>,
}

impl ObserverRegistry {
    pub(crate) fn register(&self, observer: Arc<dyn StateObserver>) {
        let mut observers = self.observers.write();
        if observers.iter().any(|o| o.name() == observer.name()) {
            warn_log!("UpdatePipeline", observer = observer.name(), "Observer registered twice");
        }
        debug_log!("UpdatePipeline", observer = observer.name(), "Registering observer");
        observers.push(observer);
    }

    pub(crate) fn unregister(&self, name: &str) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|o| o.name() != name);
        before != observers.len()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.observers
            .read()
            .iter()
            .map(|o| o.name().to_string())
            .collect()
    }

    /// Notifies a copy of the list so observers may (un)register others.
    pub(crate) fn notify(&self, delta: &StateDelta) {
        let observers: Vec<Arc<dyn StateObserver>> = self.observers.read().clone();
        for observer in observers {
            observer.state_updated(delta);
        }
    }
}
