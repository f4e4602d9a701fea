//! Submitted updates and the tickets that track them.

use crate::error::{Result, StateError};
use crate::node::{Draft, Frozen};
use crate::state::SwitchState;
use std::fmt;
use std::time::Instant;
use tokio::sync::oneshot;

/// Outcome of a mutation: a new root, or `None` for no change.
pub type UpdateResult = Result<Option<Draft<SwitchState>>>;

pub(crate) type UpdateFn = Box<dyn FnOnce(&Frozen<SwitchState>) -> UpdateResult + Send>;

pub(crate) type Reply = oneshot::Sender<Result<Frozen<SwitchState>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateBehavior {
    /// May share a published snapshot with other pending updates
    Coalescing,
    /// Always applied and published on its own
    NonCoalescing,
}

impl fmt::Display for UpdateBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateBehavior::Coalescing => write!(f, "coalescing"),
            UpdateBehavior::NonCoalescing => write!(f, "non_coalescing"),
        }
    }
}

pub(crate) struct StateUpdate {
    pub(crate) name: String,
    pub(crate) func: UpdateFn,
    pub(crate) behavior: UpdateBehavior,
    pub(crate) reply: Reply,
    pub(crate) submitted_at: Instant,
}

impl StateUpdate {
    pub(crate) fn new(name: String, func: UpdateFn, behavior: UpdateBehavior) -> (Self, UpdateTicket) {
        let (reply, rx) = oneshot::channel();
        let ticket = UpdateTicket {
            name: name.clone(),
            rx,
        };
        let update = StateUpdate {
            name,
            func,
            behavior,
            reply,
            submitted_at: Instant::now(),
        };
        (update, ticket)
    }
}

/// Resolves once the update's batch was published, or failed.
///
/// The snapshot returned is the one published by the update's batch, or the
/// current snapshot if the update changed nothing.
#[must_use = "an update ticket does nothing unless waited on"]
pub struct UpdateTicket {
    name: String,
    rx: oneshot::Receiver<Result<Frozen<SwitchState>>>,
}

impl UpdateTicket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn wait(self) -> Result<Frozen<SwitchState>> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(StateError::PipelineClosed),
        }
    }

    /// Blocking form of [`UpdateTicket::wait`] for threads outside the
    /// runtime. Panics if called from within an async context.
    pub fn blocking_wait(self) -> Result<Frozen<SwitchState>> {
        match self.rx.blocking_recv() {
            Ok(result) => result,
            Err(_) => Err(StateError::PipelineClosed),
        }
    }
}

impl fmt::Debug for UpdateTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateTicket").field("name", &self.name).finish()
    }
}
