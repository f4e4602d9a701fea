//! Single-writer update pipeline.

use super::hw::HwSwitch;
use super::observer::{ObserverRegistry, StateObserver};
use super::update::{Reply, StateUpdate, UpdateBehavior, UpdateFn, UpdateResult, UpdateTicket};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::delta::StateDelta;
use crate::error::{Result, StateError};
use crate::node::{Frozen, NodeCell};
use crate::state::SwitchState;
use crate::{audit_log, debug_log, error_log, info_log, warn_log};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use swstate_common::{StatusCounters, UpdateStatus};
use tokio::sync::{mpsc, oneshot};

fn default_max_batch_size() -> usize {
    128
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on updates coalesced into one snapshot
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

enum Command {
    Update(StateUpdate),
    Shutdown(oneshot::Sender<()>),
}

/// Cheap, cloneable entry point for submitting updates.
///
/// Observers keep one of these rather than a full [`PipelineHandle`].
#[derive(Clone)]
pub struct UpdateSubmitter {
    tx: mpsc::UnboundedSender<Command>,
    stats: Arc<Mutex<StatusCounters>>,
}

impl UpdateSubmitter {
    /// Queues an update that may be coalesced with other pending updates.
    pub fn submit<F>(&self, name: impl Into<String>, func: F) -> UpdateTicket
    where
        F: FnOnce(&Frozen<SwitchState>) -> UpdateResult + Send + 'static,
    {
        self.enqueue(name.into(), Box::new(func), UpdateBehavior::Coalescing)
    }

    /// Queues an update that is always published on its own.
    pub fn submit_non_coalescing<F>(&self, name: impl Into<String>, func: F) -> UpdateTicket
    where
        F: FnOnce(&Frozen<SwitchState>) -> UpdateResult + Send + 'static,
    {
        self.enqueue(name.into(), Box::new(func), UpdateBehavior::NonCoalescing)
    }

    fn enqueue(&self, name: String, func: UpdateFn, behavior: UpdateBehavior) -> UpdateTicket {
        let (update, ticket) = StateUpdate::new(name, func, behavior);
        if self.tx.send(Command::Update(update)).is_err() {
            debug_log!("UpdatePipeline", update = ticket.name(), "Pipeline closed, update dropped");
            self.stats.lock().record(UpdateStatus::Dropped);
        }
        ticket
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle to a running pipeline: submit updates, read the published
/// snapshot, manage observers.
#[derive(Clone)]
pub struct PipelineHandle {
    submitter: UpdateSubmitter,
    published: Arc<ArcSwap<NodeCell<SwitchState>>>,
    observers: ObserverRegistry,
}

impl PipelineHandle {
    /// The most recently published snapshot. Never blocks.
    pub fn snapshot(&self) -> Frozen<SwitchState> {
        Frozen::from_cell(self.published.load_full())
    }

    pub fn submitter(&self) -> UpdateSubmitter {
        self.submitter.clone()
    }

    pub fn submit<F>(&self, name: impl Into<String>, func: F) -> UpdateTicket
    where
        F: FnOnce(&Frozen<SwitchState>) -> UpdateResult + Send + 'static,
    {
        self.submitter.submit(name, func)
    }

    pub fn submit_non_coalescing<F>(&self, name: impl Into<String>, func: F) -> UpdateTicket
    where
        F: FnOnce(&Frozen<SwitchState>) -> UpdateResult + Send + 'static,
    {
        self.submitter.submit_non_coalescing(name, func)
    }

    pub async fn submit_and_wait<F>(&self, name: impl Into<String>, func: F) -> Result<Frozen<SwitchState>>
    where
        F: FnOnce(&Frozen<SwitchState>) -> UpdateResult + Send + 'static,
    {
        self.submit(name, func).wait().await
    }

    /// Observers registered later only see deltas published afterwards.
    pub fn register_observer(&self, observer: Arc<dyn StateObserver>) {
        self.observers.register(observer);
    }

    pub fn unregister_observer(&self, name: &str) -> bool {
        self.observers.unregister(name)
    }

    pub fn observer_names(&self) -> Vec<String> {
        self.observers.names()
    }

    pub fn stats(&self) -> StatusCounters {
        *self.submitter.stats.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.submitter.is_closed()
    }

    /// Applies everything already queued, then stops the pipeline. Later
    /// submissions fail with [`StateError::PipelineClosed`].
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.submitter.tx.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// The pipeline task. Owns the only writable view of the state.
pub struct UpdatePipeline {
    rx: mpsc::UnboundedReceiver<Command>,
    pending: Option<Command>,
    current: Frozen<SwitchState>,
    published: Arc<ArcSwap<NodeCell<SwitchState>>>,
    observers: ObserverRegistry,
    hw: Arc<dyn HwSwitch>,
    stats: Arc<Mutex<StatusCounters>>,
    config: PipelineConfig,
    batch_seq: u64,
}

impl UpdatePipeline {
    /// Publishes `initial` and spawns the pipeline task on the current tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime.
    pub fn start(
        initial: Frozen<SwitchState>,
        hw: Arc<dyn HwSwitch>,
        config: PipelineConfig,
    ) -> Result<PipelineHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StateError::Setup(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let published = Arc::new(ArcSwap::new(initial.clone().into_cell()));
        let observers = ObserverRegistry::default();
        let stats = Arc::new(Mutex::new(StatusCounters::default()));

        let pipeline = UpdatePipeline {
            rx,
            pending: None,
            current: initial,
            published: Arc::clone(&published),
            observers: observers.clone(),
            hw,
            stats: Arc::clone(&stats),
            config: PipelineConfig {
                max_batch_size: config.max_batch_size.max(1),
            },
            batch_seq: 0,
        };
        runtime.spawn(pipeline.run());

        Ok(PipelineHandle {
            submitter: UpdateSubmitter { tx, stats },
            published,
            observers,
        })
    }

    async fn run(mut self) {
        info_log!("UpdatePipeline", max_batch_size = self.config.max_batch_size, "Update pipeline started");

        loop {
            let command = match self.pending.take() {
                Some(command) => command,
                None => match self.rx.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Update(update) => {
                    let batch = self.collect_batch(update);
                    self.apply_batch(batch);
                }
                Command::Shutdown(done) => {
                    self.drain(done);
                    break;
                }
            }
        }

        let stats = *self.stats.lock();
        info_log!(
            "UpdatePipeline",
            batches = stats.batches_published,
            applied = stats.applied,
            rejected = stats.rejected,
            "Update pipeline stopped"
        );
    }

    /// Takes `first` plus every coalescing update already queued behind it.
    fn collect_batch(&mut self, first: StateUpdate) -> Vec<StateUpdate> {
        let coalesce = first.behavior == UpdateBehavior::Coalescing;
        let mut batch = vec![first];
        if !coalesce {
            return batch;
        }

        while batch.len() < self.config.max_batch_size {
            match self.rx.try_recv() {
                Ok(Command::Update(update)) if update.behavior == UpdateBehavior::Coalescing => {
                    batch.push(update);
                }
                Ok(other) => {
                    self.pending = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        batch
    }

    fn drain(&mut self, done: oneshot::Sender<()>) {
        self.rx.close();
        let mut waiters = vec![done];

        loop {
            let command = match self.pending.take() {
                Some(command) => command,
                None => match self.rx.try_recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };
            match command {
                Command::Update(update) => {
                    let batch = self.collect_batch(update);
                    self.apply_batch(batch);
                }
                Command::Shutdown(done) => waiters.push(done),
            }
        }

        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    fn apply_batch(&mut self, batch: Vec<StateUpdate>) {
        self.batch_seq += 1;
        let batch_id = format!("batch-{}", self.batch_seq);
        let started = Instant::now();
        let old = self.current.clone();
        let mut working = old.clone();
        let mut accepted: Vec<(String, Reply, UpdateStatus)> = Vec::with_capacity(batch.len());

        for update in batch {
            let StateUpdate {
                name,
                func,
                reply,
                submitted_at,
                ..
            } = update;

            match func(&working) {
                Ok(Some(draft)) => {
                    working = draft.freeze();
                    accepted.push((name, reply, UpdateStatus::Applied));
                }
                Ok(None) => accepted.push((name, reply, UpdateStatus::NoChange)),
                Err(err) => {
                    warn_log!(
                        "UpdatePipeline",
                        update = %name,
                        error = %err,
                        queued_us = submitted_at.elapsed().as_micros() as u64,
                        "Update rejected"
                    );
                    audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, "UpdatePipeline", "apply_update")
                        .with_object_type("update")
                        .with_object_id(&name)
                        .with_correlation_id(&batch_id)
                        .with_error(err.to_string())
                        .with_outcome(AuditOutcome::Denied));
                    self.stats.lock().record(UpdateStatus::Rejected);
                    let _ = reply.send(Err(err));
                }
            }
        }

        if accepted.is_empty() {
            return;
        }

        let names: Vec<&str> = accepted.iter().map(|(name, _, _)| name.as_str()).collect();
        let delta = StateDelta::new(old.clone(), working.clone());
        if delta.is_empty() {
            debug_log!("UpdatePipeline", batch = %batch_id, updates = ?names, "Batch produced no change");
            let mut stats = self.stats.lock();
            for (_, reply, _) in accepted {
                stats.record(UpdateStatus::NoChange);
                let _ = reply.send(Ok(old.clone()));
            }
            return;
        }

        if let Err(err) = self.hw.state_changed(&delta) {
            error_log!("UpdatePipeline", batch = %batch_id, updates = ?names, error = %err, "Hardware apply failed");
            audit_log!(AuditRecord::new(AuditCategory::HwOperation, "UpdatePipeline", "state_changed")
                .with_outcome(AuditOutcome::Failure)
                .with_correlation_id(&batch_id)
                .with_details(serde_json::json!({
                    "updates": names,
                    "changes": delta.summary(),
                }))
                .with_error(err.to_string()));
            let mut stats = self.stats.lock();
            for (_, reply, _) in accepted {
                stats.record(UpdateStatus::HwFailed);
                let _ = reply.send(Err(StateError::HwApply(err.to_string())));
            }
            return;
        }

        self.published.store(working.clone().into_cell());
        self.current = working.clone();
        {
            let mut stats = self.stats.lock();
            stats.batches_published += 1;
            for (_, _, status) in &accepted {
                stats.record(*status);
            }
        }

        self.observers.notify(&delta);

        let changes = delta.summary();
        debug_log!(
            "UpdatePipeline",
            batch = %batch_id,
            updates = ?names,
            generation = working.generation(),
            duration_us = started.elapsed().as_micros() as u64,
            changes = %changes,
            "Published snapshot"
        );
        audit_log!(AuditRecord::new(AuditCategory::StatePublish, "UpdatePipeline", "publish")
            .with_outcome(AuditOutcome::Success)
            .with_object_type("snapshot")
            .with_generation(working.generation())
            .with_correlation_id(&batch_id)
            .with_details(serde_json::json!({
                "updates": names,
                "changes": changes,
            })));

        for (_, reply, _) in accepted {
            let _ = reply.send(Ok(working.clone()));
        }
    }
}
