//! Port remediation.
//!
//! Ports that are configured up, powered and not looped back should be
//! operationally up. When hardware reports such a port down, the remediator
//! toggles it: one non-coalescing update forces the ports admin-down, a
//! second one brings them back up. Ports whose bring-up failed stay in the
//! forced-down set and are re-enabled first thing on the next cycle.

use super::ControllerError;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::error::Result;
use crate::node::modify;
use crate::pipeline::{PipelineHandle, UpdateResult};
use crate::state::SwitchState;
use crate::{audit_log, debug_log, error_log, info_log, warn_log};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use swstate_types::{AdminState, PortId};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

const THREAD_NAME: &str = "port-remediator";
const START_TIMEOUT: Duration = Duration::from_secs(5);

fn default_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    25
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between scans
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl RemediationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemediatorPhase {
    #[default]
    Idle,
    Scan,
    RemediateDown,
    RemediateUp,
}

impl fmt::Display for RemediatorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediatorPhase::Idle => write!(f, "idle"),
            RemediatorPhase::Scan => write!(f, "scan"),
            RemediatorPhase::RemediateDown => write!(f, "remediate_down"),
            RemediatorPhase::RemediateUp => write!(f, "remediate_up"),
        }
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemediationCycle {
    /// Ports left admin-down by an earlier cycle and re-enabled in this one
    pub restored: Vec<PortId>,
    /// Ports found down at scan time
    pub candidates: Vec<PortId>,
    /// Ports actually toggled
    pub toggled: Vec<PortId>,
}

impl RemediationCycle {
    pub fn is_noop(&self) -> bool {
        self.restored.is_empty() && self.toggled.is_empty()
    }
}

/// Ports the remediator has forced admin-down and not yet brought back up.
///
/// Entries are added once the down update is published and cleared only
/// once the matching up update is published, so a failed bring-up is
/// retried on the next cycle.
pub type ForcedDown = Mutex<BTreeSet<PortId>>;

/// Ports configured up, powered, not looped back, but down in hardware.
pub fn unexpectedly_down_ports(state: &SwitchState) -> Vec<PortId> {
    state
        .ports
        .values()
        .filter(|port| port.is_unexpectedly_down())
        .map(|port| port.id)
        .collect()
}

fn set_phase(phase: &Mutex<RemediatorPhase>, next: RemediatorPhase) {
    let mut current = phase.lock();
    debug_log!("PortRemediator", from = %*current, to = %next, "Phase change");
    *current = next;
}

fn port_ids(ports: &[PortId]) -> Vec<u32> {
    ports.iter().map(|p| p.get()).collect()
}

/// Runs one cycle: re-enables ports stranded by an earlier failed bring-up,
/// then scans and, if needed, toggles down ports. The phase is `Idle` again
/// when this returns.
pub async fn remediate(
    pipeline: &PipelineHandle,
    phase: &Mutex<RemediatorPhase>,
    forced: &ForcedDown,
) -> Result<RemediationCycle> {
    let result = run_cycle(pipeline, phase, forced).await;
    set_phase(phase, RemediatorPhase::Idle);
    let cycle = result?;

    if !cycle.is_noop() {
        audit_log!(AuditRecord::new(AuditCategory::AdminAction, "PortRemediator", "toggle_ports")
            .with_outcome(AuditOutcome::Success)
            .with_object_type("port")
            .with_details(serde_json::json!({
                "restored": port_ids(&cycle.restored),
                "candidates": port_ids(&cycle.candidates),
                "toggled": port_ids(&cycle.toggled),
            })));
    }
    Ok(cycle)
}

async fn run_cycle(
    pipeline: &PipelineHandle,
    phase: &Mutex<RemediatorPhase>,
    forced: &ForcedDown,
) -> Result<RemediationCycle> {
    let stranded: Vec<PortId> = forced.lock().iter().copied().collect();
    let restored = if stranded.is_empty() {
        Vec::new()
    } else {
        warn_log!("PortRemediator", ports = ?port_ids(&stranded), "Retrying bring-up of forced-down ports");
        bring_up(pipeline, phase, forced, stranded).await?
    };

    set_phase(phase, RemediatorPhase::Scan);
    let candidates = unexpectedly_down_ports(&pipeline.snapshot());
    if candidates.is_empty() {
        return Ok(RemediationCycle {
            restored,
            ..Default::default()
        });
    }

    let toggled = force_down(pipeline, phase, forced, &candidates).await?;
    if toggled.is_empty() {
        debug_log!("PortRemediator", "Ports recovered before remediation");
    } else {
        bring_up(pipeline, phase, forced, toggled.clone()).await?;
        info_log!("PortRemediator", ports = ?port_ids(&toggled), "Toggled unexpectedly down ports");
    }

    Ok(RemediationCycle {
        restored,
        candidates,
        toggled,
    })
}

/// Forces the ports that are still unexpectedly down admin-down in a
/// non-coalescing update and records them in `forced`.
async fn force_down(
    pipeline: &PipelineHandle,
    phase: &Mutex<RemediatorPhase>,
    forced: &ForcedDown,
    candidates: &[PortId],
) -> Result<Vec<PortId>> {
    set_phase(phase, RemediatorPhase::RemediateDown);
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let down: Vec<PortId> = candidates.to_vec();
    pipeline
        .submit_non_coalescing(format!("force down {} ports", down.len()), move |state| -> UpdateResult {
            // A port may have been fixed or reconfigured since the scan.
            let still_down: Vec<PortId> = down
                .into_iter()
                .filter(|id| state.port(*id).is_some_and(|p| p.is_unexpectedly_down()))
                .collect();
            if still_down.is_empty() {
                return Ok(None);
            }
            let mut draft = state.modify();
            modify(&mut draft.ports, |ports| {
                for id in &still_down {
                    let _ = ports.modify_entry(id, |port| {
                        port.admin_state = AdminState::Disabled;
                        Ok(())
                    });
                }
            });
            *sink.lock() = still_down;
            Ok(Some(draft))
        })
        .wait()
        .await?;

    let toggled = recorded.lock().clone();
    forced.lock().extend(toggled.iter().copied());
    Ok(toggled)
}

/// Re-enables `ports` and clears them from `forced` once published. Ports
/// that no longer exist are cleared without an update.
async fn bring_up(
    pipeline: &PipelineHandle,
    phase: &Mutex<RemediatorPhase>,
    forced: &ForcedDown,
    ports: Vec<PortId>,
) -> Result<Vec<PortId>> {
    set_phase(phase, RemediatorPhase::RemediateUp);
    let up = ports.clone();
    pipeline
        .submit(format!("bring up {} ports", up.len()), move |state| -> UpdateResult {
            let mut draft = state.modify();
            modify(&mut draft.ports, |ports| {
                for id in &up {
                    let _ = ports.modify_entry(id, |port| {
                        port.admin_state = AdminState::Enabled;
                        Ok(())
                    });
                }
            });
            Ok(Some(draft))
        })
        .wait()
        .await?;

    let mut forced = forced.lock();
    for id in &ports {
        forced.remove(id);
    }
    Ok(ports)
}

/// Periodic port remediation on a dedicated thread.
///
/// The thread runs its own current-thread runtime and talks to the state
/// only through pipeline submissions. Call [`PortRemediator::shutdown`]
/// before dropping.
///
/// `shutdown` and `Drop` block until the thread exits, and an in-flight
/// cycle only finishes once the pipeline answers its tickets. Never call
/// them from a task on a current-thread runtime that also drives the
/// pipeline; use `tokio::task::spawn_blocking` or a multi-thread runtime.
pub struct PortRemediator {
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    phase: Arc<Mutex<RemediatorPhase>>,
    forced: Arc<ForcedDown>,
    cycles: Arc<AtomicU64>,
}

impl PortRemediator {
    /// Spawns the remediation thread and waits until its timer is armed.
    ///
    /// # Errors
    ///
    /// Fails when the thread or its runtime cannot be started.
    pub fn start(pipeline: PipelineHandle, interval: Duration) -> std::result::Result<Self, ControllerError> {
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let phase = Arc::new(Mutex::new(RemediatorPhase::Idle));
        let forced = Arc::new(ForcedDown::default());
        let cycles = Arc::new(AtomicU64::new(0));

        let thread_phase = Arc::clone(&phase);
        let thread_forced = Arc::clone(&forced);
        let thread_cycles = Arc::clone(&cycles);
        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                runtime.block_on(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // The first tick completes immediately.
                    ticker.tick().await;
                    let _ = ready_tx.send(Ok(()));

                    loop {
                        tokio::select! {
                            _ = &mut stop_rx => break,
                            _ = ticker.tick() => {
                                match remediate(&pipeline, &thread_phase, &thread_forced).await {
                                    Ok(cycle) if !cycle.is_noop() => {
                                        debug_log!(
                                            "PortRemediator",
                                            restored = cycle.restored.len(),
                                            toggled = cycle.toggled.len(),
                                            "Cycle complete"
                                        );
                                    }
                                    Ok(_) => {}
                                    Err(e) => {
                                        warn_log!("PortRemediator", error = %e, "Remediation cycle failed");
                                    }
                                }
                                thread_cycles.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                });
            })
            .map_err(|e| ControllerError::Spawn {
                name: THREAD_NAME,
                reason: e.to_string(),
            })?;

        match ready_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = thread.join();
                return Err(ControllerError::Runtime {
                    name: THREAD_NAME,
                    reason,
                });
            }
            Err(_) => {
                let _ = stop_tx.send(());
                return Err(ControllerError::StartTimeout {
                    name: THREAD_NAME,
                    timeout: START_TIMEOUT,
                });
            }
        }

        info_log!("PortRemediator", interval_ms = interval.as_millis() as u64, "Port remediator started");
        audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "PortRemediator", "start")
            .with_outcome(AuditOutcome::Success));

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            phase,
            forced,
            cycles,
        })
    }

    pub fn phase(&self) -> RemediatorPhase {
        *self.phase.lock()
    }

    /// Ports forced admin-down whose bring-up has not been published yet.
    pub fn pending_bring_up(&self) -> Vec<PortId> {
        self.forced.lock().iter().copied().collect()
    }

    /// Completed scans, including those that found nothing.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Stops the timer and waits for any in-flight cycle to finish.
    ///
    /// Blocks the calling thread; see the type docs for runtime
    /// requirements.
    ///
    /// # Errors
    ///
    /// Fails when the thread panicked.
    pub fn shutdown(mut self) -> std::result::Result<(), ControllerError> {
        self.stop()
    }

    fn stop(&mut self) -> std::result::Result<(), ControllerError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread.join().map_err(|_| ControllerError::Panicked { name: THREAD_NAME })?;
        info_log!("PortRemediator", cycles = self.cycles(), "Port remediator stopped");
        Ok(())
    }
}

impl Drop for PortRemediator {
    fn drop(&mut self) {
        if self.thread.is_none() {
            return;
        }
        error_log!("PortRemediator", "Dropped while running, stopping without shutdown");
        if let Err(e) = self.stop() {
            error_log!("PortRemediator", error = %e, "Stop on drop failed");
        }
    }
}
