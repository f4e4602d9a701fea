//! Background controllers that converge hardware toward desired state.

mod remediator;

pub use remediator::{
    remediate, unexpectedly_down_ports, ForcedDown, PortRemediator, RemediationConfig, RemediationCycle,
    RemediatorPhase,
};

use std::time::Duration;
use thiserror::Error;

/// Lifecycle errors of a controller thread.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Failed to spawn {name} thread: {reason}")]
    Spawn { name: &'static str, reason: String },

    #[error("Failed to build {name} runtime: {reason}")]
    Runtime { name: &'static str, reason: String },

    #[error("{name} did not start within {timeout:?}")]
    StartTimeout { name: &'static str, timeout: Duration },

    #[error("{name} thread panicked")]
    Panicked { name: &'static str },
}
