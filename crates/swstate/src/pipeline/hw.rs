//! Hardware programming seam.

use crate::debug_log;
use crate::delta::StateDelta;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {reason}")]
pub struct HwError {
    pub operation: String,
    pub reason: String,
}

impl HwError {
    pub fn new(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Programs the difference between two snapshots into hardware.
///
/// Called on the pipeline task before the new snapshot is published. An
/// error keeps the old snapshot published and fails every update in the
/// batch; there is no retry.
pub trait HwSwitch: Send + Sync {
    fn state_changed(&self, delta: &StateDelta) -> Result<(), HwError>;
}

/// Accepts every delta. Used when no hardware is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHwSwitch;

impl HwSwitch for NullHwSwitch {
    fn state_changed(&self, delta: &StateDelta) -> Result<(), HwError> {
        debug_log!("NullHwSwitch", changes = %delta.summary(), "Simulated hardware apply");
        Ok(())
    }
}
