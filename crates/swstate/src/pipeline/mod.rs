//! Serialized application of state updates.
//!
//! All mutations flow through one [`UpdatePipeline`] task. Submitters hand
//! it a named closure that maps the current snapshot to an optional draft;
//! the task applies queued closures in order, diffs the result against the
//! published snapshot, programs hardware through [`HwSwitch`], then
//! publishes and notifies [`StateObserver`]s.

mod hw;
mod observer;
#[allow(clippy::module_inception)]
mod pipeline;
mod update;

pub use hw::{HwError, HwSwitch, NullHwSwitch};
pub use observer::StateObserver;
pub use pipeline::{PipelineConfig, PipelineHandle, UpdatePipeline, UpdateSubmitter};
pub use update::{UpdateBehavior, UpdateResult, UpdateTicket};
