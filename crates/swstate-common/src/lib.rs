//! Common building blocks for the switch state engine.
//!
//! - [`RefCountTable`]: reference-counted table that never creates entries
//!   implicitly on release or lookup
//! - [`UpdateStatus`]: classification of a state update's outcome, used for
//!   pipeline accounting

mod ref_table;
mod status;

pub use ref_table::{RefCountTable, RefTableError, Released};
pub use status::{StatusCounters, UpdateStatus};
