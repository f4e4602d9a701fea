//! Switch control-plane state engine.
//!
//! The complete configured and learned state of a switch (or a chassis of
//! switching elements) is held as one versioned, copy-on-write tree. All
//! changes go through a single-writer update pipeline that batches
//! submissions, hands the resulting delta to the hardware layer and then to
//! observers, and publishes the new snapshot for lock-free readers.
//!
//! # Architecture
//!
//! ```text
//! [managers] ──┐                         ┌──> [HwSwitch]
//! [config]  ───┼──> [UpdatePipeline] ────┤
//! [remediator]─┘          │              └──> [observers] ──> submissions
//!                         ↓
//!                 [published snapshot]
//! ```
//!
//! # Key Components
//!
//! - [`node`]: `Draft`/`Frozen` nodes and scoped `NodeMap` collections
//! - [`scope`]: which switching elements each entity applies to
//! - [`delta`]: keyed differences between two snapshots
//! - [`pipeline`]: the update pipeline and its hardware/observer seams
//! - [`fib`]: label, route and TE flow tables with multi-client resolution
//! - [`observers`]: mirror, TE flow and remote neighbor resolution, route
//!   reference tracking
//! - [`convergence`]: the port remediator

// ============================================================================
// State model
// ============================================================================

pub mod audit;
pub mod delta;
pub mod error;
pub mod node;
pub mod scope;
pub mod state;

// ============================================================================
// Update path
// ============================================================================

pub mod context;
pub mod pipeline;

// ============================================================================
// Managers, observers and controllers
// ============================================================================

pub mod apply_config;
pub mod config;
pub mod convergence;
pub mod fib;
pub mod observers;
pub mod persist;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::AgentContext;
pub use delta::{DeltaValue, MapDelta, StateDelta};
pub use error::{Result, StateError};
pub use node::{Draft, Frozen, NodeMap};
pub use pipeline::{
    HwSwitch, NullHwSwitch, PipelineConfig, PipelineHandle, StateObserver, UpdatePipeline,
    UpdateResult, UpdateTicket,
};
pub use scope::{ScopeResolver, SwitchMatcher};
pub use state::SwitchState;

pub use swstate_types::{IpAddress, IpPrefix, MacAddress, VlanId};
