//! Forwarding tables: MPLS labels, unicast routes and TE flows.
//!
//! Each table exposes pure functions over a mutable [`SwitchState`] draft,
//! used inside pipeline updates, and a manager that submits them through the
//! pipeline and awaits the result.
//!
//! [`SwitchState`]: crate::state::SwitchState

mod label;
mod multi;
mod route;
mod te_flow;

pub use label::{program_label, purge_entries_for_client, unprogram_label, LabelForwardingManager};
pub use multi::MultiClientEntry;
pub use route::{program_route, purge_routes_for_client, unprogram_route, RouteManager};
pub use te_flow::{
    add_te_flows, delete_te_flows, refresh_te_flow_resolution, resolve_te_flow, sync_te_flows,
    TeFlowManager,
};
