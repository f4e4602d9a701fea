//! Reactive components driven by published deltas.
//!
//! Observers run on the pipeline task. They never mutate state directly;
//! follow-up changes are submitted as new updates.

mod mirror_resolver;
mod remote_neighbor;
mod route_refs;
mod te_flow_resolver;

pub use mirror_resolver::{refresh_mirror_resolution, resolve_mirror, MirrorResolver};
pub use remote_neighbor::{purge_remote_entries, replace_remote_entries, RemoteNeighborSync};
pub use route_refs::RouteRefTracker;
pub use te_flow_resolver::TeFlowResolver;
