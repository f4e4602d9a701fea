//! Typed state entities and the [`SwitchState`] root.

mod dsf_node;
mod interface;
mod label_fib;
mod mirror;
pub mod nexthop;
mod port;
mod route;
mod settings;
mod switch_state;
mod system_port;
mod te_flow;
mod vlan;

pub use dsf_node::{DsfNode, DsfNodeType};
pub use interface::{Interface, InterfaceKind, NeighborEntry, NeighborState, PortDescriptor};
pub use label_fib::LabelForwardingEntry;
pub use mirror::{Mirror, MirrorDestination, MirrorDirection, MirrorTunnel};
pub use nexthop::{
    validate_next_hops, LabelAction, NextHop, NextHopEntry, NextHopSet, NextHopsMulti,
    ResolvedNextHops,
};
pub use port::Port;
pub use route::{Route, RouteKey};
pub use settings::{L2LearningMode, SwitchInfo, SwitchSettings, SwitchType};
pub use switch_state::{
    AggregatePortMap, DsfNodeMap, InterfaceMap, LabelForwardingBase, MirrorMap, PortMap,
    RouteTable, SwitchState, SystemPortMap, TeFlowTable, VlanMap,
};
pub use system_port::SystemPort;
pub use te_flow::{TeFlowEntry, TeFlowKey};
pub use vlan::{AggregatePort, Vlan};
