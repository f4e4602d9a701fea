//! Primitive types shared by the switch state engine.
//!
//! - [`SwitchId`], [`PortId`], [`SystemPortId`] and friends: typed
//!   identifiers so a port id can never be passed where a system port id is
//!   expected
//! - [`Label`], [`ClientId`], [`AdminDistance`]: forwarding-table keys and
//!   route preference
//! - [`IpAddress`], [`IpPrefix`], [`MacAddress`], [`VlanId`]: network
//!   primitives with validated parsing
//! - [`AdminState`], [`OperState`], [`PortType`], [`LoopbackMode`]: port
//!   state enums

mod ids;
mod ip;
mod mac;
mod port;
mod vlan;

pub use ids::{
    AdminDistance, AggregatePortId, ClientId, IdRange, InterfaceId, Label, PortId, RouterId,
    SwitchId, SystemPortId,
};
pub use ip::{AddressFamily, IpAddress, IpPrefix};
pub use mac::MacAddress;
pub use port::{AdminState, LoopbackMode, OperState, PortType};
pub use vlan::VlanId;

/// Common error type for parsing and validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid MPLS label {0}, max is 1048575")]
    InvalidLabel(u32),

    #[error("invalid id range: min {min} is greater than max {max}")]
    InvalidRange { min: u32, max: u32 },

    #[error("invalid {kind}: {value}")]
    InvalidEnum { kind: &'static str, value: String },
}
