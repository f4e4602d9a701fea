//! Typed identifiers for switch elements, ports and forwarding clients.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Returns the raw numeric value.
            pub const fn get(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                $name(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of one switching element (ASIC) in the chassis.
    SwitchId(u16)
);
numeric_id!(
    /// Front-panel or internal port identifier, unique chassis-wide.
    PortId(u32)
);
numeric_id!(
    /// Global system port identifier in a disaggregated fabric.
    SystemPortId(u32)
);
numeric_id!(
    /// Routed interface identifier.
    InterfaceId(u32)
);
numeric_id!(
    /// Link aggregation group identifier.
    AggregatePortId(u32)
);
numeric_id!(
    /// Virtual router (VRF) identifier. `0` is the default VRF.
    RouterId(u32)
);

/// A 20-bit MPLS label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Label(u32);

impl Label {
    /// Largest label value representable in the 20-bit label field.
    pub const MAX: u32 = 1_048_575;

    /// Creates a label, rejecting values outside the 20-bit range.
    pub const fn new(value: u32) -> Result<Self, ParseError> {
        if value > Self::MAX {
            Err(ParseError::InvalidLabel(value))
        } else {
            Ok(Label(value))
        }
    }

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Label {
    type Error = ParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Label::new(value)
    }
}

impl From<Label> for u32 {
    fn from(label: Label) -> u32 {
        label.0
    }
}

/// Identifier of a forwarding-table client (a protocol daemon or an
/// internal producer).
///
/// Lower values win admin-distance ties, so the numeric value doubles as the
/// client's priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl ClientId {
    pub const BGP: ClientId = ClientId(0);
    pub const STATIC_ROUTE: ClientId = ClientId(1);
    pub const INTERFACE_ROUTE: ClientId = ClientId(2);
    pub const LINK_LOCAL_ROUTE: ClientId = ClientId(3);
    pub const STATIC_INTERNAL: ClientId = ClientId(700);
    pub const OPENR: ClientId = ClientId(786);
    pub const TE_AGENT: ClientId = ClientId(900);

    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ClientId::BGP => write!(f, "bgp"),
            ClientId::STATIC_ROUTE => write!(f, "static"),
            ClientId::INTERFACE_ROUTE => write!(f, "interface"),
            ClientId::OPENR => write!(f, "openr"),
            ClientId(other) => write!(f, "client-{}", other),
        }
    }
}

/// Route preference. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminDistance(pub u8);

impl AdminDistance {
    pub const DIRECTLY_CONNECTED: AdminDistance = AdminDistance(0);
    pub const STATIC_ROUTE: AdminDistance = AdminDistance(1);
    pub const EBGP: AdminDistance = AdminDistance(20);
    pub const OPENR: AdminDistance = AdminDistance(10);
    pub const IBGP: AdminDistance = AdminDistance(200);
    pub const MAX_ADMIN_DISTANCE: AdminDistance = AdminDistance(255);
}

impl fmt::Display for AdminDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive numeric range of identifiers owned by one switching element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange {
    pub min: u32,
    pub max: u32,
}

impl IdRange {
    pub fn new(min: u32, max: u32) -> Result<Self, ParseError> {
        if min > max {
            return Err(ParseError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub const fn contains(&self, id: u32) -> bool {
        id >= self.min && id <= self.max
    }

    pub const fn overlaps(&self, other: &IdRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_label_range() {
        assert!(Label::new(0).is_ok());
        assert!(Label::new(Label::MAX).is_ok());
        assert_eq!(
            Label::new(Label::MAX + 1),
            Err(ParseError::InvalidLabel(1_048_576))
        );
    }

    #[test]
    fn test_label_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<Label>("100").is_ok());
        assert!(serde_json::from_str::<Label>("2000000").is_err());
    }

    #[test]
    fn test_client_priority_order() {
        assert!(ClientId::BGP < ClientId::STATIC_ROUTE);
        assert!(ClientId::STATIC_ROUTE < ClientId::OPENR);
        assert_eq!(ClientId::OPENR.to_string(), "openr");
        assert_eq!(ClientId(42).to_string(), "client-42");
    }

    #[test]
    fn test_id_range() {
        let range = IdRange::new(0, 2047).unwrap();
        assert!(range.contains(0));
        assert!(range.contains(2047));
        assert!(!range.contains(2048));
        assert!(IdRange::new(10, 5).is_err());

        let other = IdRange::new(2000, 3000).unwrap();
        assert!(range.overlaps(&other));
        assert!(!range.overlaps(&IdRange::new(2048, 4095).unwrap()));
    }

    #[test]
    fn test_id_display_and_ordering() {
        assert_eq!(PortId(5).to_string(), "5");
        assert!(SwitchId(0) < SwitchId(1));
        assert_eq!(SystemPortId::from(100).get(), 100);
    }
}
