//! Port state enums.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a port within the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Front-panel port carrying user traffic.
    #[default]
    Interface,
    /// Port connecting an element to the fabric.
    Fabric,
    /// Internal recycle port.
    Recycle,
    /// Management port.
    Management,
    /// CPU port.
    Cpu,
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortType::Interface => "interface",
            PortType::Fabric => "fabric",
            PortType::Recycle => "recycle",
            PortType::Management => "management",
            PortType::Cpu => "cpu",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for PortType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interface" => Ok(PortType::Interface),
            "fabric" => Ok(PortType::Fabric),
            "recycle" => Ok(PortType::Recycle),
            "management" => Ok(PortType::Management),
            "cpu" => Ok(PortType::Cpu),
            _ => Err(ParseError::InvalidEnum {
                kind: "port type",
                value: s.to_string(),
            }),
        }
    }
}

/// Configured administrative state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    /// Default for newly created ports.
    #[default]
    Disabled,
    Enabled,
}

impl AdminState {
    pub const fn is_enabled(&self) -> bool {
        matches!(self, AdminState::Enabled)
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Enabled => write!(f, "enabled"),
            AdminState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Operational state reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    #[default]
    Down,
    Up,
    Unknown,
}

impl OperState {
    pub const fn is_up(&self) -> bool {
        matches!(self, OperState::Up)
    }

    pub const fn is_down(&self) -> bool {
        matches!(self, OperState::Down)
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperState::Up => write!(f, "up"),
            OperState::Down => write!(f, "down"),
            OperState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Loopback configuration of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopbackMode {
    #[default]
    None,
    Phy,
    Mac,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_port_type_parse() {
        assert_eq!("fabric".parse::<PortType>().unwrap(), PortType::Fabric);
        assert_eq!("INTERFACE".parse::<PortType>().unwrap(), PortType::Interface);
        assert!("lag".parse::<PortType>().is_err());
    }

    #[test]
    fn test_states() {
        assert!(AdminState::Enabled.is_enabled());
        assert!(!AdminState::default().is_enabled());
        assert!(OperState::Up.is_up());
        assert!(OperState::Down.is_down());
        assert!(!OperState::Unknown.is_down());
    }

    #[test]
    fn test_display() {
        assert_eq!(PortType::Interface.to_string(), "interface");
        assert_eq!(AdminState::Enabled.to_string(), "enabled");
        assert_eq!(OperState::Down.to_string(), "down");
    }
}
