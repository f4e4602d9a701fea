//! Agent configuration.
//!
//! Loaded from a TOML file. Every section is optional and falls back to its
//! defaults; the desired-state tables (`ports`, `vlans`, ...) are applied to
//! the state tree by [`crate::apply_config::apply_config`].
//!
//! ```toml
//! [agent]
//! log_level = "info"
//! state_path = "/var/lib/swstated/state.json"
//!
//! [[switches]]
//! id = 0
//! switch_type = "npu"
//! port_id_range = { min = 0, max = 2047 }
//!
//! [[ports]]
//! id = 1
//! name = "eth1"
//! admin_state = "enabled"
//! ```

use crate::convergence::RemediationConfig;
use crate::pipeline::PipelineConfig;
use crate::state::{AggregatePort, DsfNode, Interface, Mirror, Port, SwitchInfo, SwitchSettings, SwitchType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use swstate_types::{IdRange, InterfaceId, PortId, SwitchId, VlanId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSection {
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub pretty_logs: bool,

    /// State dump written at shutdown and reloaded at startup
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            pretty_logs: false,
            state_path: None,
        }
    }
}

/// One `[[switches]]` table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEntry {
    pub id: SwitchId,
    #[serde(flatten)]
    pub info: SwitchInfo,
}

/// VLAN as written in config. Membership lives here rather than on ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanConfig {
    pub id: VlanId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub untagged: Vec<PortId>,
    #[serde(default)]
    pub tagged: Vec<PortId>,
    #[serde(default)]
    pub interface_id: Option<InterfaceId>,
}

impl VlanConfig {
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| format!("Vlan{}", self.id.get()))
    }

    /// Member ports and whether each is tagged.
    pub fn members(&self) -> BTreeMap<PortId, bool> {
        self.untagged
            .iter()
            .map(|id| (*id, false))
            .chain(self.tagged.iter().map(|id| (*id, true)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub remediation: RemediationConfig,

    #[serde(default = "default_switches")]
    pub switches: Vec<SwitchEntry>,

    #[serde(default)]
    pub settings: SwitchSettings,

    #[serde(default)]
    pub ports: Vec<Port>,

    #[serde(default)]
    pub vlans: Vec<VlanConfig>,

    #[serde(default)]
    pub aggregate_ports: Vec<AggregatePort>,

    #[serde(default)]
    pub interfaces: Vec<Interface>,

    #[serde(default)]
    pub mirrors: Vec<Mirror>,

    #[serde(default)]
    pub dsf_nodes: Vec<DsfNode>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            pipeline: PipelineConfig::default(),
            remediation: RemediationConfig::default(),
            switches: default_switches(),
            settings: SwitchSettings::default(),
            ports: Vec::new(),
            vlans: Vec::new(),
            aggregate_ports: Vec::new(),
            interfaces: Vec::new(),
            mirrors: Vec::new(),
            dsf_nodes: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A single NPU owning ports 0-2047.
fn default_switches() -> Vec<SwitchEntry> {
    vec![SwitchEntry {
        id: SwitchId(0),
        info: SwitchInfo {
            switch_type: SwitchType::Npu,
            switch_index: 0,
            port_id_range: IdRange { min: 0, max: 2047 },
            system_port_range: None,
            mac: None,
        },
    }]
}

impl AgentConfig {
    /// Reads, parses and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates config text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.agent.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.agent.log_level
            )));
        }

        if self.pipeline.max_batch_size == 0 {
            return Err(ConfigError::Invalid("pipeline.max_batch_size must be > 0".to_string()));
        }

        if self.remediation.interval_secs == 0 {
            return Err(ConfigError::Invalid("remediation.interval_secs must be > 0".to_string()));
        }

        if self.switches.is_empty() {
            return Err(ConfigError::Invalid("at least one switch is required".to_string()));
        }
        ensure_unique("switch", self.switches.iter().map(|s| s.id))?;

        ensure_unique("port", self.ports.iter().map(|p| p.id))?;
        ensure_unique("port name", self.ports.iter().map(|p| p.name.as_str()))?;
        let ports: BTreeSet<PortId> = self.ports.iter().map(|p| p.id).collect();

        ensure_unique("vlan", self.vlans.iter().map(|v| v.id))?;
        for vlan in &self.vlans {
            let mut seen = BTreeSet::new();
            for port in vlan.untagged.iter().chain(&vlan.tagged) {
                if !ports.contains(port) {
                    return Err(ConfigError::Invalid(format!(
                        "vlan {} member port {} is not configured",
                        vlan.id, port
                    )));
                }
                if !seen.insert(*port) {
                    return Err(ConfigError::Invalid(format!(
                        "vlan {} lists port {} more than once",
                        vlan.id, port
                    )));
                }
            }
        }

        ensure_unique("aggregate port", self.aggregate_ports.iter().map(|a| a.id))?;
        for agg in &self.aggregate_ports {
            if let Some(port) = agg.members.iter().find(|p| !ports.contains(*p)) {
                return Err(ConfigError::Invalid(format!(
                    "aggregate port {} member port {} is not configured",
                    agg.id, port
                )));
            }
        }

        ensure_unique("interface", self.interfaces.iter().map(|i| i.id))?;
        ensure_unique("mirror", self.mirrors.iter().map(|m| m.name.as_str()))?;
        ensure_unique("dsf node", self.dsf_nodes.iter().map(|n| n.switch_id))?;

        Ok(())
    }

    /// The switch table keyed by switch id.
    pub fn switch_infos(&self) -> BTreeMap<SwitchId, SwitchInfo> {
        self.switches.iter().map(|s| (s.id, s.info)).collect()
    }
}

fn ensure_unique<T, I>(kind: &str, items: I) -> Result<()>
where
    T: Ord + std::fmt::Display,
    I: IntoIterator<Item = T>,
{
    let mut seen = BTreeSet::new();
    for item in items {
        if seen.contains(&item) {
            return Err(ConfigError::Invalid(format!("duplicate {} {}", kind, item)));
        }
        seen.insert(item);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MirrorDestination;
    use pretty_assertions::assert_eq;
    use swstate_types::AdminState;

    const SAMPLE: &str = r#"
[agent]
log_level = "debug"
state_path = "/tmp/swstated/state.json"

[pipeline]
max_batch_size = 16

[remediation]
interval_secs = 5

[[switches]]
id = 0
switch_type = "npu"
port_id_range = { min = 0, max = 1023 }

[[ports]]
id = 1
name = "eth1"
admin_state = "enabled"

[[ports]]
id = 2
name = "eth2"

[[vlans]]
id = 10
untagged = [1]
tagged = [2]

[[interfaces]]
id = 10
kind = { vlan = 10 }
addresses = { "10.0.0.1" = 24 }

[[mirrors]]
name = "span"
destination = { port = 2 }
"#;

    #[test]
    fn test_parse_sample() {
        let config = AgentConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.agent.log_level, "debug");
        assert_eq!(config.pipeline.max_batch_size, 16);
        assert_eq!(config.remediation.interval_secs, 5);
        assert!(config.remediation.enabled);
        assert_eq!(config.switch_infos().len(), 1);
        assert_eq!(config.ports[0].admin_state, AdminState::Enabled);
        assert_eq!(config.ports[1].admin_state, AdminState::Disabled);
        assert_eq!(
            config.vlans[0].members(),
            BTreeMap::from([(PortId(1), false), (PortId(2), true)])
        );
        assert_eq!(config.vlans[0].name(), "Vlan10");
        assert_eq!(config.mirrors[0].destination, MirrorDestination::Port(PortId(2)));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AgentConfig::from_toml_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.remediation.interval_secs, 25);
        assert_eq!(config.switches.len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AgentConfig::default();
        config.agent.log_level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AgentConfig::default();
        config.switches.clear();
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.ports = vec![Port::new(PortId(1), "eth1"), Port::new(PortId(1), "eth2")];
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.vlans = vec![VlanConfig {
            id: VlanId::new(10).unwrap(),
            name: None,
            untagged: vec![PortId(9)],
            tagged: vec![],
            interface_id: None,
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            AgentConfig::from_toml_str("[pipeline]\nmax_batch_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AgentConfig::load("/nonexistent/swstated.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
