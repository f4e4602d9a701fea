//! Persisted form of a state snapshot.
//!
//! The dump is JSON with a `schema_version` header. Dumps from a newer
//! schema are rejected; fields missing from older dumps take their defaults.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::error::{Result, StateError};
use crate::node::Frozen;
use crate::state::SwitchState;
use crate::{audit_log, info_log};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Newest schema this build reads and the one it writes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub schema_version: u32,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: SwitchState,
}

impl PersistedState {
    pub fn new(state: &SwitchState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: Some(Utc::now()),
            state: state.clone(),
        }
    }
}

/// Serializes `state` with the current schema header.
pub fn dump(state: &SwitchState) -> Result<String> {
    serde_json::to_string_pretty(&PersistedState::new(state))
        .map_err(|e| StateError::Persist(format!("Failed to serialize state: {}", e)))
}

/// Parses a dump produced by [`dump`] into a fresh snapshot.
pub fn reload(data: &str) -> Result<Frozen<SwitchState>> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| StateError::Persist(format!("Malformed state dump: {}", e)))?;

    let found = value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| StateError::Persist("State dump has no schema_version".to_string()))?;
    let found = u32::try_from(found).unwrap_or(u32::MAX);
    if found > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    let persisted: PersistedState = serde_json::from_value(value)
        .map_err(|e| StateError::Persist(format!("Failed to deserialize state: {}", e)))?;
    Ok(Frozen::new(persisted.state))
}

/// Writes a dump of `state` to `path`, creating parent directories.
pub fn save_to_file(state: &SwitchState, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            StateError::Persist(format!("Failed to create state directory {}: {}", parent.display(), e))
        })?;
    }

    let data = dump(state)?;
    fs::write(path, data)
        .map_err(|e| StateError::Persist(format!("Failed to write state file {}: {}", path.display(), e)))?;

    info_log!("Persist", path = %path.display(), "State saved");
    audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "Persist", "save_state")
        .with_outcome(AuditOutcome::Success)
        .with_object_id(path.display().to_string()));
    Ok(())
}

/// Reads a dump from `path`. Returns `Ok(None)` if the file does not exist.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Option<Frozen<SwitchState>>> {
    let path = path.as_ref();
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Persist(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        }
    };

    let state = reload(&data)?;
    info_log!("Persist", path = %path.display(), ports = state.ports.len(), "State reloaded");
    audit_log!(AuditRecord::new(AuditCategory::WarmRestart, "Persist", "load_state")
        .with_outcome(AuditOutcome::Success)
        .with_object_id(path.display().to_string()));
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::program_label;
    use crate::node::modify;
    use crate::scope::{ScopeResolver, SwitchMatcher};
    use crate::state::{Mirror, MirrorDestination, NextHop, Port, SwitchInfo, SwitchType};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use swstate_types::{AdminDistance, ClientId, IdRange, PortId, SwitchId};
    use tempfile::TempDir;

    fn sample_state() -> SwitchState {
        let resolver = ScopeResolver::new(BTreeMap::from([(
            SwitchId(0),
            SwitchInfo {
                switch_type: SwitchType::Npu,
                switch_index: 0,
                port_id_range: IdRange::new(0, 1023).unwrap(),
                system_port_range: None,
                mac: None,
            },
        )]))
        .unwrap();
        let scope = SwitchMatcher::single(SwitchId(0));

        let mut state = SwitchState::default();
        modify(&mut state.ports, |ports| {
            ports.add(PortId(1), Frozen::new(Port::new(PortId(1), "eth1")), scope.clone()).unwrap();
        });
        modify(&mut state.mirrors, |mirrors| {
            let mirror = Mirror::new("span", MirrorDestination::Port(PortId(1)));
            mirrors.add("span".to_string(), Frozen::new(mirror), scope.clone()).unwrap();
        });
        program_label(
            &mut state,
            &resolver,
            100,
            ClientId(1),
            AdminDistance(1),
            [NextHop::new("10.0.0.1".parse().unwrap())].into(),
        )
        .unwrap();
        state
    }

    #[test]
    fn test_dump_reload_preserves_state() {
        let state = sample_state();
        let reloaded = reload(&dump(&state).unwrap()).unwrap();
        assert_eq!(*reloaded, state);
    }

    #[test]
    fn test_reload_rejects_newer_schema() {
        let data = r#"{"schema_version": 2, "state": {}}"#;
        assert_eq!(
            reload(data).unwrap_err(),
            StateError::UnsupportedSchema {
                found: 2,
                supported: SCHEMA_VERSION
            }
        );
    }

    #[test]
    fn test_reload_defaults_missing_fields() {
        let reloaded = reload(r#"{"schema_version": 1, "state": {"ports": []}}"#).unwrap();
        assert_eq!(*reloaded, SwitchState::default());

        assert!(matches!(reload("not json"), Err(StateError::Persist(_))));
        assert!(matches!(reload("{}"), Err(StateError::Persist(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        assert_eq!(load_from_file(&path).unwrap(), None);

        let state = sample_state();
        save_to_file(&state, &path).unwrap();
        let loaded = load_from_file(&path).unwrap().unwrap();
        assert_eq!(*loaded, state);
    }
}
