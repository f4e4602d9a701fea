//! Structured logging and audit records.
//!
//! Components log through `debug_log!`/`info_log!`/`warn_log!`/`error_log!`,
//! whose first argument names the component. Snapshot publications, hardware
//! failures and lifecycle events also emit an [`AuditRecord`] through
//! `audit_log!`, which lands on the `audit` target with the record attached
//! as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Desired configuration applied to the state tree
    ConfigurationChange,
    ResourceCreate,
    ResourceModify,
    ResourceDelete,
    /// A new snapshot was published
    StatePublish,
    /// Hardware programming of a delta
    HwOperation,
    /// Agent and controller startup and shutdown
    SystemLifecycle,
    ErrorCondition,
    /// Remediation and other self-healing actions
    AdminAction,
    /// State dump and reload across restarts
    WarmRestart,
}

impl AuditCategory {
    /// Create, modify or delete, from whether the object existed before and
    /// after the change.
    pub const fn for_change(existed: bool, exists: bool) -> Self {
        match (existed, exists) {
            (false, true) => Self::ResourceCreate,
            (true, false) => Self::ResourceDelete,
            _ => Self::ResourceModify,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationChange => "CONFIGURATION_CHANGE",
            Self::ResourceCreate => "RESOURCE_CREATE",
            Self::ResourceModify => "RESOURCE_MODIFY",
            Self::ResourceDelete => "RESOURCE_DELETE",
            Self::StatePublish => "STATE_PUBLISH",
            Self::HwOperation => "HW_OPERATION",
            Self::SystemLifecycle => "SYSTEM_LIFECYCLE",
            Self::ErrorCondition => "ERROR_CONDITION",
            Self::AdminAction => "ADMIN_ACTION",
            Self::WarmRestart => "WARM_RESTART",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
    Denied,
}

impl AuditOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::InProgress => "in_progress",
            Self::Denied => "denied",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure | Self::Denied)
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audited action.
///
/// The outcome stays [`AuditOutcome::InProgress`] until set with
/// [`with_outcome`](Self::with_outcome) or [`with_error`](Self::with_error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Component that produced the record
    pub source: String,
    pub action: String,
    pub outcome: AuditOutcome,

    /// Kind and identifier of the affected object ("port" / "7")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// Snapshot generation the action produced or observed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,

    /// Batch or remediation cycle the record belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_type: None,
            object_id: None,
            generation: None,
            correlation_id: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, kind: impl Into<String>) -> Self {
        self.object_type = Some(kind.into());
        self
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records the error and marks the action failed.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => serde_json::json!({ "error": "serialization_failed", "message": e.to_string() })
                .to_string(),
        }
    }

    /// Logs the record on the `audit` target.
    ///
    /// Failures and denials log at warn, successes at info and anything
    /// still in progress at debug.
    pub fn emit(&self) {
        let record = self;
        let json = record.to_json();
        macro_rules! emit_at {
            ($level:ident) => {
                tracing::$level!(
                    target: "audit",
                    category = record.category.as_str(),
                    source = %record.source,
                    action = %record.action,
                    outcome = record.outcome.as_str(),
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %json,
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                )
            };
        }
        match record.outcome {
            AuditOutcome::Success => emit_at!(info),
            AuditOutcome::InProgress => emit_at!(debug),
            AuditOutcome::Failure | AuditOutcome::Denied => emit_at!(warn),
        }
    }
}

/// Debug-level log line tagged with its source component.
///
/// ```ignore
/// debug_log!("UpdatePipeline", batch = 3, "Applying batch");
/// ```
#[macro_export]
macro_rules! debug_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::debug!(source = $source, $($arg)*)
    };
}

#[macro_export]
macro_rules! info_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::info!(source = $source, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::warn!(source = $source, $($arg)*)
    };
}

#[macro_export]
macro_rules! error_log {
    ($source:expr, $($arg:tt)*) => {
        tracing::error!(source = $source, $($arg)*)
    };
}

/// Emits an [`AuditRecord`] on the `audit` target.
///
/// ```ignore
/// audit_log!(AuditRecord::new(AuditCategory::StatePublish, "UpdatePipeline", "publish")
///     .with_outcome(AuditOutcome::Success)
///     .with_generation(4));
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        $crate::audit::AuditRecord::emit(&$record)
    };
}

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for collectors
    #[default]
    Json,
    /// Multi-line human-readable output
    Pretty,
}

/// Installs the global subscriber. `RUST_LOG` overrides `log_level` when set.
pub fn init_logging(log_level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .json(),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_line_number(true).pretty())
            .init(),
    }
}
