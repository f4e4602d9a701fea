//! Crate-wide error type for state mutations and the update pipeline.

use crate::scope::ScopeError;
use swstate_types::{ClientId, Label, ParseError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StateError>;

/// Errors raised while building, applying or persisting state.
///
/// Validation variants are local to the submission that raised them; the
/// published snapshot is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("Invalid next hops: {0}")]
    InvalidNextHops(String),

    #[error("Invalid label {0}, max is 1048575")]
    InvalidLabel(u32),

    #[error("Label not found: {0}")]
    LabelNotFound(Label),

    #[error("No next hops from client {client} for {entry}")]
    ClientNotFound { client: ClientId, entry: String },

    #[error("{collection} entry not found: {key}")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    #[error("{collection} entry already exists: {key}")]
    AlreadyExists {
        collection: &'static str,
        key: String,
    },

    #[error("Invalid {entity}: {reason}")]
    Invalid {
        entity: &'static str,
        reason: String,
    },

    #[error("Hardware apply failed: {0}")]
    HwApply(String),

    #[error("Update pipeline is closed")]
    PipelineClosed,

    #[error("Pipeline setup failed: {0}")]
    Setup(String),

    #[error("Persistence error: {0}")]
    Persist(String),

    #[error("Unsupported state schema version {found}, newest supported is {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
}

impl StateError {
    pub fn not_found(collection: &'static str, key: impl ToString) -> Self {
        StateError::NotFound {
            collection,
            key: key.to_string(),
        }
    }

    pub fn already_exists(collection: &'static str, key: impl ToString) -> Self {
        StateError::AlreadyExists {
            collection,
            key: key.to_string(),
        }
    }

    pub fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        StateError::Invalid {
            entity,
            reason: reason.into(),
        }
    }

    /// Returns true for errors produced by a mutation's own validation.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            StateError::HwApply(_)
                | StateError::PipelineClosed
                | StateError::Setup(_)
                | StateError::Persist(_)
                | StateError::UnsupportedSchema { .. }
        )
    }
}

impl From<ParseError> for StateError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidLabel(value) => StateError::InvalidLabel(value),
            other => StateError::invalid("value", other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Persist(err.to_string())
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Persist(err.to_string())
    }
}
