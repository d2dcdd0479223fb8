//! Deployment error types
//!
//! Resolution errors abort deployment resolution entirely — no deployment
//! is attempted with a partially resolved definition. Backend errors after
//! dispatch leave the record in `failed` with backend metadata preserved;
//! nothing here retries automatically.

use bosun_registry::RegistryError;
use bosun_settings::ResolutionError;
use bosun_types::{
    DeploymentId, DeploymentOperation, InvalidTransition, ServiceId, TargetId, TargetIdParseError,
};
use thiserror::Error;

/// Deployment errors
#[derive(Debug, Error)]
pub enum DeployError {
    /// Required variables resolved to `found = false`; deployment was not
    /// attempted
    #[error("missing required configuration: {}", .variables.join(", "))]
    MissingRequiredValue { variables: Vec<String> },

    /// Configuration authoring defect (cycle, depth) or store failure
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("unknown service: {0}")]
    UnknownService(ServiceId),

    #[error("unknown deployment target: {0}")]
    UnknownTarget(TargetId),

    #[error(transparent)]
    InvalidTargetId(#[from] TargetIdParseError),

    /// Target catalog entry is inconsistent (family/connection mismatch)
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(DeploymentId),

    /// Resolver defect: substitution left placeholder or reference syntax
    #[error("resolved definition still carries placeholders: {}", .fields.join("; "))]
    UnresolvedPlaceholders { fields: Vec<String> },

    /// The call did not complete within the bounded timeout. Retryable by
    /// the caller; distinct from an explicit rejection.
    #[error("backend timed out: {0}")]
    BackendTimeout(String),

    /// Network-level failure before the backend answered
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The backend answered and said no
    #[error("backend rejected request: {0}")]
    BackendRejected(String),

    /// Cluster backend applied some but not all artifacts. `metadata`
    /// carries the applied-artifact list so cleanup can target exactly
    /// what exists.
    #[error("partial apply: {detail}; applied steps {applied_steps:?}")]
    PartialApply {
        detail: String,
        applied_steps: Vec<u32>,
        metadata: serde_json::Value,
    },

    /// Operation attempted from a state that does not permit it; rejected
    /// immediately, never queued
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Another mutating operation holds this deployment id
    #[error("operation '{operation}' already in flight for {id}")]
    OperationInFlight {
        id: DeploymentId,
        operation: DeploymentOperation,
    },

    #[error("tracker error: {0}")]
    Tracker(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Backend failure with no more specific classification
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Classify a reqwest failure: timeouts are a distinct failure mode from
/// connection failures and explicit rejections.
pub(crate) fn classify_http_error(context: &str, err: reqwest::Error) -> DeployError {
    if err.is_timeout() {
        DeployError::BackendTimeout(format!("{context}: {err}"))
    } else if err.is_connect() {
        DeployError::BackendUnreachable(format!("{context}: {err}"))
    } else if let Some(status) = err.status() {
        DeployError::BackendRejected(format!("{context}: HTTP {status}"))
    } else {
        DeployError::Backend(format!("{context}: {err}"))
    }
}
