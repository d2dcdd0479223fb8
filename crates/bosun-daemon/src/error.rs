//! Error types for bosun-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bosun_deploy::DeployError;
use bosun_settings::{ResolutionError, WiringError};
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Seed data could not be loaded
    #[error("Seed error: {0}")]
    Seed(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflict (invalid state transition, occupied wiring slot)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Configuration authoring defect (missing required values, cycles)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backend answered with a failure
    #[error("Backend error: {0}")]
    BadGateway(String),

    /// Backend did not answer within the bounded timeout
    #[error("Backend timeout: {0}")]
    GatewayTimeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DeployError> for ApiError {
    fn from(err: DeployError) -> Self {
        match &err {
            DeployError::UnknownService(_)
            | DeployError::UnknownTarget(_)
            | DeployError::DeploymentNotFound(_) => ApiError::NotFound(err.to_string()),
            DeployError::InvalidTargetId(_) => ApiError::BadRequest(err.to_string()),
            DeployError::MissingRequiredValue { .. }
            | DeployError::UnresolvedPlaceholders { .. }
            | DeployError::InvalidTarget(_) => ApiError::Validation(err.to_string()),
            DeployError::Resolution(inner) => ApiError::from_resolution(inner, &err),
            DeployError::InvalidTransition(_) | DeployError::OperationInFlight { .. } => {
                ApiError::Conflict(err.to_string())
            }
            DeployError::BackendTimeout(_) => ApiError::GatewayTimeout(err.to_string()),
            DeployError::BackendUnreachable(_)
            | DeployError::BackendRejected(_)
            | DeployError::PartialApply { .. } => ApiError::BadGateway(err.to_string()),
            DeployError::Tracker(_) | DeployError::Registry(_) | DeployError::Backend(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl ApiError {
    fn from_resolution(inner: &ResolutionError, err: &DeployError) -> Self {
        match inner {
            ResolutionError::CyclicReference { .. }
            | ResolutionError::ReferenceDepthExceeded { .. } => {
                ApiError::Validation(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ResolutionError> for ApiError {
    fn from(err: ResolutionError) -> Self {
        match &err {
            ResolutionError::CyclicReference { .. }
            | ResolutionError::ReferenceDepthExceeded { .. } => {
                ApiError::Validation(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<WiringError> for ApiError {
    fn from(err: WiringError) -> Self {
        ApiError::Conflict(err.to_string())
    }
}

impl From<bosun_registry::RegistryError> for ApiError {
    fn from(err: bosun_registry::RegistryError) -> Self {
        match &err {
            bosun_registry::RegistryError::ServiceNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "BACKEND_ERROR"),
            ApiError::GatewayTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "BACKEND_TIMEOUT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_types::ServiceId;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::GatewayTimeout("x".into()).into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_deploy_error_mapping() {
        let missing = DeployError::MissingRequiredValue {
            variables: vec!["PORT".into()],
        };
        assert!(matches!(ApiError::from(missing), ApiError::Validation(_)));

        let unknown = DeployError::UnknownService(ServiceId::new("ghost"));
        assert!(matches!(ApiError::from(unknown), ApiError::NotFound(_)));

        let timeout = DeployError::BackendTimeout("agent".into());
        assert!(matches!(
            ApiError::from(timeout),
            ApiError::GatewayTimeout(_)
        ));
    }
}
