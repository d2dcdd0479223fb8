//! Registry error types

use bosun_types::ServiceId;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service not found: {0}")]
    ServiceNotFound(ServiceId),

    #[error("registry backend error: {0}")]
    Backend(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
