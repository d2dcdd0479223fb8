//! Registry trait definitions

use crate::error::Result;
use async_trait::async_trait;
use bosun_types::{ServiceId, ServiceShape};

/// Read-only query interface over declared service shapes
///
/// Bosun never writes through this trait; registration and discovery
/// belong to the collaborator behind it.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// The declared runtime shape for a service, or `None` if unknown
    async fn get_service_shape(&self, id: &ServiceId) -> Result<Option<ServiceShape>>;

    /// All known service ids
    async fn list_services(&self) -> Result<Vec<ServiceId>>;
}
