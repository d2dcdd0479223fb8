//! Bosun Types - Core types for configuration resolution and deployment
//!
//! Bosun resolves the effective configuration of a deployable service
//! instance from layered sources, then deploys the resolved definition onto
//! heterogeneous execution targets (container hosts, Kubernetes clusters).
//!
//! ## Architectural Boundaries
//!
//! - **bosun-settings** owns: value storage, layered resolution, wiring
//! - **bosun-registry** owns: read-only service shape lookup
//! - **bosun-deploy** owns: deployment resolution, backends, tracking
//!
//! ## Key Concepts
//!
//! - **Layer**: one named, ordered source of configuration values
//! - **ResolutionContext**: which service/target/instance a resolve is for
//! - **WiringEdge**: binding of a capability consumer to a provider instance
//! - **ResolvedServiceDefinition**: a deployment-ready, variable-free shape
//! - **DeploymentRecord**: persisted state of one deployment attempt

#![deny(unsafe_code)]

pub mod ids;
pub mod record;
pub mod settings;
pub mod shape;
pub mod target;
pub mod wiring;

// Re-export main types
pub use ids::{DeploymentId, InstanceConfigId, ServiceId};
pub use record::{
    DeploymentOperation, DeploymentRecord, DeploymentStatus, InvalidTransition,
};
pub use settings::{
    ContextDepth, Layer, ResolutionContext, ResolutionResult, ResolvedValue, SettingPath,
    SettingValue,
};
pub use shape::{
    CapabilityBinding, DeclaredVar, PortSpec, ResolvedServiceDefinition, ServiceShape,
    VolumeSpec,
};
pub use target::{TargetFamily, TargetId, TargetIdParseError};
pub use wiring::WiringEdge;
