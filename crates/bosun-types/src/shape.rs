//! Service runtime shapes and resolved definitions
//!
//! A `ServiceShape` is what the registry declares for a service: image,
//! ports, volumes, and the variables its templated fields reference. A
//! `ResolvedServiceDefinition` is the same shape after deployment
//! resolution — every placeholder substituted, no reference syntax left.

use crate::ids::ServiceId;
use crate::settings::{ResolvedValue, REFERENCE_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Binding of a declared variable to a wired capability output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityBinding {
    /// Capability slot name, e.g. `llm`
    pub capability: String,
    /// Output key published by the provider, e.g. `endpoint`
    pub output: String,
}

/// One variable a service declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredVar {
    pub name: String,

    /// Required variables must resolve before a deploy is attempted
    #[serde(default)]
    pub required: bool,

    /// Templated fields that reference this variable, informational
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_refs: Vec<String>,

    /// Present when the variable is fulfilled through capability wiring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<CapabilityBinding>,
}

impl DeclaredVar {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            template_refs: Vec::new(),
            capability: None,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            template_refs: Vec::new(),
            capability: None,
        }
    }

    pub fn bound_to(mut self, capability: impl Into<String>, output: impl Into<String>) -> Self {
        self.capability = Some(CapabilityBinding {
            capability: capability.into(),
            output: output.into(),
        });
        self
    }
}

/// Port exposed by a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub container_port: u16,

    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Volume mounted into a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Source path or named volume; may contain `${VAR}` placeholders
    pub source: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Runtime shape a service declares in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceShape {
    pub id: ServiceId,

    /// Image reference; may contain `${VAR}` placeholders
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Environment templates; values may contain `${VAR}` placeholders
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_vars: Vec<DeclaredVar>,

    /// Defaults embedded in the service's own manifest; backs the
    /// runtime-defaults resolution layer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub runtime_defaults: BTreeMap<String, serde_json::Value>,
}

impl ServiceShape {
    pub fn new(id: ServiceId, image: impl Into<String>) -> Self {
        Self {
            id,
            image: image.into(),
            command: Vec::new(),
            env: BTreeMap::new(),
            ports: Vec::new(),
            volumes: Vec::new(),
            declared_vars: Vec::new(),
            runtime_defaults: BTreeMap::new(),
        }
    }

    pub fn declared_var_names(&self) -> Vec<String> {
        self.declared_vars.iter().map(|v| v.name.clone()).collect()
    }
}

/// Deployment-ready description of a service, all variables substituted
///
/// Created once per deployment attempt, immutable afterward, consumed by
/// exactly one backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedServiceDefinition {
    pub service_id: ServiceId,
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortSpec>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<VolumeSpec>,

    /// Resolved declared variables; unresolved optional variables are
    /// absent by design
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, ResolvedValue>,
}

impl ResolvedServiceDefinition {
    /// Fields still carrying reference or placeholder syntax.
    ///
    /// A non-empty result after deployment resolution is a resolver
    /// defect, not a valid output.
    pub fn unresolved_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut check = |field: &str, value: &str| {
            if value.contains(REFERENCE_PREFIX) || value.contains("${") {
                out.push(format!("{field}: {value}"));
            }
        };

        check("image", &self.image);
        for (i, arg) in self.command.iter().enumerate() {
            check(&format!("command[{i}]"), arg);
        }
        for (key, value) in &self.env {
            check(&format!("env.{key}"), value);
        }
        for volume in &self.volumes {
            check("volume.source", &volume.source);
            check("volume.mount_path", &volume.mount_path);
        }
        for (name, value) in &self.variables {
            if let ResolvedValue::Str(s) = value {
                check(&format!("variables.{name}"), s);
            }
        }
        out
    }
}
