//! Setting values, resolution layers, contexts and results
//!
//! A setting is either a literal scalar or a reference expression pointing
//! at another setting path (`@settings.<dot.path>`). Layers form a fixed
//! global precedence order; which layers apply to a given resolve call is
//! determined solely by the context depth.

use crate::ids::{InstanceConfigId, ServiceId};
use crate::target::TargetId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the single supported dereference operator.
pub const REFERENCE_PREFIX: &str = "@settings.";

/// Absolute dot-separated path into the resolved settings space
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettingPath(String);

impl SettingPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A concrete, fully-resolved scalar value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl ResolvedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResolvedValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render for substitution into templated fields
    pub fn render(&self) -> String {
        match self {
            ResolvedValue::Bool(b) => b.to_string(),
            ResolvedValue::Num(n) => n.to_string(),
            ResolvedValue::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for ResolvedValue {
    fn from(s: &str) -> Self {
        ResolvedValue::Str(s.to_string())
    }
}

impl From<f64> for ResolvedValue {
    fn from(n: f64) -> Self {
        ResolvedValue::Num(n)
    }
}

impl From<bool> for ResolvedValue {
    fn from(b: bool) -> Self {
        ResolvedValue::Bool(b)
    }
}

/// A value as stored in a layer: a literal or a reference expression
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Literal(ResolvedValue),
    Reference(SettingPath),
}

impl SettingValue {
    /// Interpret a document scalar. Strings starting with `@settings.`
    /// parse as references; everything else is a literal. Non-scalar
    /// document nodes (maps, arrays, null) carry no setting value.
    pub fn from_document(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(SettingValue::Literal(ResolvedValue::Bool(*b))),
            serde_json::Value::Number(n) => {
                n.as_f64().map(|f| SettingValue::Literal(ResolvedValue::Num(f)))
            }
            serde_json::Value::String(s) => {
                if let Some(path) = s.strip_prefix(REFERENCE_PREFIX) {
                    Some(SettingValue::Reference(SettingPath::new(path)))
                } else {
                    Some(SettingValue::Literal(ResolvedValue::Str(s.clone())))
                }
            }
            _ => None,
        }
    }
}

/// One named, ordered source of configuration values
///
/// Declared lowest to highest precedence; the derived `Ord` is the
/// precedence order, and it is global — never configurable per call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// Application-wide defaults
    AppDefaults,
    /// Defaults embedded in the service's own manifest
    RuntimeDefaults,
    /// Values captured from the daemon's process environment
    ProcessEnv,
    /// Values derived from capability wiring (provider outputs)
    Capability,
    /// Per-deploy-environment overrides (scoped by target environment)
    DeployEnv,
    /// Per-instance user overrides
    InstanceOverrides,
}

impl Layer {
    /// All layers, lowest precedence first
    pub const ORDER: [Layer; 6] = [
        Layer::AppDefaults,
        Layer::RuntimeDefaults,
        Layer::ProcessEnv,
        Layer::Capability,
        Layer::DeployEnv,
        Layer::InstanceOverrides,
    ];

    /// Minimum context depth at which this layer is consulted
    pub fn min_depth(&self) -> ContextDepth {
        match self {
            Layer::AppDefaults | Layer::RuntimeDefaults | Layer::ProcessEnv => {
                ContextDepth::Service
            }
            Layer::DeployEnv => ContextDepth::Target,
            Layer::Capability | Layer::InstanceOverrides => ContextDepth::Instance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::AppDefaults => "app_defaults",
            Layer::RuntimeDefaults => "runtime_defaults",
            Layer::ProcessEnv => "process_env",
            Layer::Capability => "capability",
            Layer::DeployEnv => "deploy_env",
            Layer::InstanceOverrides => "instance_overrides",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much scope a resolution context carries
///
/// Each depth consults a strict superset of the layers below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ContextDepth {
    Service,
    Target,
    Instance,
}

/// Scope of one resolution request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionContext {
    pub service_id: ServiceId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_target_id: Option<TargetId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_config_id: Option<InstanceConfigId>,
}

impl ResolutionContext {
    pub fn service(service_id: ServiceId) -> Self {
        Self {
            service_id,
            deployment_target_id: None,
            instance_config_id: None,
        }
    }

    pub fn with_target(mut self, target: TargetId) -> Self {
        self.deployment_target_id = Some(target);
        self
    }

    pub fn with_instance(mut self, instance: InstanceConfigId) -> Self {
        self.instance_config_id = Some(instance);
        self
    }

    pub fn depth(&self) -> ContextDepth {
        if self.instance_config_id.is_some() {
            ContextDepth::Instance
        } else if self.deployment_target_id.is_some() {
            ContextDepth::Target
        } else {
            ContextDepth::Service
        }
    }
}

/// Outcome of resolving one variable
///
/// A missing value is a first-class outcome (`found = false`), never an
/// error. For values reached through references, `source_layer` and
/// `source_path` name the location of the terminal literal — the place an
/// operator must edit to change the observed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub value: Option<ResolvedValue>,
    pub found: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<Layer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<SettingPath>,
}

impl ResolutionResult {
    pub fn found(value: ResolvedValue, layer: Layer, path: SettingPath) -> Self {
        Self {
            value: Some(value),
            found: true,
            source_layer: Some(layer),
            source_path: Some(path),
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            found: false,
            source_layer: None,
            source_path: None,
        }
    }
}
