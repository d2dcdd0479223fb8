//! Deployment target identifiers
//!
//! Targets are addressed as `{identifier}.{family}.{environment}`, e.g.
//! `worker-1.container.prod` or `cluster-a.k8s.prod`. The family selects the
//! deployment backend; the environment selects the deploy-environment
//! configuration layer's scoping key.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Backend family a target belongs to
///
/// Backend selection is a pure function of this value, never inferred from
/// a resolved definition's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFamily {
    /// A container host, local or reached through a remote agent
    Container,
    /// A Kubernetes cluster driven via generated manifests
    Kubernetes,
}

impl TargetFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFamily::Container => "container",
            TargetFamily::Kubernetes => "k8s",
        }
    }
}

impl fmt::Display for TargetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a target identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetIdParseError {
    #[error("target id '{0}' must have the form <identifier>.<family>.<environment>")]
    Malformed(String),

    #[error("unknown target family '{family}' in '{id}' (expected 'container' or 'k8s')")]
    UnknownFamily { id: String, family: String },

    #[error("empty segment in target id '{0}'")]
    EmptySegment(String),
}

/// Structured deployment target identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetId {
    name: String,
    family: TargetFamily,
    environment: String,
}

impl TargetId {
    pub fn new(
        name: impl Into<String>,
        family: TargetFamily,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            environment: environment.into(),
        }
    }

    /// The target-specific identifier segment, e.g. `worker-1`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> TargetFamily {
        self.family
    }

    /// Scoping key for the deploy-environment layer, e.g. `prod`
    pub fn environment(&self) -> &str {
        &self.environment
    }
}

impl FromStr for TargetId {
    type Err = TargetIdParseError;

    // The identifier segment may itself contain dots, so family and
    // environment are taken from the right.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, '.');
        let environment = parts.next().unwrap_or_default();
        let family_raw = parts
            .next()
            .ok_or_else(|| TargetIdParseError::Malformed(s.to_string()))?;
        let name = parts
            .next()
            .ok_or_else(|| TargetIdParseError::Malformed(s.to_string()))?;

        if name.is_empty() || family_raw.is_empty() || environment.is_empty() {
            return Err(TargetIdParseError::EmptySegment(s.to_string()));
        }

        let family = match family_raw {
            "container" => TargetFamily::Container,
            "k8s" => TargetFamily::Kubernetes,
            other => {
                return Err(TargetIdParseError::UnknownFamily {
                    id: s.to_string(),
                    family: other.to_string(),
                });
            }
        };

        Ok(Self {
            name: name.to_string(),
            family,
            environment: environment.to_string(),
        })
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.name, self.family, self.environment)
    }
}

impl Serialize for TargetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TargetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}
