//! Deployment resolution
//!
//! Combines resolver output with a service's declared runtime shape to
//! produce a fully-resolved, variable-free definition. Resolution failures
//! abort before any backend is touched; the output is scanned so no
//! placeholder or reference syntax can leak into a backend call.

use crate::error::{DeployError, Result};
use bosun_registry::ServiceRegistry;
use bosun_settings::SettingsResolver;
use bosun_types::{
    InstanceConfigId, ResolutionContext, ResolvedServiceDefinition, ResolvedValue, ServiceId,
    TargetId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Produces deployment-ready definitions from declared shapes
pub struct DeploymentResolver {
    registry: Arc<dyn ServiceRegistry>,
    settings: Arc<SettingsResolver>,
}

impl DeploymentResolver {
    pub fn new(registry: Arc<dyn ServiceRegistry>, settings: Arc<SettingsResolver>) -> Self {
        Self { registry, settings }
    }

    /// Resolve `service` for deployment onto `target`.
    ///
    /// Required variables that resolve to `found = false` fail the whole
    /// call — partially configured services are never deployed. Optional
    /// unresolved variables are omitted from the definition.
    #[instrument(skip(self), fields(service = %service, target = %target))]
    pub async fn resolve_for_deployment(
        &self,
        service: &ServiceId,
        target: &TargetId,
        instance: Option<&InstanceConfigId>,
    ) -> Result<ResolvedServiceDefinition> {
        let shape = self
            .registry
            .get_service_shape(service)
            .await?
            .ok_or_else(|| DeployError::UnknownService(service.clone()))?;

        let mut ctx =
            ResolutionContext::service(service.clone()).with_target(target.clone());
        if let Some(instance) = instance {
            ctx = ctx.with_instance(instance.clone());
        }

        let names = shape.declared_var_names();
        let results = self.settings.resolve_all(&ctx, &names).await?;

        let mut missing_required = Vec::new();
        let mut variables: BTreeMap<String, ResolvedValue> = BTreeMap::new();
        for var in &shape.declared_vars {
            match results.get(&var.name).and_then(|r| r.value.clone()) {
                Some(value) => {
                    variables.insert(var.name.clone(), value);
                }
                None if var.required => missing_required.push(var.name.clone()),
                None => {}
            }
        }
        if !missing_required.is_empty() {
            return Err(DeployError::MissingRequiredValue {
                variables: missing_required,
            });
        }

        let definition = ResolvedServiceDefinition {
            service_id: shape.id.clone(),
            image: substitute(&shape.image, &variables),
            command: shape
                .command
                .iter()
                .map(|arg| substitute(arg, &variables))
                .collect(),
            env: shape
                .env
                .iter()
                .map(|(key, value)| (key.clone(), substitute(value, &variables)))
                .collect(),
            ports: shape.ports.clone(),
            volumes: shape
                .volumes
                .iter()
                .map(|volume| {
                    let mut v = volume.clone();
                    v.source = substitute(&v.source, &variables);
                    v.mount_path = substitute(&v.mount_path, &variables);
                    v
                })
                .collect(),
            variables,
        };

        let leftovers = definition.unresolved_fields();
        if !leftovers.is_empty() {
            return Err(DeployError::UnresolvedPlaceholders { fields: leftovers });
        }

        debug!(vars = definition.variables.len(), "deployment resolution complete");
        Ok(definition)
    }
}

/// Replace every `${NAME}` occurrence for each resolved variable
fn substitute(template: &str, variables: &BTreeMap<String, ResolvedValue>) -> String {
    let mut out = template.to_string();
    for (name, value) in variables {
        let placeholder = format!("${{{name}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, &value.render());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_registry::MemoryServiceRegistry;
    use bosun_settings::{MemoryValueStore, WiringGraph};
    use bosun_types::{DeclaredVar, ServiceShape, VolumeSpec};
    use serde_json::json;

    fn setup(shape: ServiceShape, defaults: serde_json::Value) -> DeploymentResolver {
        let registry = Arc::new(MemoryServiceRegistry::new());
        registry.insert(shape);

        let store = Arc::new(MemoryValueStore::new());
        store.insert_document("defaults", defaults);

        let settings = Arc::new(SettingsResolver::new(
            store,
            Arc::new(WiringGraph::new()),
            registry.clone(),
        ));
        DeploymentResolver::new(registry, settings)
    }

    fn target() -> TargetId {
        "worker-1.container.prod".parse().unwrap()
    }

    #[tokio::test]
    async fn test_substitutes_all_placeholders() {
        let mut shape = ServiceShape::new(ServiceId::new("svc"), "registry.local/svc:${TAG}");
        shape.env.insert("LISTEN".into(), "0.0.0.0:${PORT}".into());
        shape.volumes.push(VolumeSpec {
            source: "${DATA_DIR}".into(),
            mount_path: "/data".into(),
            read_only: false,
        });
        shape.declared_vars = vec![
            DeclaredVar::required("TAG"),
            DeclaredVar::required("PORT"),
            DeclaredVar::required("DATA_DIR"),
        ];

        let resolver = setup(
            shape,
            json!({"TAG": "1.2.3", "PORT": 8080, "DATA_DIR": "/srv/svc"}),
        );
        let definition = resolver
            .resolve_for_deployment(&ServiceId::new("svc"), &target(), None)
            .await
            .unwrap();

        assert_eq!(definition.image, "registry.local/svc:1.2.3");
        assert_eq!(definition.env["LISTEN"], "0.0.0.0:8080");
        assert_eq!(definition.volumes[0].source, "/srv/svc");
        assert!(definition.unresolved_fields().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_aborts() {
        let mut shape = ServiceShape::new(ServiceId::new("svc"), "svc:1");
        shape.declared_vars = vec![
            DeclaredVar::required("PORT"),
            DeclaredVar::required("API_KEY"),
        ];

        let resolver = setup(shape, json!({"PORT": 8080}));
        let err = resolver
            .resolve_for_deployment(&ServiceId::new("svc"), &target(), None)
            .await
            .unwrap_err();

        match err {
            DeployError::MissingRequiredValue { variables } => {
                assert_eq!(variables, vec!["API_KEY"]);
            }
            other => panic!("expected missing required, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unresolved_optional_is_omitted() {
        let mut shape = ServiceShape::new(ServiceId::new("svc"), "svc:1");
        shape.declared_vars = vec![DeclaredVar::optional("TRACE_ENDPOINT")];

        let resolver = setup(shape, json!({}));
        let definition = resolver
            .resolve_for_deployment(&ServiceId::new("svc"), &target(), None)
            .await
            .unwrap();
        assert!(!definition.variables.contains_key("TRACE_ENDPOINT"));
    }

    #[tokio::test]
    async fn test_no_reference_syntax_survives() {
        // A declared value that itself resolves through a reference must
        // arrive dereferenced.
        let mut shape = ServiceShape::new(ServiceId::new("svc"), "svc:1");
        shape.env.insert("DB".into(), "${DB_URL}".into());
        shape.declared_vars = vec![DeclaredVar::required("DB_URL")];

        let resolver = setup(
            shape,
            json!({"DB_URL": "@settings.database.url", "database": {"url": "postgres://db"}}),
        );
        let definition = resolver
            .resolve_for_deployment(&ServiceId::new("svc"), &target(), None)
            .await
            .unwrap();

        assert_eq!(definition.env["DB"], "postgres://db");
        let serialized = serde_json::to_string(&definition).unwrap();
        assert!(!serialized.contains("@settings."));
    }

    #[tokio::test]
    async fn test_template_referencing_undeclared_var_is_a_defect() {
        let mut shape = ServiceShape::new(ServiceId::new("svc"), "svc:${TAG}");
        shape.declared_vars = vec![];

        let resolver = setup(shape, json!({}));
        assert!(matches!(
            resolver
                .resolve_for_deployment(&ServiceId::new("svc"), &target(), None)
                .await,
            Err(DeployError::UnresolvedPlaceholders { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let resolver = setup(ServiceShape::new(ServiceId::new("svc"), "svc:1"), json!({}));
        assert!(matches!(
            resolver
                .resolve_for_deployment(&ServiceId::new("ghost"), &target(), None)
                .await,
            Err(DeployError::UnknownService(_))
        ));
    }
}
