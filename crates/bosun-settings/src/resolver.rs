//! Layered settings resolver
//!
//! One ordered list of layer descriptors, each tagged with the minimum
//! context depth that activates it, filtered once per resolve call. The
//! highest-precedence layer defining a name wins. Accepted reference
//! expressions re-resolve through the same context, with a visited-path
//! set for cycle detection and a fixed depth bound.

use crate::error::ResolutionError;
use crate::store::{documents, ValueStore};
use crate::wiring::WiringGraph;
use async_trait::async_trait;
use bosun_types::{
    CapabilityBinding, Layer, ResolutionContext, ResolutionResult, ServiceId, SettingPath,
    SettingValue,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on reference chain length. Overflow fails fast with the
/// offending chain; nothing is silently truncated.
pub const MAX_REFERENCE_DEPTH: usize = 8;

/// Registry-backed inputs to resolution: manifest-embedded defaults and
/// declared capability bindings. Read-only.
#[async_trait]
pub trait ServiceSettingsSource: Send + Sync {
    /// Defaults embedded in the service's own manifest
    async fn runtime_defaults(
        &self,
        service: &ServiceId,
    ) -> Result<BTreeMap<String, Value>, ResolutionError>;

    /// The capability binding a service declares for `name`, if any
    async fn capability_binding(
        &self,
        service: &ServiceId,
        name: &str,
    ) -> Result<Option<CapabilityBinding>, ResolutionError>;
}

/// Resolves variables against the fixed layer order
///
/// A pure function of current store state: no implicit writes, no caching
/// across calls. Concurrent store edits may yield different snapshots for
/// concurrent resolutions of the same context; resolution reflects best
/// effort current state, not a transaction.
pub struct SettingsResolver {
    store: Arc<dyn ValueStore>,
    wiring: Arc<WiringGraph>,
    services: Arc<dyn ServiceSettingsSource>,
}

impl SettingsResolver {
    pub fn new(
        store: Arc<dyn ValueStore>,
        wiring: Arc<WiringGraph>,
        services: Arc<dyn ServiceSettingsSource>,
    ) -> Self {
        Self {
            store,
            wiring,
            services,
        }
    }

    /// Resolve one variable in `ctx`.
    ///
    /// Missing values return `found = false`, never an error; errors are
    /// authoring defects (cycles, depth) or infrastructure failures.
    pub async fn resolve(
        &self,
        name: &str,
        ctx: &ResolutionContext,
    ) -> Result<ResolutionResult, ResolutionError> {
        let mut chain = Vec::new();
        self.resolve_chained(name.to_string(), ctx, &mut chain).await
    }

    /// Resolve every name in `names`, with one bulk section read per layer
    /// instead of per-variable point lookups.
    pub async fn resolve_all(
        &self,
        ctx: &ResolutionContext,
        names: &[String],
    ) -> Result<BTreeMap<String, ResolutionResult>, ResolutionError> {
        let snapshots = self.layer_snapshots(ctx).await?;

        let mut results = BTreeMap::new();
        for name in names {
            // Highest-precedence definition across the prefetched layers.
            let mut accepted: Option<(Layer, SettingPath, SettingValue)> = None;
            for (layer, section, prefix) in &snapshots {
                if let Some(raw) = section.get(name) {
                    if let Some(value) = SettingValue::from_document(raw) {
                        accepted = Some((*layer, qualified_path(prefix, name), value));
                    }
                }
            }
            // The capability layer has no bulk read; it sits between
            // ProcessEnv and DeployEnv in precedence.
            if let Some((layer, path, value)) = self.lookup_capability(name, ctx).await? {
                let outranked = accepted
                    .as_ref()
                    .map(|(l, _, _)| *l > Layer::Capability)
                    .unwrap_or(false);
                if !outranked {
                    accepted = Some((layer, path, value));
                }
            }

            let result = match accepted {
                None => ResolutionResult::missing(),
                Some((layer, path, SettingValue::Literal(v))) => {
                    ResolutionResult::found(v, layer, path)
                }
                Some((_, _, SettingValue::Reference(target))) => {
                    let mut chain = vec![name.clone()];
                    self.resolve_chained(target.as_str().to_string(), ctx, &mut chain)
                        .await?
                }
            };
            results.insert(name.clone(), result);
        }
        Ok(results)
    }

    // Recursive core; boxed because reference chains re-enter it.
    fn resolve_chained<'a>(
        &'a self,
        name: String,
        ctx: &'a ResolutionContext,
        chain: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<ResolutionResult, ResolutionError>> {
        Box::pin(async move {
            if chain.iter().any(|visited| *visited == name) {
                chain.push(name);
                return Err(ResolutionError::CyclicReference {
                    chain: chain.clone(),
                });
            }
            chain.push(name.clone());
            if chain.len() > MAX_REFERENCE_DEPTH {
                return Err(ResolutionError::ReferenceDepthExceeded {
                    chain: chain.clone(),
                    max: MAX_REFERENCE_DEPTH,
                });
            }

            let mut accepted: Option<(Layer, SettingPath, SettingValue)> = None;
            let depth = ctx.depth();
            for layer in Layer::ORDER {
                if layer.min_depth() > depth {
                    continue;
                }
                if let Some((path, value)) = self.lookup(layer, &name, ctx).await? {
                    accepted = Some((layer, path, value));
                }
            }

            match accepted {
                None => Ok(ResolutionResult::missing()),
                Some((layer, path, SettingValue::Literal(value))) => {
                    debug!(%name, %layer, %path, "resolved");
                    Ok(ResolutionResult::found(value, layer, path))
                }
                Some((_, _, SettingValue::Reference(target))) => {
                    self.resolve_chained(target.as_str().to_string(), ctx, chain)
                        .await
                }
            }
        })
    }

    /// Look `name` up in one layer. `None` when the layer does not define
    /// it (including when the context lacks the layer's scoping key).
    async fn lookup(
        &self,
        layer: Layer,
        name: &str,
        ctx: &ResolutionContext,
    ) -> Result<Option<(SettingPath, SettingValue)>, ResolutionError> {
        let raw = match layer {
            Layer::AppDefaults => {
                let path = SettingPath::new(name);
                self.store
                    .get(documents::DEFAULTS, &path)
                    .await?
                    .map(|v| (qualified_path(documents::DEFAULTS, name), v))
            }
            Layer::RuntimeDefaults => self
                .services
                .runtime_defaults(&ctx.service_id)
                .await?
                .remove(name)
                .map(|v| {
                    let path = format!("services.{}.defaults.{}", ctx.service_id, name);
                    (SettingPath::new(path), v)
                }),
            Layer::ProcessEnv => {
                let path = SettingPath::new(name);
                self.store
                    .get(documents::PROCESS_ENV, &path)
                    .await?
                    .map(|v| (qualified_path(documents::PROCESS_ENV, name), v))
            }
            Layer::Capability => {
                return Ok(self
                    .lookup_capability(name, ctx)
                    .await?
                    .map(|(_, path, value)| (path, value)))
            }
            Layer::DeployEnv => {
                let Some(target) = &ctx.deployment_target_id else {
                    return Ok(None);
                };
                let path = SettingPath::new(format!("{}.{}", target.environment(), name));
                self.store
                    .get(documents::DEPLOY_ENV, &path)
                    .await?
                    .map(|v| (qualified_path(documents::DEPLOY_ENV, path.as_str()), v))
            }
            Layer::InstanceOverrides => {
                let Some(instance) = &ctx.instance_config_id else {
                    return Ok(None);
                };
                let path = SettingPath::new(format!("{instance}.{name}"));
                self.store
                    .get(documents::INSTANCES, &path)
                    .await?
                    .map(|v| (qualified_path(documents::INSTANCES, path.as_str()), v))
            }
        };

        Ok(raw.and_then(|(path, value)| {
            SettingValue::from_document(&value).map(|parsed| (path, parsed))
        }))
    }

    /// Capability layer: the service must declare a binding for `name`,
    /// the consumer instance must be wired, and the wired provider must
    /// publish the bound output.
    async fn lookup_capability(
        &self,
        name: &str,
        ctx: &ResolutionContext,
    ) -> Result<Option<(Layer, SettingPath, SettingValue)>, ResolutionError> {
        let Some(consumer) = &ctx.instance_config_id else {
            return Ok(None);
        };
        let Some(binding) = self
            .services
            .capability_binding(&ctx.service_id, name)
            .await?
        else {
            return Ok(None);
        };
        let Some(provider) = self.wiring.provider_for(consumer, &binding.capability) else {
            return Ok(None);
        };

        let path = SettingPath::new(format!(
            "{}.{}.{}",
            provider, binding.capability, binding.output
        ));
        let Some(raw) = self.store.get(documents::OUTPUTS, &path).await? else {
            return Ok(None);
        };

        Ok(SettingValue::from_document(&raw).map(|value| {
            (
                Layer::Capability,
                qualified_path(documents::OUTPUTS, path.as_str()),
                value,
            )
        }))
    }

    /// Bulk per-layer sections for `resolve_all`, lowest precedence first.
    /// The capability layer is excluded — it has no section read.
    async fn layer_snapshots(
        &self,
        ctx: &ResolutionContext,
    ) -> Result<Vec<(Layer, BTreeMap<String, Value>, String)>, ResolutionError> {
        let depth = ctx.depth();
        let mut snapshots = Vec::new();

        for layer in Layer::ORDER {
            if layer.min_depth() > depth || layer == Layer::Capability {
                continue;
            }
            let (section, prefix) = match layer {
                Layer::AppDefaults => (
                    self.store.read_section(documents::DEFAULTS, "").await?,
                    documents::DEFAULTS.to_string(),
                ),
                Layer::RuntimeDefaults => (
                    self.services.runtime_defaults(&ctx.service_id).await?,
                    format!("services.{}.defaults", ctx.service_id),
                ),
                Layer::ProcessEnv => (
                    self.store.read_section(documents::PROCESS_ENV, "").await?,
                    documents::PROCESS_ENV.to_string(),
                ),
                Layer::DeployEnv => {
                    let Some(target) = &ctx.deployment_target_id else {
                        continue;
                    };
                    (
                        self.store
                            .read_section(documents::DEPLOY_ENV, target.environment())
                            .await?,
                        format!("{}.{}", documents::DEPLOY_ENV, target.environment()),
                    )
                }
                Layer::InstanceOverrides => {
                    let Some(instance) = &ctx.instance_config_id else {
                        continue;
                    };
                    (
                        self.store
                            .read_section(documents::INSTANCES, instance.as_str())
                            .await?,
                        format!("{}.{}", documents::INSTANCES, instance),
                    )
                }
                Layer::Capability => unreachable!("excluded above"),
            };
            snapshots.push((layer, section, prefix));
        }
        Ok(snapshots)
    }
}

fn qualified_path(prefix: &str, name: &str) -> SettingPath {
    SettingPath::new(format!("{prefix}.{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryValueStore;
    use bosun_types::{InstanceConfigId, ResolvedValue};
    use serde_json::json;

    /// Test double for the registry-backed layers
    #[derive(Default)]
    struct StaticSource {
        runtime_defaults: BTreeMap<String, Value>,
        bindings: BTreeMap<String, CapabilityBinding>,
    }

    #[async_trait]
    impl ServiceSettingsSource for StaticSource {
        async fn runtime_defaults(
            &self,
            _service: &ServiceId,
        ) -> Result<BTreeMap<String, Value>, ResolutionError> {
            Ok(self.runtime_defaults.clone())
        }

        async fn capability_binding(
            &self,
            _service: &ServiceId,
            name: &str,
        ) -> Result<Option<CapabilityBinding>, ResolutionError> {
            Ok(self.bindings.get(name).cloned())
        }
    }

    struct Fixture {
        store: Arc<MemoryValueStore>,
        wiring: Arc<WiringGraph>,
        resolver: SettingsResolver,
    }

    fn fixture(source: StaticSource) -> Fixture {
        let store = Arc::new(MemoryValueStore::new());
        let wiring = Arc::new(WiringGraph::new());
        let resolver = SettingsResolver::new(store.clone(), wiring.clone(), Arc::new(source));
        Fixture {
            store,
            wiring,
            resolver,
        }
    }

    fn service_ctx() -> ResolutionContext {
        ResolutionContext::service(ServiceId::new("service-x"))
    }

    fn instance_ctx() -> ResolutionContext {
        service_ctx()
            .with_target("worker-1.container.prod".parse().unwrap())
            .with_instance(InstanceConfigId::new("x-prod"))
    }

    #[tokio::test]
    async fn test_missing_is_not_an_error() {
        let f = fixture(StaticSource::default());
        let result = f.resolver.resolve("ABSENT", &service_ctx()).await.unwrap();
        assert!(!result.found);
        assert_eq!(result.value, None);
        assert_eq!(result.source_layer, None);
    }

    #[tokio::test]
    async fn test_precedence_by_context_depth() {
        // defaults: PORT=8080; manifest override: PORT=9090;
        // instance override for x-prod: PORT=9999.
        let mut source = StaticSource::default();
        source.runtime_defaults.insert("PORT".into(), json!(9090));
        let f = fixture(source);
        f.store.insert_document("defaults", json!({"PORT": 8080}));
        f.store
            .insert_document("instances", json!({"x-prod": {"PORT": 9999}}));

        let at_service = f.resolver.resolve("PORT", &service_ctx()).await.unwrap();
        assert_eq!(at_service.value, Some(ResolvedValue::Num(9090.0)));
        assert_eq!(at_service.source_layer, Some(Layer::RuntimeDefaults));

        let at_instance = f.resolver.resolve("PORT", &instance_ctx()).await.unwrap();
        assert_eq!(at_instance.value, Some(ResolvedValue::Num(9999.0)));
        assert_eq!(at_instance.source_layer, Some(Layer::InstanceOverrides));
    }

    #[tokio::test]
    async fn test_deploy_env_scoped_by_target_environment() {
        let f = fixture(StaticSource::default());
        f.store.insert_document("defaults", json!({"PORT": 8080}));
        f.store.insert_document(
            "deploy_env",
            json!({"prod": {"PORT": 7070}, "staging": {"PORT": 6060}}),
        );

        let ctx = service_ctx().with_target("worker-1.container.prod".parse().unwrap());
        let result = f.resolver.resolve("PORT", &ctx).await.unwrap();
        assert_eq!(result.value, Some(ResolvedValue::Num(7070.0)));
        assert_eq!(result.source_layer, Some(Layer::DeployEnv));
        assert_eq!(
            result.source_path,
            Some(SettingPath::new("deploy_env.prod.PORT"))
        );

        // Without a target the deploy-env layer is omitted entirely.
        let result = f.resolver.resolve("PORT", &service_ctx()).await.unwrap();
        assert_eq!(result.source_layer, Some(Layer::AppDefaults));
    }

    #[tokio::test]
    async fn test_reference_dereference_with_terminal_provenance() {
        let f = fixture(StaticSource::default());
        f.store.insert_document(
            "defaults",
            json!({"DB_URL": "@settings.database.url", "database": {"url": "postgres://db"}}),
        );

        let result = f.resolver.resolve("DB_URL", &service_ctx()).await.unwrap();
        assert_eq!(
            result.value,
            Some(ResolvedValue::Str("postgres://db".into()))
        );
        assert_eq!(
            result.source_path,
            Some(SettingPath::new("defaults.database.url"))
        );
    }

    #[tokio::test]
    async fn test_reference_target_respects_precedence() {
        // The referenced path itself resolves through the layers: an
        // instance override of the target wins over the default.
        let f = fixture(StaticSource::default());
        f.store.insert_document(
            "defaults",
            json!({"DB_URL": "@settings.database.url", "database": {"url": "postgres://db"}}),
        );
        f.store.insert_document(
            "instances",
            json!({"x-prod": {"database": {"url": "postgres://prod-db"}}}),
        );

        let result = f.resolver.resolve("DB_URL", &instance_ctx()).await.unwrap();
        assert_eq!(
            result.value,
            Some(ResolvedValue::Str("postgres://prod-db".into()))
        );
        assert_eq!(result.source_layer, Some(Layer::InstanceOverrides));
    }

    #[tokio::test]
    async fn test_cyclic_reference_fails_bounded() {
        let f = fixture(StaticSource::default());
        f.store.insert_document(
            "defaults",
            json!({"A": "@settings.B", "B": "@settings.C", "C": "@settings.A"}),
        );

        let err = f.resolver.resolve("A", &service_ctx()).await.unwrap_err();
        match err {
            ResolutionError::CyclicReference { chain } => {
                assert_eq!(chain, vec!["A", "B", "C", "A"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_reference_is_a_cycle() {
        let f = fixture(StaticSource::default());
        f.store
            .insert_document("defaults", json!({"A": "@settings.A"}));

        assert!(matches!(
            f.resolver.resolve("A", &service_ctx()).await,
            Err(ResolutionError::CyclicReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_reference_depth_bound() {
        // A long acyclic chain past the bound fails fast instead of
        // silently truncating.
        let mut doc = serde_json::Map::new();
        for i in 0..=MAX_REFERENCE_DEPTH {
            doc.insert(format!("V{i}"), json!(format!("@settings.V{}", i + 1)));
        }
        doc.insert(
            format!("V{}", MAX_REFERENCE_DEPTH + 1),
            json!("terminal"),
        );
        let f = fixture(StaticSource::default());
        f.store.insert_document("defaults", Value::Object(doc));

        assert!(matches!(
            f.resolver.resolve("V0", &service_ctx()).await,
            Err(ResolutionError::ReferenceDepthExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_reference_to_missing_is_not_found() {
        let f = fixture(StaticSource::default());
        f.store
            .insert_document("defaults", json!({"A": "@settings.ghost"}));

        let result = f.resolver.resolve("A", &service_ctx()).await.unwrap();
        assert!(!result.found);
    }

    #[tokio::test]
    async fn test_capability_layer_reads_wired_provider_outputs() {
        let mut source = StaticSource::default();
        source.bindings.insert(
            "LLM_ENDPOINT".into(),
            CapabilityBinding {
                capability: "llm".into(),
                output: "endpoint".into(),
            },
        );
        let f = fixture(source);
        f.store.insert_document(
            "outputs",
            json!({"provider-p": {"llm": {"endpoint": "http://p:1234"}}}),
        );
        f.wiring
            .set_wiring(bosun_types::WiringEdge::new(
                InstanceConfigId::new("x-prod"),
                "llm",
                InstanceConfigId::new("provider-p"),
                "llm",
            ))
            .unwrap();

        let result = f
            .resolver
            .resolve("LLM_ENDPOINT", &instance_ctx())
            .await
            .unwrap();
        assert_eq!(
            result.value,
            Some(ResolvedValue::Str("http://p:1234".into()))
        );
        assert_eq!(result.source_layer, Some(Layer::Capability));
        assert_eq!(
            result.source_path,
            Some(SettingPath::new("outputs.provider-p.llm.endpoint"))
        );
    }

    #[tokio::test]
    async fn test_unwired_capability_is_missing() {
        let mut source = StaticSource::default();
        source.bindings.insert(
            "LLM_ENDPOINT".into(),
            CapabilityBinding {
                capability: "llm".into(),
                output: "endpoint".into(),
            },
        );
        let f = fixture(source);

        let result = f
            .resolver
            .resolve("LLM_ENDPOINT", &instance_ctx())
            .await
            .unwrap();
        assert!(!result.found);
    }

    #[tokio::test]
    async fn test_deploy_env_outranks_capability() {
        let mut source = StaticSource::default();
        source.bindings.insert(
            "LLM_ENDPOINT".into(),
            CapabilityBinding {
                capability: "llm".into(),
                output: "endpoint".into(),
            },
        );
        let f = fixture(source);
        f.store.insert_document(
            "outputs",
            json!({"provider-p": {"llm": {"endpoint": "http://p:1234"}}}),
        );
        f.store.insert_document(
            "deploy_env",
            json!({"prod": {"LLM_ENDPOINT": "http://emergency:9"}}),
        );
        f.wiring
            .set_wiring(bosun_types::WiringEdge::new(
                InstanceConfigId::new("x-prod"),
                "llm",
                InstanceConfigId::new("provider-p"),
                "llm",
            ))
            .unwrap();

        let result = f
            .resolver
            .resolve("LLM_ENDPOINT", &instance_ctx())
            .await
            .unwrap();
        assert_eq!(result.source_layer, Some(Layer::DeployEnv));
    }

    #[tokio::test]
    async fn test_resolve_all_matches_single_resolves() {
        let mut source = StaticSource::default();
        source.runtime_defaults.insert("PORT".into(), json!(9090));
        source.bindings.insert(
            "LLM_ENDPOINT".into(),
            CapabilityBinding {
                capability: "llm".into(),
                output: "endpoint".into(),
            },
        );
        let f = fixture(source);
        f.store.insert_document(
            "defaults",
            json!({"PORT": 8080, "HOST": "0.0.0.0", "DB": "@settings.database.url",
                   "database": {"url": "postgres://db"}}),
        );
        f.store.insert_document(
            "outputs",
            json!({"provider-p": {"llm": {"endpoint": "http://p:1234"}}}),
        );
        f.wiring
            .set_wiring(bosun_types::WiringEdge::new(
                InstanceConfigId::new("x-prod"),
                "llm",
                InstanceConfigId::new("provider-p"),
                "llm",
            ))
            .unwrap();

        let ctx = instance_ctx();
        let names: Vec<String> = ["PORT", "HOST", "DB", "LLM_ENDPOINT", "ABSENT"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let all = f.resolver.resolve_all(&ctx, &names).await.unwrap();

        for name in &names {
            let single = f.resolver.resolve(name, &ctx).await.unwrap();
            assert_eq!(all.get(name), Some(&single), "mismatch for {name}");
        }
        assert!(!all["ABSENT"].found);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent_without_writes() {
        let f = fixture(StaticSource::default());
        f.store
            .insert_document("defaults", json!({"PORT": 8080}));

        let ctx = service_ctx();
        let first = f.resolver.resolve("PORT", &ctx).await.unwrap();
        let second = f.resolver.resolve("PORT", &ctx).await.unwrap();
        assert_eq!(first, second);
    }
}
