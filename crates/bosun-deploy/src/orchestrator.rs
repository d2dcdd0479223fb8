//! Deployment orchestrator
//!
//! Threads the deployment resolver, tracker, target catalog and backends
//! together behind one call surface. Resolution errors abort before a
//! record exists; backend errors after dispatch land the record in
//! `failed` with its metadata preserved. Nothing here retries — a retry is
//! an explicit new deploy call.

use crate::backend::DeploymentBackend;
use crate::error::{DeployError, Result};
use crate::resolution::DeploymentResolver;
use crate::target::{DeployTarget, TargetCatalog};
use crate::tracker::DeploymentTracker;
use bosun_types::{
    DeploymentId, DeploymentOperation, DeploymentRecord, DeploymentStatus, InstanceConfigId,
    ServiceId, TargetFamily, TargetId,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// One backend per target family, selected at target-resolution time
pub struct BackendSet {
    pub container: Arc<dyn DeploymentBackend>,
    pub cluster: Arc<dyn DeploymentBackend>,
}

impl BackendSet {
    fn for_family(&self, family: TargetFamily) -> &dyn DeploymentBackend {
        match family {
            TargetFamily::Container => self.container.as_ref(),
            TargetFamily::Kubernetes => self.cluster.as_ref(),
        }
    }
}

/// Orchestrates deployments across heterogeneous targets
pub struct Orchestrator {
    resolver: DeploymentResolver,
    tracker: Arc<DeploymentTracker>,
    targets: Arc<TargetCatalog>,
    backends: BackendSet,
}

impl Orchestrator {
    pub fn new(
        resolver: DeploymentResolver,
        tracker: Arc<DeploymentTracker>,
        targets: Arc<TargetCatalog>,
        backends: BackendSet,
    ) -> Self {
        Self {
            resolver,
            tracker,
            targets,
            backends,
        }
    }

    /// Resolve configuration and create a pending record.
    ///
    /// This is the synchronous half of a deploy request: every resolution
    /// failure (missing required values, cycles, unknown ids) surfaces
    /// here, before any record or backend call exists.
    #[instrument(skip(self), fields(service = %service_id, target = %target_id))]
    pub async fn prepare_deploy(
        &self,
        service_id: &ServiceId,
        target_id: &TargetId,
        instance: Option<&InstanceConfigId>,
    ) -> Result<DeploymentRecord> {
        let target = self.lookup_target(target_id)?;

        let definition = self
            .resolver
            .resolve_for_deployment(service_id, &target.id, instance)
            .await?;

        let record = DeploymentRecord::new(
            DeploymentId::generate(),
            service_id.clone(),
            target.id.clone(),
            definition,
        );
        self.tracker.upsert(record.clone()).await?;

        info!(deployment = %record.id, "deployment recorded");
        Ok(record)
    }

    /// Execute a pending deployment against its backend.
    #[instrument(skip(self), fields(deployment = %id))]
    pub async fn execute_deploy(&self, id: &DeploymentId) -> Result<DeploymentRecord> {
        let (mut record, _guard) = self.tracker.begin(id, DeploymentOperation::Deploy).await?;
        let target = self.lookup_target(&record.target_id)?;
        let backend = self.backends.for_family(record.backend);

        record.transition(DeploymentStatus::Deploying);
        self.tracker.upsert(record.clone()).await?;

        match backend.deploy(&target, &record.resolved_config, id).await {
            Ok((metadata, status)) => {
                record.backend_metadata = metadata;
                record.transition(status);
                self.tracker.upsert(record.clone()).await?;
                info!(deployment = %id, status = %record.status, "deployment dispatched");
                Ok(record)
            }
            Err(err) => {
                if let DeployError::PartialApply { metadata, .. } = &err {
                    record.backend_metadata = metadata.clone();
                }
                record.transition(DeploymentStatus::failed(err.to_string()));
                self.tracker.upsert(record.clone()).await?;
                error!(deployment = %id, error = %err, "deployment failed");
                Err(err)
            }
        }
    }

    /// Prepare and execute in one call.
    pub async fn deploy(
        &self,
        service_id: &ServiceId,
        target_id: &TargetId,
        instance: Option<&InstanceConfigId>,
    ) -> Result<DeploymentRecord> {
        let record = self.prepare_deploy(service_id, target_id, instance).await?;
        self.execute_deploy(&record.id).await
    }

    /// Current status, reconciled from the backend where the record is in
    /// a backend-observable state. Cancellation never implies rollback;
    /// this is where actual external state wins.
    pub async fn status(&self, id: &DeploymentId) -> Result<DeploymentRecord> {
        let mut record = self.tracker.record(id).await?;

        let observable = matches!(
            record.status,
            DeploymentStatus::Deploying | DeploymentStatus::Running
        );
        if observable {
            let target = self.lookup_target(&record.target_id)?;
            let backend = self.backends.for_family(record.backend);
            let observed = backend.status(&target, &record).await?;
            if observed != record.status {
                record.transition(observed);
                self.tracker.upsert(record.clone()).await?;
            }
        }
        Ok(record)
    }

    #[instrument(skip(self), fields(deployment = %id))]
    pub async fn stop(&self, id: &DeploymentId) -> Result<DeploymentRecord> {
        let (mut record, _guard) = self.tracker.begin(id, DeploymentOperation::Stop).await?;
        let target = self.lookup_target(&record.target_id)?;
        let backend = self.backends.for_family(record.backend);

        // On failure the record keeps its current state; stop is
        // retryable by the caller.
        backend.stop(&target, &record).await?;

        record.transition(DeploymentStatus::Stopped);
        self.tracker.upsert(record.clone()).await?;
        info!(deployment = %id, "deployment stopped");
        Ok(record)
    }

    /// Remove target-side artifacts. Allowed from `stopped` and `failed`;
    /// for partially-applied cluster deployments only the recorded
    /// artifacts are cleaned up.
    #[instrument(skip(self), fields(deployment = %id))]
    pub async fn remove(&self, id: &DeploymentId) -> Result<DeploymentRecord> {
        let (mut record, _guard) = self.tracker.begin(id, DeploymentOperation::Remove).await?;
        let target = self.lookup_target(&record.target_id)?;
        let backend = self.backends.for_family(record.backend);

        let prior = record.status.clone();
        record.transition(DeploymentStatus::Removing);
        self.tracker.upsert(record.clone()).await?;

        match backend.remove(&target, &record).await {
            Ok(()) => {
                record.transition(DeploymentStatus::Removed);
                self.tracker.upsert(record.clone()).await?;
                info!(deployment = %id, "deployment removed");
                Ok(record)
            }
            Err(err) => {
                // Roll the record back so remove can be retried.
                record.transition(prior);
                self.tracker.upsert(record.clone()).await?;
                Err(err)
            }
        }
    }

    pub async fn logs(&self, id: &DeploymentId) -> Result<Vec<String>> {
        let record = self.tracker.record(id).await?;
        let target = self.lookup_target(&record.target_id)?;
        let backend = self.backends.for_family(record.backend);
        backend.logs(&target, &record).await
    }

    pub async fn get(&self, id: &DeploymentId) -> Result<DeploymentRecord> {
        self.tracker.record(id).await
    }

    pub async fn list_by_service(&self, service_id: &ServiceId) -> Result<Vec<DeploymentRecord>> {
        self.tracker.list_by_service(service_id).await
    }

    pub fn targets(&self) -> &TargetCatalog {
        &self.targets
    }

    fn lookup_target(&self, id: &TargetId) -> Result<DeployTarget> {
        self.targets
            .get(id)
            .ok_or_else(|| DeployError::UnknownTarget(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetConnection;
    use crate::tracker::MemoryTrackerStore;
    use async_trait::async_trait;
    use bosun_registry::MemoryServiceRegistry;
    use bosun_settings::{MemoryValueStore, SettingsResolver, WiringGraph};
    use bosun_types::{DeclaredVar, ResolvedServiceDefinition, ServiceShape};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls; deploy result is scripted
    struct MockBackend {
        deploy_calls: AtomicUsize,
        fail_deploy: Option<fn() -> DeployError>,
    }

    impl MockBackend {
        fn ok() -> Self {
            Self {
                deploy_calls: AtomicUsize::new(0),
                fail_deploy: None,
            }
        }

        fn failing(f: fn() -> DeployError) -> Self {
            Self {
                deploy_calls: AtomicUsize::new(0),
                fail_deploy: Some(f),
            }
        }
    }

    #[async_trait]
    impl DeploymentBackend for MockBackend {
        async fn deploy(
            &self,
            _target: &DeployTarget,
            _definition: &ResolvedServiceDefinition,
            _id: &DeploymentId,
        ) -> Result<(serde_json::Value, DeploymentStatus)> {
            self.deploy_calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_deploy {
                Some(f) => Err(f()),
                None => Ok((json!({ "container_id": "abc123" }), DeploymentStatus::Running)),
            }
        }

        async fn status(
            &self,
            _target: &DeployTarget,
            _record: &DeploymentRecord,
        ) -> Result<DeploymentStatus> {
            Ok(DeploymentStatus::Running)
        }

        async fn stop(&self, _target: &DeployTarget, _record: &DeploymentRecord) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, _target: &DeployTarget, _record: &DeploymentRecord) -> Result<()> {
            Ok(())
        }

        async fn logs(
            &self,
            _target: &DeployTarget,
            _record: &DeploymentRecord,
        ) -> Result<Vec<String>> {
            Ok(vec!["line".into()])
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        container: Arc<MockBackend>,
    }

    fn fixture_with(shape: ServiceShape, defaults: serde_json::Value) -> Fixture {
        fixture_with_backend(shape, defaults, Arc::new(MockBackend::ok()))
    }

    fn fixture_with_backend(
        shape: ServiceShape,
        defaults: serde_json::Value,
        container: Arc<MockBackend>,
    ) -> Fixture {
        let registry = Arc::new(MemoryServiceRegistry::new());
        registry.insert(shape);

        let store = Arc::new(MemoryValueStore::new());
        store.insert_document("defaults", defaults);

        let settings = Arc::new(SettingsResolver::new(
            store,
            Arc::new(WiringGraph::new()),
            registry.clone(),
        ));
        let resolver = DeploymentResolver::new(registry, settings);

        let targets = Arc::new(TargetCatalog::new());
        targets
            .insert(DeployTarget {
                id: "worker-1.container.prod".parse().unwrap(),
                connection: TargetConnection::LocalHost {
                    engine_url: "http://localhost:2375".into(),
                },
            })
            .unwrap();

        let orchestrator = Orchestrator::new(
            resolver,
            Arc::new(DeploymentTracker::new(Arc::new(MemoryTrackerStore::new()))),
            targets,
            BackendSet {
                container: container.clone(),
                cluster: Arc::new(MockBackend::ok()),
            },
        );
        Fixture {
            orchestrator,
            container,
        }
    }

    fn shape() -> ServiceShape {
        let mut shape = ServiceShape::new(ServiceId::new("svc"), "svc:1");
        shape.declared_vars = vec![DeclaredVar::required("PORT")];
        shape
    }

    fn target_id() -> TargetId {
        "worker-1.container.prod".parse().unwrap()
    }

    #[tokio::test]
    async fn test_deploy_happy_path() {
        let f = fixture_with(shape(), json!({"PORT": 8080}));

        let record = f
            .orchestrator
            .deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();

        assert_eq!(record.status, DeploymentStatus::Running);
        assert_eq!(record.backend_metadata["container_id"], json!("abc123"));
        assert_eq!(f.container.deploy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_required_never_reaches_backend() {
        let f = fixture_with(shape(), json!({}));

        let err = f
            .orchestrator
            .deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::MissingRequiredValue { .. }));
        assert_eq!(f.container.deploy_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_lands_record_in_failed() {
        let f = fixture_with_backend(
            shape(),
            json!({"PORT": 8080}),
            Arc::new(MockBackend::failing(|| {
                DeployError::BackendTimeout("agent deploy: timed out".into())
            })),
        );

        let record = f
            .orchestrator
            .prepare_deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();
        let err = f.orchestrator.execute_deploy(&record.id).await.unwrap_err();
        assert!(matches!(err, DeployError::BackendTimeout(_)));

        let stored = f.orchestrator.get(&record.id).await.unwrap();
        assert!(matches!(stored.status, DeploymentStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_partial_apply_metadata_is_preserved() {
        let f = fixture_with_backend(
            shape(),
            json!({"PORT": 8080}),
            Arc::new(MockBackend::failing(|| DeployError::PartialApply {
                detail: "Deployment 'bosun-svc' (step 2): admission denied".into(),
                applied_steps: vec![1],
                metadata: json!({ "applied_steps": [1], "artifacts": [
                    { "step": 1, "kind": "ConfigMap", "name": "bosun-svc-config" }
                ]}),
            })),
        );

        let record = f
            .orchestrator
            .prepare_deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();
        f.orchestrator.execute_deploy(&record.id).await.unwrap_err();

        let stored = f.orchestrator.get(&record.id).await.unwrap();
        assert_eq!(stored.backend_metadata["applied_steps"], json!([1]));
        assert!(matches!(stored.status, DeploymentStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_stop_requires_running() {
        let f = fixture_with(shape(), json!({"PORT": 8080}));

        let record = f
            .orchestrator
            .prepare_deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();

        // Pending deployment cannot be stopped.
        let err = f.orchestrator.stop(&record.id).await.unwrap_err();
        assert!(matches!(err, DeployError::InvalidTransition(_)));

        f.orchestrator.execute_deploy(&record.id).await.unwrap();
        let stopped = f.orchestrator.stop(&record.id).await.unwrap();
        assert_eq!(stopped.status, DeploymentStatus::Stopped);
    }

    #[tokio::test]
    async fn test_remove_lifecycle() {
        let f = fixture_with(shape(), json!({"PORT": 8080}));

        let record = f
            .orchestrator
            .deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();

        // Running deployments cannot be removed.
        assert!(matches!(
            f.orchestrator.remove(&record.id).await,
            Err(DeployError::InvalidTransition(_))
        ));

        f.orchestrator.stop(&record.id).await.unwrap();
        let removed = f.orchestrator.remove(&record.id).await.unwrap();
        assert_eq!(removed.status, DeploymentStatus::Removed);

        // Soft state: the record survives removal.
        let stored = f.orchestrator.get(&record.id).await.unwrap();
        assert_eq!(stored.status, DeploymentStatus::Removed);
    }

    #[tokio::test]
    async fn test_failed_deploy_is_not_retried_in_place() {
        let f = fixture_with_backend(
            shape(),
            json!({"PORT": 8080}),
            Arc::new(MockBackend::failing(|| {
                DeployError::BackendUnreachable("connection refused".into())
            })),
        );

        let record = f
            .orchestrator
            .prepare_deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();
        f.orchestrator.execute_deploy(&record.id).await.unwrap_err();

        // A second execute on the failed record is rejected: retry is a
        // fresh deploy under a new id.
        assert!(matches!(
            f.orchestrator.execute_deploy(&record.id).await,
            Err(DeployError::InvalidTransition(_))
        ));
        assert_eq!(f.container.deploy_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let f = fixture_with(shape(), json!({"PORT": 8080}));
        let ghost: TargetId = "ghost.container.prod".parse().unwrap();

        assert!(matches!(
            f.orchestrator
                .deploy(&ServiceId::new("svc"), &ghost, None)
                .await,
            Err(DeployError::UnknownTarget(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_service() {
        let f = fixture_with(shape(), json!({"PORT": 8080}));

        f.orchestrator
            .deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();
        f.orchestrator
            .deploy(&ServiceId::new("svc"), &target_id(), None)
            .await
            .unwrap();

        let records = f
            .orchestrator
            .list_by_service(&ServiceId::new("svc"))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
    }
}
