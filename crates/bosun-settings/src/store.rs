//! Value store: named configuration documents as nested key/value trees
//!
//! Each resolution layer maps to one logical document or document section.
//! The store knows nothing about layers or precedence — it only navigates
//! trees by dot path and exposes a bulk section read so `resolve_all` can
//! avoid per-variable round trips against remote backends.

use crate::error::StoreError;
use async_trait::async_trait;
use bosun_types::SettingPath;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Well-known document names used by the resolver's layers
pub mod documents {
    /// Application-wide defaults; keyed directly by setting path
    pub const DEFAULTS: &str = "defaults";
    /// Snapshot of the daemon's process environment, flat keys
    pub const PROCESS_ENV: &str = "process_env";
    /// Per-environment overrides; section key = target environment
    pub const DEPLOY_ENV: &str = "deploy_env";
    /// Per-instance user overrides; section key = instance config id
    pub const INSTANCES: &str = "instances";
    /// Published provider outputs; `<provider>.<capability>.<output>`
    pub const OUTPUTS: &str = "outputs";
    /// Secret material; same tree shape as defaults
    pub const SECRETS: &str = "secrets";
}

/// Keyed document collection holding nested key/value trees
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Read one node by dot path. `None` when the document or path is
    /// absent — absence is not an error.
    async fn get(&self, document: &str, path: &SettingPath) -> StoreResult<Option<Value>>;

    /// Bulk read: all scalar leaves under `prefix`, keyed by their dot
    /// path relative to the prefix. An empty prefix reads the whole
    /// document.
    async fn read_section(
        &self,
        document: &str,
        prefix: &str,
    ) -> StoreResult<BTreeMap<String, Value>>;

    /// Write one node, creating intermediate maps as needed
    async fn put(&self, document: &str, path: &SettingPath, value: Value) -> StoreResult<()>;

    /// Remove one node; returns whether anything was removed
    async fn remove(&self, document: &str, path: &SettingPath) -> StoreResult<bool>;
}

/// In-memory value store
///
/// Suitable for tests, development and single-daemon setups. Documents are
/// `serde_json::Value` trees; YAML documents load through
/// [`MemoryValueStore::load_yaml`].
#[derive(Default)]
pub struct MemoryValueStore {
    documents: DashMap<String, Value>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Parse a YAML document and install it under `name`, replacing any
    /// previous content.
    pub fn load_yaml(&self, name: &str, source: &str) -> StoreResult<()> {
        let tree: Value =
            serde_yaml::from_str(source).map_err(|e| StoreError::Parse(e.to_string()))?;
        self.documents.insert(name.to_string(), tree);
        Ok(())
    }

    /// Install an already-built tree under `name`
    pub fn insert_document(&self, name: &str, tree: Value) {
        self.documents.insert(name.to_string(), tree);
    }
}

fn navigate<'a>(tree: &'a Value, segments: impl Iterator<Item = &'a str>) -> Option<&'a Value> {
    let mut node = tree;
    for segment in segments {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

fn flatten_into(node: &Value, prefix: &str, out: &mut BTreeMap<String, Value>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, &path, out);
            }
        }
        Value::Null | Value::Array(_) => {}
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}

#[async_trait]
impl ValueStore for MemoryValueStore {
    async fn get(&self, document: &str, path: &SettingPath) -> StoreResult<Option<Value>> {
        Ok(self
            .documents
            .get(document)
            .and_then(|tree| navigate(&tree, path.segments()).cloned()))
    }

    async fn read_section(
        &self,
        document: &str,
        prefix: &str,
    ) -> StoreResult<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        if let Some(tree) = self.documents.get(document) {
            let node = if prefix.is_empty() {
                Some(&*tree)
            } else {
                navigate(&tree, prefix.split('.'))
            };
            if let Some(node) = node {
                flatten_into(node, "", &mut out);
            }
        }
        Ok(out)
    }

    async fn put(&self, document: &str, path: &SettingPath, value: Value) -> StoreResult<()> {
        let mut entry = self
            .documents
            .entry(document.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));

        let mut node = entry.value_mut();
        let segments: Vec<&str> = path.segments().collect();
        for (i, segment) in segments.iter().enumerate() {
            if !node.is_object() {
                *node = Value::Object(serde_json::Map::new());
            }
            let map = node.as_object_mut().expect("object ensured above");
            if i == segments.len() - 1 {
                map.insert(segment.to_string(), value);
                return Ok(());
            }
            node = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
        }
        Ok(())
    }

    async fn remove(&self, document: &str, path: &SettingPath) -> StoreResult<bool> {
        let Some(mut tree) = self.documents.get_mut(document) else {
            return Ok(false);
        };
        let segments: Vec<&str> = path.segments().collect();
        let mut node = tree.value_mut();
        for segment in &segments[..segments.len() - 1] {
            match node.as_object_mut().and_then(|m| m.get_mut(*segment)) {
                Some(child) => node = child,
                None => return Ok(false),
            }
        }
        let last = segments[segments.len() - 1];
        Ok(node
            .as_object_mut()
            .map(|m| m.remove(last).is_some())
            .unwrap_or(false))
    }
}
