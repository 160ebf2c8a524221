//! Execution-graph wiring: nodes and the component registry.
//!
//! Only the slice of graph machinery the executor constructor validates
//! lives here; full graph assembly and configuration parsing belong to the
//! surrounding system.

use std::sync::Arc;

use dashmap::DashMap;

use tscache_core::{KeyGenerator, Serdes};
use tscache_plugin::CachePlugin;

use crate::config::CacheConfig;
use crate::executor::QueryExecutor;

/// Registry name used for collaborators a node does not name explicitly.
pub const DEFAULT_COMPONENT: &str = "default";

/// One node of the query execution graph: an id, an optional default
/// [`CacheConfig`], the downstream executor reference, and the registry
/// names of the node's pluggable collaborators.
#[derive(Clone)]
pub struct ExecutionGraphNode {
    id: String,
    default_config: Option<Arc<CacheConfig>>,
    downstream: Option<Arc<dyn QueryExecutor>>,
    plugin_id: String,
    serdes_id: String,
    key_generator_id: String,
}

impl ExecutionGraphNode {
    /// A bare node with the given id and default collaborator names.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_config: None,
            downstream: None,
            plugin_id: DEFAULT_COMPONENT.to_owned(),
            serdes_id: DEFAULT_COMPONENT.to_owned(),
            key_generator_id: DEFAULT_COMPONENT.to_owned(),
        }
    }

    /// Sets the node's default configuration.
    pub fn with_default_config(mut self, config: CacheConfig) -> Self {
        self.default_config = Some(Arc::new(config));
        self
    }

    /// Sets the node's downstream executor.
    pub fn with_downstream(mut self, downstream: Arc<dyn QueryExecutor>) -> Self {
        self.downstream = Some(downstream);
        self
    }

    /// Names the cache plugin to resolve from the registry.
    pub fn with_plugin_id(mut self, plugin_id: impl Into<String>) -> Self {
        self.plugin_id = plugin_id.into();
        self
    }

    /// Names the serdes to resolve from the registry.
    pub fn with_serdes_id(mut self, serdes_id: impl Into<String>) -> Self {
        self.serdes_id = serdes_id.into();
        self
    }

    /// Names the key generator to resolve from the registry.
    pub fn with_key_generator_id(mut self, key_generator_id: impl Into<String>) -> Self {
        self.key_generator_id = key_generator_id.into();
        self
    }

    /// The node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The node's default configuration, if any.
    pub fn default_config(&self) -> Option<Arc<CacheConfig>> {
        self.default_config.clone()
    }

    /// The node's downstream executor, if wired.
    pub fn downstream(&self) -> Option<Arc<dyn QueryExecutor>> {
        self.downstream.clone()
    }

    /// Registry name of the cache plugin.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Registry name of the serdes.
    pub fn serdes_id(&self) -> &str {
        &self.serdes_id
    }

    /// Registry name of the key generator.
    pub fn key_generator_id(&self) -> &str {
        &self.key_generator_id
    }
}

/// Registry resolving pluggable collaborators by name.
#[derive(Default)]
pub struct ComponentRegistry {
    plugins: DashMap<String, Arc<dyn CachePlugin>>,
    serdes: DashMap<String, Arc<dyn Serdes>>,
    key_generators: DashMap<String, Arc<dyn KeyGenerator>>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cache plugin under `name`, replacing any previous one.
    pub fn register_plugin(&self, name: impl Into<String>, plugin: Arc<dyn CachePlugin>) {
        self.plugins.insert(name.into(), plugin);
    }

    /// Looks up a cache plugin.
    pub fn plugin(&self, name: &str) -> Option<Arc<dyn CachePlugin>> {
        self.plugins.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers a serdes under `name`, replacing any previous one.
    pub fn register_serdes(&self, name: impl Into<String>, serdes: Arc<dyn Serdes>) {
        self.serdes.insert(name.into(), serdes);
    }

    /// Looks up a serdes.
    pub fn serdes(&self, name: &str) -> Option<Arc<dyn Serdes>> {
        self.serdes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Registers a key generator under `name`, replacing any previous one.
    pub fn register_key_generator(
        &self,
        name: impl Into<String>,
        key_generator: Arc<dyn KeyGenerator>,
    ) {
        self.key_generators.insert(name.into(), key_generator);
    }

    /// Looks up a key generator.
    pub fn key_generator(&self, name: &str) -> Option<Arc<dyn KeyGenerator>> {
        self.key_generators
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }
}
