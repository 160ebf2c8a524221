//! The caching query executor: factory and lifecycle for [`Execution`]s.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use tscache_core::{
    DefaultKeyGenerator, KeyGenerator, QueryContext, QueryResult, Serdes, Subrequest,
    TimeSeriesQuery,
};
use tscache_plugin::CachePlugin;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::execution::{Execution, ExecutionShared};
use crate::graph::{ComponentRegistry, ExecutionGraphNode};

/// Outcome of one query execution.
pub type QueryOutcome = Result<QueryResult, CacheError>;

/// Cancellable handle to a query in flight at some graph node.
pub type QueryExecution = Subrequest<QueryOutcome>;

/// A node of the query execution graph.
///
/// This is the contract the caching executor consumes downstream and also
/// offers upstream, so caching nodes stack: the downstream of one
/// [`CachingExecutor`] may itself be another.
pub trait QueryExecutor: Send + Sync {
    /// Begins executing `query`, returning a handle immediately.
    ///
    /// `config` optionally overrides the node's default configuration for
    /// this one request; middle nodes always pass `None`.
    fn execute_query(
        &self,
        ctx: Arc<QueryContext>,
        query: &TimeSeriesQuery,
        config: Option<Arc<CacheConfig>>,
    ) -> QueryExecution;

    /// Identifier of this executor within the graph.
    fn id(&self) -> &str;
}

pub(crate) struct ExecutorInner {
    pub(crate) config: Arc<CacheConfig>,
    pub(crate) plugin: Arc<dyn CachePlugin>,
    pub(crate) serdes: Arc<dyn Serdes>,
    pub(crate) key_generator: Arc<dyn KeyGenerator>,
    pub(crate) downstream: Arc<dyn QueryExecutor>,
    next_id: AtomicU64,
    state: Mutex<ExecutorState>,
}

struct ExecutorState {
    closed: bool,
    outstanding: HashMap<u64, Arc<ExecutionShared>>,
}

impl ExecutorInner {
    pub(crate) fn next_execution_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn remove_execution(&self, id: u64) {
        if self.state.lock().outstanding.remove(&id).is_some() {
            debug!(id, "execution left the outstanding set");
        }
    }
}

/// A query executor that transparently caches downstream results.
///
/// Every request issues a cache fetch; in sequential mode the downstream
/// query waits for a miss, in simultaneous mode both race and the loser is
/// cancelled. Freshly computed results are written back to the plugin when
/// the configured expiration allows. Requires a Tokio runtime: subrequest
/// callbacks run on spawned tasks.
#[derive(Clone)]
pub struct CachingExecutor {
    inner: Arc<ExecutorInner>,
}

impl CachingExecutor {
    /// Builds an executor from its graph node, resolving the cache plugin,
    /// serdes and key generator through `registry`.
    ///
    /// Fails with [`CacheError::InvalidArgument`] when the node has no
    /// default config or downstream, or when the plugin or serdes lookup
    /// yields nothing. A missing key generator falls back to
    /// [`DefaultKeyGenerator`].
    pub fn from_node(
        node: &ExecutionGraphNode,
        registry: &ComponentRegistry,
    ) -> Result<Self, CacheError> {
        let config = node.default_config().ok_or_else(|| {
            CacheError::InvalidArgument(format!("node {} has no default config", node.id()))
        })?;
        let downstream = node.downstream().ok_or_else(|| {
            CacheError::InvalidArgument(format!("node {} has no downstream executor", node.id()))
        })?;
        let plugin = registry.plugin(node.plugin_id()).ok_or_else(|| {
            CacheError::InvalidArgument(format!(
                "no cache plugin registered as {:?}",
                node.plugin_id()
            ))
        })?;
        let serdes = registry.serdes(node.serdes_id()).ok_or_else(|| {
            CacheError::InvalidArgument(format!("no serdes registered as {:?}", node.serdes_id()))
        })?;
        let key_generator = registry
            .key_generator(node.key_generator_id())
            .unwrap_or_else(|| Arc::new(DefaultKeyGenerator));
        Ok(Self {
            inner: Arc::new(ExecutorInner {
                config,
                plugin,
                serdes,
                key_generator,
                downstream,
                next_id: AtomicU64::new(0),
                state: Mutex::new(ExecutorState {
                    closed: false,
                    outstanding: HashMap::new(),
                }),
            }),
        })
    }

    /// Begins a caching execution of `query`.
    ///
    /// Returns synchronously with the execution's future still pending; the
    /// cache fetch (and, in simultaneous mode, the downstream query) is
    /// already in flight. Rejects with [`CacheError::Cancelled`] once the
    /// executor is closed.
    pub fn execute_query(
        &self,
        ctx: Arc<QueryContext>,
        query: &TimeSeriesQuery,
    ) -> Result<Execution, CacheError> {
        if self.inner.state.lock().closed {
            return Err(CacheError::Cancelled);
        }
        let key = self.inner.key_generator.generate(&ctx, query);
        let (execution, shared) = Execution::new(&self.inner, ctx, query.clone(), key);
        {
            let mut state = self.inner.state.lock();
            // Re-check: close may have raced the key generation.
            if state.closed {
                return Err(CacheError::Cancelled);
            }
            state.outstanding.insert(shared.id(), Arc::clone(&shared));
        }
        debug!(
            id = shared.id(),
            key = %shared.key(),
            simultaneous = self.inner.config.simultaneous(),
            "starting caching execution"
        );
        shared.start_cache_fetch();
        if self.inner.config.simultaneous() {
            shared.start_downstream();
        }
        Ok(execution)
    }

    /// Closes the executor: no new executions are accepted and every
    /// outstanding one completes with [`CacheError::Cancelled`]. Resolves
    /// once all of them have. Idempotent.
    pub async fn close(&self) {
        let outstanding: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.outstanding.values().cloned().collect()
        };
        debug!(
            executor = self.id(),
            count = outstanding.len(),
            "closing caching executor"
        );
        // Cancel outside the executor lock; each cancel re-enters it to
        // drop the execution from the outstanding set.
        for execution in outstanding {
            execution.cancel();
        }
    }

    /// The cache plugin this executor fetches from and populates.
    pub fn plugin(&self) -> Arc<dyn CachePlugin> {
        Arc::clone(&self.inner.plugin)
    }

    /// The serdes encoding results in and out of the cache.
    pub fn serdes(&self) -> Arc<dyn Serdes> {
        Arc::clone(&self.inner.serdes)
    }

    /// The key generator identifying cached entries.
    pub fn key_generator(&self) -> Arc<dyn KeyGenerator> {
        Arc::clone(&self.inner.key_generator)
    }

    /// The downstream executors of this node; always a single element.
    pub fn downstream_executors(&self) -> Vec<Arc<dyn QueryExecutor>> {
        vec![Arc::clone(&self.inner.downstream)]
    }

    /// Ids of executions that have started but not yet completed.
    pub fn outstanding_requests(&self) -> Vec<u64> {
        self.inner.state.lock().outstanding.keys().copied().collect()
    }
}

impl QueryExecutor for CachingExecutor {
    fn execute_query(
        &self,
        ctx: Arc<QueryContext>,
        query: &TimeSeriesQuery,
        _config: Option<Arc<CacheConfig>>,
    ) -> QueryExecution {
        match CachingExecutor::execute_query(self, ctx, query) {
            Ok(execution) => execution.into_subrequest(),
            Err(error) => Subrequest::ready(Err(error)),
        }
    }

    fn id(&self) -> &str {
        self.inner.config.executor_id()
    }
}
