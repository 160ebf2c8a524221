//! Per-request execution state machine.
//!
//! One [`Execution`] coordinates up to two collaborator subrequests — the
//! cache fetch and the downstream query — and completes a single-use future
//! with whichever outcome wins. All transitions are serialized under one
//! mutex; once an execution is terminal, late callbacks from a losing
//! subrequest are discarded.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, warn};

use tscache_core::{CacheKey, QueryContext, QueryResult, Raw, Serdes, Subrequest, TimeSeriesQuery};
use tscache_plugin::{CachePlugin, PluginError};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::executor::{ExecutorInner, QueryExecution, QueryExecutor, QueryOutcome};

/// Handle to one in-flight caching query request.
///
/// Returned synchronously by
/// [`CachingExecutor::execute_query`](crate::CachingExecutor::execute_query);
/// awaiting it yields the decoded result, the downstream error, or a
/// cancellation error. Dropping the handle does not cancel the request —
/// call [`cancel`](Execution::cancel) for that.
pub struct Execution {
    shared: Arc<ExecutionShared>,
    outcome: oneshot::Receiver<QueryOutcome>,
}

impl Execution {
    pub(crate) fn new(
        executor: &Arc<ExecutorInner>,
        ctx: Arc<QueryContext>,
        query: TimeSeriesQuery,
        key: CacheKey,
    ) -> (Self, Arc<ExecutionShared>) {
        let (sender, receiver) = oneshot::channel();
        let shared = Arc::new(ExecutionShared {
            id: executor.next_execution_id(),
            key,
            ctx,
            query,
            config: Arc::clone(&executor.config),
            plugin: Arc::clone(&executor.plugin),
            serdes: Arc::clone(&executor.serdes),
            downstream: Arc::clone(&executor.downstream),
            executor: Arc::downgrade(executor),
            state: Mutex::new(ExecutionState {
                completed: false,
                outcome: Some(sender),
                cache_sub: None,
                downstream_sub: None,
            }),
        });
        (
            Self {
                shared: Arc::clone(&shared),
                outcome: receiver,
            },
            shared,
        )
    }

    /// Identifier of this execution within its executor.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// The cache key this execution looked up.
    pub fn key(&self) -> &CacheKey {
        &self.shared.key
    }

    /// Cancels the execution: every live subrequest is cancelled and the
    /// future completes with [`CacheError::Cancelled`]. Idempotent; a no-op
    /// once the execution is terminal.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Wraps this execution into the graph-level [`QueryExecution`] handle,
    /// mapping the handle's cancel onto [`cancel`](Execution::cancel).
    pub fn into_subrequest(self) -> QueryExecution {
        let token = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let watch = token.clone();
        let future = async move {
            tokio::select! {
                _ = watch.cancelled() => {
                    shared.cancel();
                    Err(CacheError::Cancelled)
                }
                outcome = self => outcome,
            }
        };
        Subrequest::new(future, token)
    }
}

impl Future for Execution {
    type Output = QueryOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            // The sender only disappears without an outcome when the runtime
            // tore the executor down mid-flight.
            Err(_) => Err(CacheError::Cancelled),
        })
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.shared.id)
            .field("key", &self.shared.key)
            .field("completed", &self.shared.state.lock().completed)
            .finish()
    }
}

/// State shared between the caller-held [`Execution`], the executor's
/// outstanding set, and the subrequest callback tasks.
pub(crate) struct ExecutionShared {
    id: u64,
    key: CacheKey,
    ctx: Arc<QueryContext>,
    query: TimeSeriesQuery,
    config: Arc<CacheConfig>,
    plugin: Arc<dyn CachePlugin>,
    serdes: Arc<dyn Serdes>,
    downstream: Arc<dyn QueryExecutor>,
    executor: Weak<ExecutorInner>,
    state: Mutex<ExecutionState>,
}

struct ExecutionState {
    completed: bool,
    outcome: Option<oneshot::Sender<QueryOutcome>>,
    cache_sub: Option<CancellationToken>,
    downstream_sub: Option<CancellationToken>,
}

impl ExecutionShared {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Issues the cache fetch and spawns the task racing its outcome against
    /// cancellation.
    pub(crate) fn start_cache_fetch(self: &Arc<Self>) {
        let fetch = self.plugin.fetch(&self.ctx, &self.key);
        let (future, token) = fetch.into_parts();
        {
            let mut state = self.state.lock();
            if state.completed {
                drop(state);
                token.cancel();
                return;
            }
            state.cache_sub = Some(token.clone());
        }
        let shared = Arc::clone(self);
        let span = debug_span!("cache_fetch", id = self.id, key = %self.key);
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    outcome = future => shared.cache_resolved(outcome),
                }
            }
            .instrument(span),
        );
    }

    /// Issues the downstream query and spawns its callback task. In
    /// sequential mode this only happens once the cache has missed.
    pub(crate) fn start_downstream(self: &Arc<Self>) {
        let sub = self
            .downstream
            .execute_query(Arc::clone(&self.ctx), &self.query, None);
        let (future, token) = sub.into_parts();
        {
            let mut state = self.state.lock();
            if state.completed {
                drop(state);
                token.cancel();
                return;
            }
            state.downstream_sub = Some(token.clone());
        }
        let shared = Arc::clone(self);
        let span = debug_span!("downstream_query", id = self.id, key = %self.key);
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    outcome = future => shared.downstream_resolved(outcome),
                }
            }
            .instrument(span),
        );
    }

    fn cache_resolved(self: &Arc<Self>, outcome: Result<Option<Raw>, PluginError>) {
        let payload = {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.cache_sub = None;
            match outcome {
                Ok(Some(payload)) => Some(payload),
                Ok(None) => {
                    debug!(id = self.id, key = %self.key, "cache miss");
                    None
                }
                Err(error) => {
                    warn!(id = self.id, key = %self.key, %error, "cache fetch failed, falling back to downstream");
                    None
                }
            }
        };
        if let Some(payload) = payload {
            match self.serdes.deserialize(&payload) {
                Ok(result) => {
                    debug!(id = self.id, key = %self.key, "cache hit");
                    self.complete_from_cache(result);
                    return;
                }
                Err(error) => {
                    warn!(id = self.id, key = %self.key, %error, "cached payload failed to decode, treating as miss");
                }
            }
        }
        if !self.config.simultaneous() {
            self.start_downstream();
        }
    }

    /// Terminal transition for a decodable cache hit: the downstream, if
    /// racing, is cancelled and no population happens.
    fn complete_from_cache(&self, result: QueryResult) {
        let (sender, downstream_sub) = {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            (state.outcome.take(), state.downstream_sub.take())
        };
        if let Some(token) = downstream_sub {
            token.cancel();
        }
        if let Some(sender) = sender {
            let _ = sender.send(Ok(result));
        }
        self.finish();
    }

    /// Terminal transition for a downstream outcome: a racing cache fetch is
    /// cancelled, successes populate the cache, errors surface verbatim.
    fn downstream_resolved(self: &Arc<Self>, outcome: QueryOutcome) {
        let (sender, cache_sub) = {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            state.downstream_sub = None;
            (state.outcome.take(), state.cache_sub.take())
        };
        if let Some(token) = cache_sub {
            token.cancel();
        }
        match outcome {
            Ok(result) => {
                debug!(id = self.id, key = %self.key, "downstream query succeeded");
                let populate = self.populate_payload(&result);
                if let Some(sender) = sender {
                    let _ = sender.send(Ok(result));
                }
                // Population is submitted strictly after completion.
                if let Some((payload, ttl)) = populate {
                    self.submit_populate(payload, ttl);
                }
            }
            Err(error) => {
                debug!(id = self.id, key = %self.key, %error, "downstream query failed");
                if let Some(sender) = sender {
                    let _ = sender.send(Err(error));
                }
            }
        }
        self.finish();
    }

    /// Serialized payload and TTL for populating `result`, or `None` when
    /// population is disabled, the TTL collapses to zero, or serialization
    /// fails (the failure is logged and swallowed).
    fn populate_payload(&self, result: &QueryResult) -> Option<(Raw, Duration)> {
        let ttl = self.config.expiration_for(&self.query)?;
        match self.serdes.serialize(result) {
            Ok(payload) => Some((payload, ttl)),
            Err(error) => {
                warn!(id = self.id, key = %self.key, %error, "failed to serialize result for cache population");
                None
            }
        }
    }

    fn submit_populate(&self, payload: Raw, ttl: Duration) {
        debug!(id = self.id, key = %self.key, ttl = ?ttl, "populating cache");
        let write = self.plugin.cache(&self.key, payload, ttl);
        let key = self.key.clone();
        tokio::spawn(async move {
            if let Err(error) = write.await {
                warn!(key = %key, %error, "cache population failed");
            }
        });
    }

    /// Terminal transition for a cancel, from the caller or executor close.
    pub(crate) fn cancel(&self) {
        let (sender, live) = {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            let live: Vec<_> = state
                .cache_sub
                .take()
                .into_iter()
                .chain(state.downstream_sub.take())
                .collect();
            (state.outcome.take(), live)
        };
        for token in live {
            token.cancel();
        }
        if let Some(sender) = sender {
            let _ = sender.send(Err(CacheError::Cancelled));
        }
        debug!(id = self.id, key = %self.key, "execution cancelled");
        self.finish();
    }

    /// Drops the execution from the executor's outstanding set. Runs with no
    /// execution lock held: the lock order is executor before execution,
    /// never the reverse.
    fn finish(&self) {
        if let Some(executor) = self.executor.upgrade() {
            executor.remove_execution(self.id);
        }
    }
}
