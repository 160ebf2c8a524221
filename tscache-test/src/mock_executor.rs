use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use tscache::{CacheConfig, QueryContext, QueryExecution, QueryExecutor, QueryOutcome, Subrequest};
use tscache_core::TimeSeriesQuery;

/// Scriptable downstream executor.
///
/// Calls stay pending until the test responds through
/// [`respond`](MockExecutor::respond); call counts, cancellation and
/// override configs are observable.
pub struct MockExecutor {
    id: String,
    call_count: AtomicUsize,
    pending: Mutex<Vec<oneshot::Sender<QueryOutcome>>>,
    tokens: Mutex<Vec<CancellationToken>>,
    override_configs: Mutex<Vec<Option<Arc<CacheConfig>>>>,
}

impl MockExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_count: AtomicUsize::new(0),
            pending: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
            override_configs: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Responds to the oldest still-pending call. Returns whether anyone was
    /// listening.
    pub fn respond(&self, outcome: QueryOutcome) -> bool {
        let sender = {
            let mut pending = self.pending.lock();
            assert!(!pending.is_empty(), "no pending downstream call to respond to");
            pending.remove(0)
        };
        sender.send(outcome).is_ok()
    }

    /// Whether any issued call observed a cancel.
    pub fn cancelled(&self) -> bool {
        self.tokens.lock().iter().any(|token| token.is_cancelled())
    }

    /// Override configs seen so far, in call order.
    pub fn override_configs(&self) -> Vec<Option<Arc<CacheConfig>>> {
        self.override_configs.lock().clone()
    }
}

impl QueryExecutor for MockExecutor {
    fn execute_query(
        &self,
        _ctx: Arc<QueryContext>,
        _query: &TimeSeriesQuery,
        config: Option<Arc<CacheConfig>>,
    ) -> QueryExecution {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.override_configs.lock().push(config);
        let (sender, receiver) = oneshot::channel();
        let execution = Subrequest::new(
            async move {
                receiver
                    .await
                    .unwrap_or(Err(tscache::CacheError::Cancelled))
            },
            CancellationToken::new(),
        );
        self.pending.lock().push(sender);
        self.tokens.lock().push(execution.cancel_token());
        execution
    }

    fn id(&self) -> &str {
        &self.id
    }
}
