use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use tscache_core::{CacheKey, QueryContext, Raw, Subrequest};
use tscache_plugin::{CacheFetch, CachePlugin, CacheWrite, PluginError};

/// Recorded arguments of one `cache(...)` call.
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub key: CacheKey,
    pub value: Raw,
    pub ttl: Duration,
}

/// Scriptable cache plugin.
///
/// Fetches stay pending until the test resolves them through
/// [`resolve_fetch`](MockPlugin::resolve_fetch); cancellations and writes
/// are observable through counters and recorded calls.
#[derive(Default)]
pub struct MockPlugin {
    fetch_count: AtomicUsize,
    pending: Mutex<Vec<oneshot::Sender<Result<Option<Raw>, PluginError>>>>,
    tokens: Mutex<Vec<CancellationToken>>,
    writes: Mutex<Vec<RecordedWrite>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MockPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Resolves the oldest still-pending fetch with `outcome`. Returns
    /// whether anyone was listening; a `false` means the fetch was already
    /// cancelled and its callback dropped.
    pub fn resolve_fetch(&self, outcome: Result<Option<Raw>, PluginError>) -> bool {
        let sender = {
            let mut pending = self.pending.lock();
            assert!(!pending.is_empty(), "no pending fetch to resolve");
            pending.remove(0)
        };
        sender.send(outcome).is_ok()
    }

    /// Whether any issued fetch observed a cancel.
    pub fn fetch_cancelled(&self) -> bool {
        self.tokens.lock().iter().any(|token| token.is_cancelled())
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    /// Makes subsequent `cache(...)` calls report a write failure.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

impl CachePlugin for MockPlugin {
    fn fetch(&self, _ctx: &QueryContext, _key: &CacheKey) -> CacheFetch {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = oneshot::channel();
        let fetch = Subrequest::new(
            async move { receiver.await.unwrap_or(Ok(None)) },
            CancellationToken::new(),
        );
        self.pending.lock().push(sender);
        self.tokens.lock().push(fetch.cancel_token());
        fetch
    }

    fn cache(&self, key: &CacheKey, value: Raw, ttl: Duration) -> CacheWrite {
        self.writes.lock().push(RecordedWrite {
            key: key.clone(),
            value,
            ttl,
        });
        let outcome = if self.fail_writes.load(Ordering::SeqCst) {
            Err(PluginError::internal(std::io::Error::other("write refused")))
        } else {
            Ok(())
        };
        Subrequest::ready(outcome)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
