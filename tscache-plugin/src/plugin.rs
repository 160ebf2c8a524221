//! The asynchronous cache plugin contract.

use std::sync::Arc;
use std::time::Duration;

use tscache_core::{CacheKey, QueryContext, Raw, Subrequest};

use crate::PluginError;

/// Handle to one cache lookup. `Ok(None)` signals a miss.
pub type CacheFetch = Subrequest<Result<Option<Raw>, PluginError>>;

/// Handle to one cache population.
pub type CacheWrite = Subrequest<Result<(), PluginError>>;

/// An asynchronous cache store of opaque byte blobs.
///
/// Both operations return promptly with a [`Subrequest`] handle; the actual
/// work proceeds in the background and is individually cancellable through
/// the handle. Implementations must tolerate cancels arriving after their
/// own completion.
pub trait CachePlugin: Send + Sync {
    /// Begins a lookup for `key`.
    fn fetch(&self, ctx: &QueryContext, key: &CacheKey) -> CacheFetch;

    /// Begins writing `value` under `key` with the given time-to-live.
    ///
    /// Write failures are reported through the returned handle; callers log
    /// them and move on, they never affect an already-answered query.
    fn cache(&self, key: &CacheKey, value: Raw, ttl: Duration) -> CacheWrite;

    /// Name used in logs and registries.
    fn name(&self) -> &str {
        "plugin"
    }
}

impl CachePlugin for Arc<dyn CachePlugin> {
    fn fetch(&self, ctx: &QueryContext, key: &CacheKey) -> CacheFetch {
        (**self).fetch(ctx, key)
    }

    fn cache(&self, key: &CacheKey, value: Raw, ttl: Duration) -> CacheWrite {
        (**self).cache(key, value, ttl)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
