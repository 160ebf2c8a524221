//! Cache key types and key generation.
//!
//! Keys are opaque bytes: the executor core never inspects them, and plugins
//! are free to store them however their backing store prefers. [`CacheKey`]
//! wraps [`Raw`](crate::Raw) so cloning a key only bumps a reference count.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::{QueryContext, Raw, TimeSeriesQuery};

/// An opaque byte key identifying a cached entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: Raw,
}

impl CacheKey {
    /// Wraps raw bytes as a key.
    pub fn new(bytes: impl Into<Raw>) -> Self {
        Self {
            inner: bytes.into(),
        }
    }

    /// The key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl AsRef<[u8]> for CacheKey {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl fmt::Display for CacheKey {
    /// Abbreviated hex form for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.inner.iter().take(8) {
            write!(f, "{byte:02x}")?;
        }
        if self.inner.len() > 8 {
            write!(f, "..")?;
        }
        Ok(())
    }
}

/// Produces cache key bytes from a query and its context.
///
/// Implementations must be deterministic for a given (query,
/// context-identity) pair, otherwise lookups will never see earlier
/// populations.
pub trait KeyGenerator: Send + Sync {
    /// Generates the key identifying `query`'s cached result.
    fn generate(&self, ctx: &QueryContext, query: &TimeSeriesQuery) -> CacheKey;

    /// Name used in logs and registries.
    fn name(&self) -> &str {
        "key_generator"
    }
}

/// Default key generator: Sha256 over a canonical byte form of the query.
///
/// The context does not participate, so identical queries share cache entries
/// across sessions. Session-scoped implementations can mix in
/// [`QueryContext::id`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyGenerator;

impl KeyGenerator for DefaultKeyGenerator {
    fn generate(&self, _ctx: &QueryContext, query: &TimeSeriesQuery) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(query.time().start().to_be_bytes());
        match query.time().end() {
            Some(end) => hasher.update(end.to_be_bytes()),
            // Distinguish an open span from one pinned at zero.
            None => hasher.update([0xffu8; 8]),
        }
        for metric in query.metrics() {
            hasher.update(metric.name().as_bytes());
            hasher.update([0u8]);
        }
        CacheKey::new(hasher.finalize().to_vec())
    }

    fn name(&self) -> &str {
        "default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Metric, Timespan};

    fn query() -> TimeSeriesQuery {
        TimeSeriesQuery::new(Timespan::since(0).with_end(3_600_000))
            .with_metric(Metric::new("system.cpu.user"))
    }

    #[test]
    fn identical_queries_share_a_key() {
        let generator = DefaultKeyGenerator;
        let first = generator.generate(&QueryContext::new(), &query());
        let second = generator.generate(&QueryContext::new(), &query());
        assert_eq!(first, second);
    }

    #[test]
    fn different_metrics_diverge() {
        let generator = DefaultKeyGenerator;
        let ctx = QueryContext::new();
        let other = TimeSeriesQuery::new(Timespan::since(0).with_end(3_600_000))
            .with_metric(Metric::new("system.cpu.idle"));
        assert_ne!(generator.generate(&ctx, &query()), generator.generate(&ctx, &other));
    }

    #[test]
    fn open_span_differs_from_zero_end() {
        let generator = DefaultKeyGenerator;
        let ctx = QueryContext::new();
        let open = TimeSeriesQuery::new(Timespan::since(0));
        let pinned = TimeSeriesQuery::new(Timespan::since(0).with_end(0));
        assert_ne!(generator.generate(&ctx, &open), generator.generate(&ctx, &pinned));
    }
}
