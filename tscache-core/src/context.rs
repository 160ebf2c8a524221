//! Per-request query context.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one caller-visible query session.
///
/// A context is threaded, by reference, through every collaborator call made
/// on behalf of the same request: key generation, cache fetches and the
/// downstream query. Collaborators may use it to correlate work; the executor
/// core only passes it along.
#[derive(Debug)]
pub struct QueryContext {
    id: u64,
}

impl QueryContext {
    /// Creates a context with a fresh process-wide identity.
    pub fn new() -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The context identity.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}
