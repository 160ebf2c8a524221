//! Error types for caching query execution.

use thiserror::Error;
use tscache_core::SerdesError;
use tscache_plugin::PluginError;

/// Error type for caching query executor operations.
///
/// Only [`Downstream`](CacheError::Downstream) and
/// [`Cancelled`](CacheError::Cancelled) reach a caller's future; plugin and
/// serdes failures are logged and absorbed, and
/// [`InvalidArgument`](CacheError::InvalidArgument) can only surface at
/// construction time.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Construction-time validation failure.
    #[error("invalid executor configuration: {0}")]
    InvalidArgument(String),

    /// A cache plugin operation failed. Non-fatal: the downstream executor
    /// is still consulted.
    #[error("cache plugin operation failed: {0}")]
    Plugin(#[from] PluginError),

    /// The downstream executor failed. Fatal to the execution, surfaced
    /// verbatim.
    #[error("downstream query failed: {0}")]
    Downstream(String),

    /// The execution was cancelled, either directly or by executor shutdown.
    #[error("query execution was cancelled")]
    Cancelled,

    /// Result (de)serialization failed.
    #[error("result serialization failed: {0}")]
    Serdes(#[from] SerdesError),
}
