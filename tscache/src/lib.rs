#![warn(missing_docs)]
//! # tscache
//!
//! A caching middle node for time-series query execution graphs.
//!
//! [`CachingExecutor`] sits between an upstream caller and a downstream
//! [`QueryExecutor`], transparently answering queries from a pluggable cache
//! and populating it with freshly computed results. Two scheduling policies
//! are supported:
//!
//! - **Sequential** (default): the cache is consulted first, and the
//!   downstream query only starts on a miss.
//! - **Simultaneous**: the cache fetch and the downstream query race; the
//!   first terminal outcome wins and the loser is cancelled.
//!
//! Cancellation flows both ways: callers can cancel a single
//! [`Execution`](execution::Execution), and closing the executor cancels
//! every outstanding one. Cache failures are never fatal — the downstream is
//! still consulted and the failure is logged.

/// Immutable per-node cache policy: expiration, scheduling mode, identity.
pub mod config;

/// Error types for caching query execution.
pub mod error;

/// Per-request execution state machine.
pub mod execution;

/// The executor factory, its lifecycle, and the downstream contract.
pub mod executor;

/// Execution-graph wiring: nodes and the component registry.
pub mod graph;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use execution::Execution;
pub use executor::{CachingExecutor, QueryExecution, QueryExecutor, QueryOutcome};
pub use graph::{ComponentRegistry, ExecutionGraphNode};

pub use tscache_core::{
    CacheKey, DataPoint, DefaultKeyGenerator, JsonSerdes, KeyGenerator, Metric, QueryContext,
    QueryResult, Raw, Serdes, SerdesError, Subrequest, TimeSeries, TimeSeriesQuery, Timespan,
};
pub use tscache_plugin::{CacheFetch, CachePlugin, CacheWrite, PluginError};

/// The `tscache` prelude.
///
/// ```rust
/// use tscache::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{CacheConfig, CacheError, CachePlugin, CachingExecutor, QueryExecutor};
}
