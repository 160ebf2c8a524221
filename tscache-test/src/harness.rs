use std::sync::Arc;
use std::time::Duration;

use tscache::{
    CacheConfig, CachingExecutor, ComponentRegistry, DataPoint, ExecutionGraphNode, JsonSerdes,
    Metric, QueryResult, Serdes, TimeSeries, TimeSeriesQuery, Timespan,
};

use crate::{MockExecutor, MockPlugin};

/// A caching executor wired to scriptable collaborators.
pub struct Harness {
    pub plugin: Arc<MockPlugin>,
    pub downstream: Arc<MockExecutor>,
    pub executor: CachingExecutor,
}

impl Harness {
    /// Wires a [`CachingExecutor`] with mock plugin and downstream and a
    /// JSON serdes.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_serdes(config, Arc::new(JsonSerdes))
    }

    /// Same as [`new`](Harness::new) with a caller-chosen serdes.
    pub fn with_serdes(config: CacheConfig, serdes: Arc<dyn Serdes>) -> Self {
        crate::init_tracing();
        let plugin = Arc::new(MockPlugin::new());
        let downstream = Arc::new(MockExecutor::new("downstream"));
        let registry = ComponentRegistry::new();
        registry.register_plugin("default", plugin.clone());
        registry.register_serdes("default", serdes);
        let node = ExecutionGraphNode::new("cache")
            .with_default_config(config)
            .with_downstream(downstream.clone());
        let executor =
            CachingExecutor::from_node(&node, &registry).expect("harness wiring is complete");
        Self {
            plugin,
            downstream,
            executor,
        }
    }
}

/// The config most scenarios run under.
pub fn sequential_config() -> CacheConfig {
    CacheConfig::builder()
        .expiration(60_000)
        .max_expiration(120_000)
        .executor_id("LocalCache")
        .executor_type("CachingQueryExecutor")
        .build()
}

/// A one-hour query over one metric.
pub fn sample_query() -> TimeSeriesQuery {
    TimeSeriesQuery::new(Timespan::since(0).with_end(3_600_000))
        .with_metric(Metric::new("system.cpu.user"))
}

/// A small non-empty result.
pub fn sample_result() -> QueryResult {
    QueryResult::empty().with_series(
        TimeSeries::new("system.cpu.user")
            .with_tag("host", "web01")
            .with_point(DataPoint::new(1_000, 0.25)),
    )
}

/// Polls `condition`, yielding between checks, until it holds or two
/// seconds pass.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition was not reached in time");
}

/// Lets already-runnable tasks drain, for asserting that something did NOT
/// happen.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
