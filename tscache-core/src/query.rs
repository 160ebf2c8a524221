//! Minimal time-series query model.
//!
//! Queries identify the time range and the metrics a caller wants. The
//! executor core never interprets them beyond key generation and TTL
//! derivation; parsing and planning live elsewhere in the graph.

use serde::{Deserialize, Serialize};

/// Time bounds of a query, in epoch milliseconds.
///
/// An absent `end` means "up to now": the query covers data up to the moment
/// it executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timespan {
    start: i64,
    #[serde(default)]
    end: Option<i64>,
}

impl Timespan {
    /// A span starting at `start` and extending to "now".
    pub fn since(start: i64) -> Self {
        Self { start, end: None }
    }

    /// Pins the end of the span.
    pub fn with_end(mut self, end: i64) -> Self {
        self.end = Some(end);
        self
    }

    /// Start of the span.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// End of the span, if pinned.
    pub fn end(&self) -> Option<i64> {
        self.end
    }

    /// End of the covered data, resolving an open span to `now`.
    pub fn effective_end(&self, now: i64) -> i64 {
        self.end.unwrap_or(now)
    }
}

/// A single metric selected by a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metric {
    metric: String,
}

impl Metric {
    /// A selector for the named metric.
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
        }
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.metric
    }
}

/// A query routed through the execution graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSeriesQuery {
    time: Timespan,
    #[serde(default)]
    metrics: Vec<Metric>,
}

impl TimeSeriesQuery {
    /// A query over the given time span with no metrics selected yet.
    pub fn new(time: Timespan) -> Self {
        Self {
            time,
            metrics: Vec::new(),
        }
    }

    /// Adds a metric selector.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// The query's time bounds.
    pub fn time(&self) -> &Timespan {
        &self.time
    }

    /// The selected metrics.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }
}
