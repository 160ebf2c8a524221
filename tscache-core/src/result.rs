//! Materialized query results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One timestamped value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// The measured value.
    pub value: f64,
}

impl DataPoint {
    /// A point at `timestamp` (epoch milliseconds) with the given value.
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One series of points for a metric + tag combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    metric: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    #[serde(default)]
    points: Vec<DataPoint>,
}

impl TimeSeries {
    /// An empty series for the named metric.
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            tags: BTreeMap::new(),
            points: Vec::new(),
        }
    }

    /// Adds a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Appends a point.
    pub fn with_point(mut self, point: DataPoint) -> Self {
        self.points.push(point);
        self
    }

    /// The metric name.
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// The series tags.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// The series points, in insertion order.
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }
}

/// The result object produced by a query executor.
///
/// This is the value that flows back to callers and, serialized, in and out
/// of the cache plugin. Round-tripping through a [`Serdes`](crate::Serdes)
/// preserves equality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    series: Vec<TimeSeries>,
}

impl QueryResult {
    /// A result with no series.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends a series.
    pub fn with_series(mut self, series: TimeSeries) -> Self {
        self.series.push(series);
        self
    }

    /// The contained series.
    pub fn series(&self) -> &[TimeSeries] {
        &self.series
    }

    /// Whether the result carries no series at all.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
