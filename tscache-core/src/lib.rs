#![warn(missing_docs)]
//! # tscache-core
//!
//! Core traits and types for the tscache caching query executor.
//!
//! This crate provides the foundational abstractions shared by the executor
//! crate (`tscache`) and by collaborator implementations:
//!
//! - **Identify** cached entries ([`CacheKey`], [`KeyGenerator`])
//! - **Describe** queries and results ([`TimeSeriesQuery`], [`QueryResult`])
//! - **Encode** results for storage ([`Serdes`])
//! - **Track** in-flight collaborator operations ([`Subrequest`])
//!
//! Collaborator contracts here are deliberately narrow: the executor core
//! coordinates them but never stores data or parses queries itself.

pub mod context;
pub mod key;
pub mod query;
pub mod result;
pub mod serdes;
pub mod subrequest;

pub use context::QueryContext;
pub use key::{CacheKey, DefaultKeyGenerator, KeyGenerator};
pub use query::{Metric, TimeSeriesQuery, Timespan};
pub use result::{DataPoint, QueryResult, TimeSeries};
pub use serdes::{JsonSerdes, Serdes, SerdesError};
pub use subrequest::Subrequest;

/// Raw byte data type used for serialized cache values.
/// Using `Bytes` provides cheap cloning via reference counting.
pub type Raw = bytes::Bytes;
