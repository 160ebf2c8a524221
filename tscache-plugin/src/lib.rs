#![warn(missing_docs)]
//! # tscache-plugin
//!
//! The cache plugin contract consumed by the tscache caching query executor.
//!
//! A plugin is an external, asynchronous store of opaque byte blobs keyed by
//! opaque byte keys. The executor core issues fetches and populations against
//! this contract and never assumes anything about the backing store, its
//! eviction policy or its transport. Plugin failures are non-fatal: the
//! executor logs them and falls through to its downstream.

mod error;
mod plugin;

pub use error::PluginError;
pub use plugin::{CacheFetch, CachePlugin, CacheWrite};
