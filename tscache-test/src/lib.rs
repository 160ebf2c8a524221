//! Test utilities for the tscache caching executor: scriptable mock
//! collaborators with observation counters, and a wiring harness.

mod harness;
mod mock_executor;
mod mock_plugin;
mod serdes;

pub use harness::{Harness, eventually, sample_query, sample_result, sequential_config, settle};
pub use mock_executor::MockExecutor;
pub use mock_plugin::{MockPlugin, RecordedWrite};
pub use serdes::FailingSerdes;

/// Installs a fmt subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
