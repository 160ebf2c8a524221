//! Error types for cache plugin operations.

use thiserror::Error;

/// Error type for cache plugin operations.
///
/// Categorizes failures into local and network classes so operators can tell
/// a sick store from a sick link. Either way the executor treats the failure
/// as a miss.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Internal plugin error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with a remote store.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),
}

impl PluginError {
    /// Wraps an error as an internal plugin failure.
    pub fn internal(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Box::new(error))
    }

    /// Wraps an error as a connection failure.
    pub fn connection(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection(Box::new(error))
    }
}
