//! Result serialization contracts.

use thiserror::Error;

use crate::{QueryResult, Raw};

/// Error type for result (de)serialization.
#[derive(Debug, Error)]
pub enum SerdesError {
    /// Failed to serialize a result into its stored form.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    /// Failed to deserialize a stored payload back into a result.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Encodes query results to and from the byte form handed to the cache
/// plugin.
///
/// Implementations must be deterministic; a round trip preserves semantic
/// equality of the result.
pub trait Serdes: Send + Sync {
    /// Serializes `result` into its stored form.
    fn serialize(&self, result: &QueryResult) -> Result<Raw, SerdesError>;

    /// Deserializes a stored payload.
    fn deserialize(&self, data: &[u8]) -> Result<QueryResult, SerdesError>;

    /// Name used in logs and registries.
    fn name(&self) -> &str {
        "serdes"
    }
}

/// JSON serdes backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerdes;

impl Serdes for JsonSerdes {
    fn serialize(&self, result: &QueryResult) -> Result<Raw, SerdesError> {
        serde_json::to_vec(result)
            .map(Raw::from)
            .map_err(|e| SerdesError::Serialize(Box::new(e)))
    }

    fn deserialize(&self, data: &[u8]) -> Result<QueryResult, SerdesError> {
        serde_json::from_slice(data).map_err(|e| SerdesError::Deserialize(Box::new(e)))
    }

    fn name(&self) -> &str {
        "json"
    }
}
