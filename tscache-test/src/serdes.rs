use std::sync::atomic::{AtomicBool, Ordering};

use tscache_core::{JsonSerdes, QueryResult, Raw, Serdes, SerdesError};

/// JSON serdes that can be told to fail either direction, for
/// decode-fallback and populate-swallow tests.
#[derive(Default)]
pub struct FailingSerdes {
    inner: JsonSerdes,
    fail_serialize: AtomicBool,
    fail_deserialize: AtomicBool,
}

impl FailingSerdes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_serialize(&self) {
        self.fail_serialize.store(true, Ordering::SeqCst);
    }

    pub fn fail_deserialize(&self) {
        self.fail_deserialize.store(true, Ordering::SeqCst);
    }
}

impl Serdes for FailingSerdes {
    fn serialize(&self, result: &QueryResult) -> Result<Raw, SerdesError> {
        if self.fail_serialize.load(Ordering::SeqCst) {
            return Err(SerdesError::Serialize(Box::new(std::io::Error::other(
                "serialize refused",
            ))));
        }
        self.inner.serialize(result)
    }

    fn deserialize(&self, data: &[u8]) -> Result<QueryResult, SerdesError> {
        if self.fail_deserialize.load(Ordering::SeqCst) {
            return Err(SerdesError::Deserialize(Box::new(std::io::Error::other(
                "deserialize refused",
            ))));
        }
        self.inner.deserialize(data)
    }

    fn name(&self) -> &str {
        "failing-json"
    }
}
