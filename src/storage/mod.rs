//! Storage backends for scraped items
//!
//! The engine batches items by the configured batch size and hands each
//! batch to a [`Storage`] implementation, flushing once more on shutdown.
//! Write failures are logged by the engine and never halt the crawl.

mod json;

pub use json::{JsonLinesStorage, JsonStorage};

use crate::pipeline::Item;
use thiserror::Error;

/// Storage-layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The storage contract
pub trait Storage: Send {
    /// Persists a batch of items
    fn store(&mut self, items: &[Item]) -> Result<(), StorageError>;

    /// Flushes pending writes and releases resources
    fn close(&mut self) -> Result<(), StorageError>;

    /// Backend identifier, used in logs
    fn name(&self) -> &str;
}

/// A storage backend that discards everything, for dry runs and tests
#[derive(Debug, Default)]
pub struct NullStorage {
    pub stored: usize,
}

impl Storage for NullStorage {
    fn store(&mut self, items: &[Item]) -> Result<(), StorageError> {
        self.stored += items.len();
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_storage_counts() {
        let mut storage = NullStorage::default();
        let items = vec![Item::new("http://example.com/a"), Item::new("http://example.com/b")];
        storage.store(&items).unwrap();
        storage.close().unwrap();
        assert_eq!(storage.stored, 2);
        assert_eq!(storage.name(), "null");
    }
}
