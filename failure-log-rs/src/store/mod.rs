// failure-log-rs/src/store/mod.rs
//
// List store abstraction for the failure log
// Provides:
// - Atomic append to the tail of a named list
// - Inclusive range reads and length
// - In-memory and Redis implementations
//
// Values are opaque bytes; encoding and decoding happen in the failure log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::StoreError;

pub mod memory;
pub mod redis_store;

pub use self::memory::InMemoryListStore;
pub use self::redis_store::RedisListStore;

/// Ordered, append-only list storage keyed by name
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append `value` to the tail of the list at `key` and return the new
    /// length. Concurrent pushes are serialized by the store.
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<usize, StoreError>;

    /// Entries `low..=high` of the list, clipped to its current length.
    async fn range(&self, key: &str, low: usize, high: usize) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Number of entries in the list; zero if it does not exist
    async fn len(&self, key: &str) -> Result<usize, StoreError>;

    /// Remove every list this store holds. A namespaced store only removes
    /// keys under its own namespace.
    async fn clear_all(&self) -> Result<(), StoreError>;

    /// Check if the backend is reachable
    async fn is_healthy(&self) -> bool;
}

/// Create a list store from configuration
pub async fn create_list_store(config: &StoreConfig) -> Result<Arc<dyn ListStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => {
            info!("Using in-memory list store");
            Ok(Arc::new(InMemoryListStore::new()))
        }
        "redis" => {
            info!(url = %config.redis_url, "Using Redis list store");
            let store = RedisListStore::connect(&config.redis_url, config.namespace.clone()).await?;
            Ok(Arc::new(store))
        }
        other => Err(StoreError::UnknownBackend(other.to_string())),
    }
}
