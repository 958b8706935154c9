use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::ListStore;
use crate::error::StoreError;

/// In-memory list store for testing and development
#[derive(Clone, Default)]
pub struct InMemoryListStore {
    lists: Arc<RwLock<HashMap<String, Vec<Vec<u8>>>>>,
}

impl InMemoryListStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<usize, StoreError> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(key.to_string()).or_default();
        list.push(value);

        debug!(key, len = list.len(), "Pushed list entry");
        Ok(list.len())
    }

    async fn range(&self, key: &str, low: usize, high: usize) -> Result<Vec<Vec<u8>>, StoreError> {
        let lists = self.lists.read().await;
        let Some(list) = lists.get(key) else {
            return Ok(Vec::new());
        };

        if low >= list.len() || low > high {
            return Ok(Vec::new());
        }
        let end = high.min(list.len() - 1);

        Ok(list[low..=end].to_vec())
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let lists = self.lists.read().await;
        Ok(lists.get(key).map(Vec::len).unwrap_or(0))
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.lists.write().await.clear();
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
