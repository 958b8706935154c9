use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use super::ListStore;
use crate::error::StoreError;

/// Redis-backed list store.
///
/// Appends use `RPUSH`, which Redis applies atomically, so concurrent
/// writers each get a distinct position without client-side coordination.
/// `clear_all` deletes `namespace:*` when a namespace is set and falls back to
/// `FLUSHDB` otherwise.
#[derive(Clone)]
pub struct RedisListStore {
    connection: ConnectionManager,
    namespace: Option<String>,
}

impl RedisListStore {
    /// Connect to Redis at `url`. Keys are prefixed with `namespace:` when a
    /// namespace is given.
    pub async fn connect(url: &str, namespace: Option<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await.map_err(|e| {
            warn!("Failed to connect to Redis at {}: {}", url, e);
            StoreError::Unavailable(e.to_string())
        })?;

        info!(namespace = namespace.as_deref().unwrap_or(""), "Connected to Redis");
        Ok(Self {
            connection,
            namespace,
        })
    }

    fn key(&self, key: &str) -> String {
        namespaced_key(self.namespace.as_deref(), key)
    }
}

fn active_namespace(namespace: Option<&str>) -> Option<&str> {
    namespace.filter(|ns| !ns.is_empty())
}

fn namespaced_key(namespace: Option<&str>, key: &str) -> String {
    match active_namespace(namespace) {
        Some(ns) => format!("{}:{}", ns, key),
        None => key.to_string(),
    }
}

/// `SCAN MATCH` pattern for every key under `namespace`, with glob
/// metacharacters in the namespace escaped
fn namespace_pattern(namespace: &str) -> String {
    let mut pattern = String::with_capacity(namespace.len() + 2);
    for c in namespace.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(":*");
    pattern
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn push(&self, key: &str, value: Vec<u8>) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        let len: usize = conn.rpush(self.key(key), value).await?;
        Ok(len)
    }

    async fn range(&self, key: &str, low: usize, high: usize) -> Result<Vec<Vec<u8>>, StoreError> {
        if low > high {
            return Ok(Vec::new());
        }

        let mut conn = self.connection.clone();
        let values: Vec<Vec<u8>> = conn
            .lrange(self.key(key), low as isize, high as isize)
            .await?;

        debug!(key, low, high, fetched = values.len(), "LRANGE");
        Ok(values)
    }

    async fn len(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        let len: usize = conn.llen(self.key(key)).await?;
        Ok(len)
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();

        let Some(ns) = active_namespace(self.namespace.as_deref()) else {
            redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
            return Ok(());
        };

        let pattern = namespace_pattern(ns);
        let mut keys: Vec<String> = Vec::new();
        {
            let mut scan_conn = self.connection.clone();
            let mut iter = scan_conn.scan_match::<_, String>(&pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if !keys.is_empty() {
            conn.del::<_, ()>(&keys).await?;
        }
        debug!(namespace = ns, removed = keys.len(), "Cleared namespaced keys");
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}
