//! Token store: the validity ledger for issued tokens.
//!
//! Presence of a key means the token is currently valid; absence means it was
//! never issued, has expired, or was revoked. Entries are created and deleted,
//! never updated in place.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Token store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Key-existence store used as a revocation ledger.
///
/// Implementations must be safe for concurrent use. `delete` is idempotent:
/// deleting an absent key succeeds, and concurrent deleters all succeed.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// `Ok(())` if `key` is present, `KeyNotFound` otherwise.
    async fn get(&self, key: &str) -> Result<(), StoreError>;

    /// Record `key` for `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically remove `key`, failing with `KeyNotFound` if it was absent.
    ///
    /// Of several concurrent callers for the same key, at most one succeeds.
    async fn take(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<(), StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        (**self).put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn take(&self, key: &str) -> Result<(), StoreError> {
        (**self).take(key).await
    }
}

/// SHA-256 fingerprint of a signed token, stored instead of the bearer string.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process token store. Expired entries read as absent and are evicted
/// lazily, or in bulk by [`MemoryTokenStore::purge_expired`].
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, Entry>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value recorded under a live `key`.
    pub fn stored_value(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone())
    }

    /// Evict expired entries.
    pub fn purge_expired(&self) {
        self.entries.retain(|_, entry| entry.is_live());
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                store.purge_expired();
            }
        })
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<(), StoreError> {
        let live = match self.entries.get(key) {
            Some(entry) => entry.is_live(),
            None => return Err(StoreError::KeyNotFound),
        };
        if live {
            Ok(())
        } else {
            // The read guard is released above; evicting here cannot deadlock.
            self.entries.remove_if(key, |_, entry| !entry.is_live());
            Err(StoreError::KeyNotFound)
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<(), StoreError> {
        match self.entries.remove(key) {
            Some((_, entry)) if entry.is_live() => Ok(()),
            _ => Err(StoreError::KeyNotFound),
        }
    }
}

// =============================================================================
// Redis store
// =============================================================================

/// Key prefix for token entries in Redis.
const REDIS_KEY_PREFIX: &str = "gtd:token:";

/// Redis-backed token store, shared by every auth service instance.
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("connected to redis token store");
        Ok(Self::new(conn))
    }

    fn key(key: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn get(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(Self::key(key))
            .query_async(&mut conn)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::KeyNotFound)
        }
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(Self::key(key))
            .arg(value)
            .arg("EX")
            .arg(secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::key(key))
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(Self::key(key))
            .query_async(&mut conn)
            .await?;
        if removed > 0 {
            Ok(())
        } else {
            Err(StoreError::KeyNotFound)
        }
    }
}
