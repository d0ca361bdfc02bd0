//! Expiring key/value cache.
//!
//! The agent provider only talks to [`ExpiringCache`]; the in-process
//! [`MemoryCache`] is the default backing. Expiry is stored per entry and
//! checked on read; every write also sweeps out whatever has expired, so
//! keys that are never read again do not pile up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

/// Cache with a per-entry TTL.
#[async_trait]
pub trait ExpiringCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Return the value if present and not expired.
    async fn get(&self, key: &str) -> Option<V>;

    /// Insert or replace a value that expires after `ttl`.
    async fn set(&self, key: &str, value: V, ttl: Duration);

    /// Drop the entry for `key`, if any.
    async fn evict(&self, key: &str);
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-process cache backed by a `DashMap`.
///
/// There is no cross-request locking: two concurrent misses on the same key
/// may both compute and insert a value, and the later insert wins.
pub struct MemoryCache<V> {
    entries: Arc<DashMap<String, Entry<V>>>,
}

impl<V> MemoryCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[async_trait]
impl<V> ExpiringCache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let hit = {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                Some(entry.value.clone())
            } else {
                None
            }
        }; // Release DashMap shard lock before removal

        if hit.is_none() {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        hit
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    async fn evict(&self, key: &str) {
        self.entries.remove(key);
    }
}
