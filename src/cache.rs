//! Cache capability spawned lazily per request.
//!
//! The context asks its [`CacheFactory`] for a client the first time
//! `cache()` is called and reuses that client afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::time::Instant;

use crate::core::{RequestContext, Result};

/// Maximum number of cached entries.
const MEMORY_CACHE_CAPACITY: usize = 1024;

/// Key/value cache used by handlers.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;
}

/// Produces a cache client for a request.
pub trait CacheFactory: Send + Sync {
    fn spawn(&self, ctx: &RequestContext) -> Arc<dyn CacheClient>;
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory TTL cache with LRU eviction.
pub struct MemoryCache {
    /// key -> entry
    entries: RwLock<HashMap<Box<str>, Entry>>,
    /// LRU order: most recently used at back
    order: RwLock<Vec<Box<str>>>,
    capacity: usize,
}

impl MemoryCache {
    /// Create a new empty cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(MEMORY_CACHE_CAPACITY)
    }

    /// Create a new empty cache with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity.min(MEMORY_CACHE_CAPACITY))),
            order: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let hit = {
            let entries = self.entries.read();
            entries
                .get(key)
                .map(|entry| (entry.is_expired(now), entry.value.clone()))
        };

        match hit {
            Some((false, value)) => {
                self.touch(key);
                Some(value)
            }
            Some((true, _)) => {
                self.remove_expired(key, now);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut entries = self.entries.write();
        let mut order = self.order.write();

        let entry = Entry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };

        if entries.contains_key(key) {
            entries.insert(key.into(), entry);
            if let Some(pos) = order.iter().position(|k| k.as_ref() == key) {
                let k = order.remove(pos);
                order.push(k);
            }
            return;
        }

        // Evict oldest if at capacity
        if order.len() >= self.capacity && !order.is_empty() {
            let oldest = order.remove(0);
            entries.remove(&oldest);
        }

        let key: Box<str> = key.into();
        entries.insert(key.clone(), entry);
        order.push(key);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        let mut order = self.order.write();
        entries.remove(key);
        order.retain(|k| k.as_ref() != key);
    }

    /// Remove `key` only if it is still expired; a concurrent `set` wins.
    fn remove_expired(&self, key: &str, now: Instant) {
        let mut entries = self.entries.write();
        if !entries.get(key).is_some_and(|e| e.is_expired(now)) {
            return;
        }
        let mut order = self.order.write();
        entries.remove(key);
        order.retain(|k| k.as_ref() != key);
    }

    /// Move key to end of LRU order.
    fn touch(&self, key: &str) {
        let mut order = self.order.write();
        if let Some(pos) = order.iter().position(|k| k.as_ref() == key) {
            let k = order.remove(pos);
            order.push(k);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }
}

/// Factory handing every request the same shared [`MemoryCache`].
#[derive(Clone, Default)]
pub struct MemoryCacheFactory {
    store: Arc<MemoryCache>,
}

impl MemoryCacheFactory {
    pub fn new(store: Arc<MemoryCache>) -> Self {
        Self { store }
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<MemoryCache> {
        &self.store
    }
}

impl CacheFactory for MemoryCacheFactory {
    fn spawn(&self, _ctx: &RequestContext) -> Arc<dyn CacheClient> {
        self.store.clone()
    }
}
