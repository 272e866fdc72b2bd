//! Key-value store seam and the in-process implementation
//!
//! The adaptive cache only needs `get / set / delete_matching / ping` from
//! its backing store. `InMemoryStore` provides them with TTL expiry and LRU
//! eviction so a single process can run without a network cache.

use crate::cache::{
    config::MemoryStoreConfig,
    entry::CacheEntry,
    types::{CacheKey, CacheValue},
};
use crate::error::{MemoryError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Backing key-value store used by the adaptive cache
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Write a value that expires after `ttl_seconds`
    async fn set(&self, key: &str, value: CacheValue, ttl_seconds: u64) -> Result<()>;

    /// Delete every key matching a `*` glob, returning how many were removed
    async fn delete_matching(&self, pattern: &str) -> Result<usize>;

    /// Liveness check
    async fn ping(&self) -> Result<()>;

    /// Number of live entries
    async fn len(&self) -> Result<usize>;
}

/// Compile a `*` glob into an anchored regex
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| MemoryError::Other(format!("invalid glob '{}': {}", pattern, e)))
}

/// Counters kept by the in-process store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub size_bytes: usize,
    pub evictions_size: u64,
    pub evictions_ttl: u64,
}

/// In-process key-value store with TTL expiry and LRU eviction
pub struct InMemoryStore {
    config: MemoryStoreConfig,
    inner: Arc<RwLock<StoreInner>>,
    offline: AtomicBool,
}

struct StoreInner {
    entries: HashMap<CacheKey, CacheEntry>,
    lru_queue: VecDeque<CacheKey>,
    current_size_bytes: usize,
    stats: StoreStats,
}

impl StoreInner {
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru_queue.retain(|k| k != key);
        self.current_size_bytes = self
            .current_size_bytes
            .saturating_sub(entry.calculate_size());
        Some(entry)
    }

    fn touch(&mut self, key: &str) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.to_string());
    }
}

impl InMemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        info!("Initializing in-memory cache store with config: {:?}", config);

        Self {
            config,
            inner: Arc::new(RwLock::new(StoreInner {
                entries: HashMap::new(),
                lru_queue: VecDeque::new(),
                current_size_bytes: 0,
                stats: StoreStats::default(),
            })),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate losing (or regaining) the store; every call fails while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        warn!("In-memory store offline={}", offline);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(MemoryError::ConnectionError(
                "in-memory store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;

        let expired: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove_entry(key);
        }
        inner.stats.evictions_ttl += expired.len() as u64;

        if !expired.is_empty() {
            debug!("Cleaned up {} expired entries", expired.len());
        }
        expired.len()
    }

    /// Store counters
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            entries: inner.entries.len(),
            size_bytes: inner.current_size_bytes,
            ..inner.stats.clone()
        }
    }

    /// Read an entry with its metadata, without touching LRU order
    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        let inner = self.inner.read().await;
        inner.entries.get(key).filter(|e| !e.is_expired()).cloned()
    }

    fn evict_if_needed(&self, inner: &mut StoreInner, needed_size: usize) -> Result<()> {
        while inner.entries.len() >= self.config.max_entries {
            match inner.lru_queue.pop_front() {
                Some(key) => {
                    debug!("Evicting entry due to max_entries limit: {}", key);
                    inner.remove_entry(&key);
                    inner.stats.evictions_size += 1;
                }
                None => break,
            }
        }

        while inner.current_size_bytes + needed_size > self.config.max_size_bytes {
            match inner.lru_queue.pop_front() {
                Some(key) => {
                    debug!("Evicting entry due to size limit: {}", key);
                    inner.remove_entry(&key);
                    inner.stats.evictions_size += 1;
                }
                None => {
                    warn!("Cannot evict more entries, cache size limit exceeded");
                    return Err(MemoryError::Other("Cache size limit exceeded".to_string()));
                }
            }
        }

        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.check_online()?;
        let mut inner = self.inner.write().await;

        let expired = match inner.entries.get_mut(key) {
            None => return Ok(None),
            Some(entry) if entry.is_expired() => true,
            Some(entry) => {
                entry.mark_accessed();
                false
            }
        };

        if expired {
            debug!("Cache entry expired: {}", key);
            inner.remove_entry(key);
            inner.stats.evictions_ttl += 1;
            return Ok(None);
        }

        inner.touch(key);
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: CacheValue, ttl_seconds: u64) -> Result<()> {
        self.check_online()?;
        let entry = CacheEntry::new(key.to_string(), value, ttl_seconds);
        let size = entry.calculate_size();

        let mut inner = self.inner.write().await;
        inner.remove_entry(key);
        self.evict_if_needed(&mut inner, size)?;

        inner.entries.insert(key.to_string(), entry);
        inner.lru_queue.push_back(key.to_string());
        inner.current_size_bytes += size;

        debug!("Stored cache entry: {} (ttl {}s)", key, ttl_seconds);
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize> {
        self.check_online()?;
        let matcher = glob_to_regex(pattern)?;
        let mut inner = self.inner.write().await;

        let keys: Vec<CacheKey> = inner
            .entries
            .keys()
            .filter(|k| matcher.is_match(k))
            .cloned()
            .collect();

        for key in &keys {
            inner.remove_entry(key);
        }

        info!("Deleted {} entries matching {}", keys.len(), pattern);
        Ok(keys.len())
    }

    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn len(&self) -> Result<usize> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner.entries.values().filter(|e| !e.is_expired()).count())
    }
}

/// Background task sweeping expired entries until cancelled
pub fn start_auto_cleanup(store: Arc<InMemoryStore>, cancel: CancellationToken) -> JoinHandle<()> {
    let interval = store.config.cleanup_interval;
    info!("Starting automatic cache cleanup task (interval: {:?})", interval);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Cache cleanup task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.cleanup_expired().await;
                    if removed > 0 {
                        debug!("Auto cleanup removed {} entries", removed);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_store(max_entries: usize) -> InMemoryStore {
        InMemoryStore::new(MemoryStoreConfig {
            max_entries,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_basic_set_and_get() {
        let store = InMemoryStore::default();
        store.set("key1", "value1".to_string(), 60).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = InMemoryStore::default();
        store.set("key1", "value1".to_string(), 1).await.unwrap();
        assert!(store.get("key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(store.get("key1").await.unwrap().is_none());
        assert_eq!(store.stats().await.evictions_ttl, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let store = small_store(3);
        store.set("key1", "v".to_string(), 60).await.unwrap();
        store.set("key2", "v".to_string(), 60).await.unwrap();
        store.set("key3", "v".to_string(), 60).await.unwrap();

        // key1 becomes most recently used
        store.get("key1").await.unwrap();
        store.set("key4", "v".to_string(), 60).await.unwrap();

        assert!(store.get("key2").await.unwrap().is_none());
        assert!(store.get("key1").await.unwrap().is_some());
        assert!(store.get("key4").await.unwrap().is_some());
        assert!(store.stats().await.evictions_size > 0);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let store = InMemoryStore::default();
        store.set("key", "a".to_string(), 60).await.unwrap();
        store.set("key", "b".to_string(), 60).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.get("key").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_delete_matching() {
        let store = InMemoryStore::default();
        store.set("memory:search:alice:1", "x".to_string(), 60).await.unwrap();
        store.set("memory:search:alice:2", "x".to_string(), 60).await.unwrap();
        store.set("memory:search:bob:1", "x".to_string(), 60).await.unwrap();

        let removed = store.delete_matching("memory:search:alice:*").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = InMemoryStore::default();
        store.set_offline(true);

        assert!(store.ping().await.is_err());
        assert!(store.get("k").await.is_err());
        assert!(store.set("k", "v".to_string(), 60).await.is_err());

        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = InMemoryStore::default();
        store.set("a", "v".to_string(), 0).await.unwrap();
        store.set("b", "v".to_string(), 60).await.unwrap();

        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.stats().await.entries, 1);
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("memory:search:*").unwrap();
        assert!(re.is_match("memory:search:alice:42"));
        assert!(!re.is_match("other:memory:search:x"));

        let literal = glob_to_regex("a.b").unwrap();
        assert!(literal.is_match("a.b"));
        assert!(!literal.is_match("axb"));
    }

    #[tokio::test]
    async fn test_auto_cleanup_sweeps_and_stops() {
        let store = Arc::new(InMemoryStore::new(MemoryStoreConfig {
            cleanup_interval: Duration::from_millis(100),
            ..Default::default()
        }));
        store.set("short", "v".to_string(), 1).await.unwrap();
        store.set("long", "v".to_string(), 3600).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = start_auto_cleanup(store.clone(), cancel.clone());

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert_eq!(store.stats().await.evictions_ttl, 1);
        assert!(store.entry("long").await.is_some());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cleanup task stops on cancel")
            .unwrap();
    }
}
