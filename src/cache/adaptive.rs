//! Adaptive cache facade
//!
//! Wraps a [`KeyValueStore`] with pattern tracking, TTL optimization, call
//! deadlines and an explicit connection state. Store failures never escape:
//! reads degrade to misses, writes report `false`, and both are counted in
//! the error metric.

use crate::cache::{
    config::CacheConfig,
    pattern::PatternTracker,
    store::KeyValueStore,
    ttl::TtlOptimizer,
    types::{CacheState, CacheValue, PatternSnapshot},
};
use crate::error::{MemoryError, Result};
use crate::metrics::MetricsCollector;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Connection {
    state: CacheState,
    consecutive_failures: u32,
}

/// Learning cache in front of a key-value store
pub struct AdaptiveCache {
    config: CacheConfig,
    store: Arc<dyn KeyValueStore>,
    tracker: Arc<PatternTracker>,
    optimizer: TtlOptimizer,
    metrics: Arc<MetricsCollector>,
    connection: Mutex<Connection>,
}

impl AdaptiveCache {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn KeyValueStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let tracker = Arc::new(PatternTracker::new(config.max_users_per_pattern));
        let optimizer = TtlOptimizer::new(config.clone(), tracker.clone());

        Self {
            config,
            store,
            tracker,
            optimizer,
            metrics,
            connection: Mutex::new(Connection {
                state: CacheState::Connected,
                consecutive_failures: 0,
            }),
        }
    }

    /// Ping the store and set the state from the result
    pub async fn connect(&self) -> CacheState {
        match self.call("ping", self.store.ping()).await {
            Ok(()) => {
                info!("Cache store reachable");
                self.mark_success().await;
            }
            Err(e) => {
                warn!("Cache store unreachable, running disconnected: {}", e);
                let mut connection = self.connection.lock().await;
                connection.state = CacheState::Disconnected;
                connection.consecutive_failures = self.config.max_consecutive_failures;
            }
        }
        self.state().await
    }

    /// Re-ping a store that is not fully connected
    pub async fn reconnect(&self) -> CacheState {
        if self.state().await == CacheState::Connected {
            return CacheState::Connected;
        }
        self.connect().await
    }

    /// Ping the store under the call deadline.
    ///
    /// A success reconnects a degraded cache. A failure is returned to the
    /// caller but neither counted as an error nor moves the state, so health
    /// checks during an outage leave `error_rate` alone.
    pub async fn ping(&self) -> Result<()> {
        let result = self.call("ping", self.store.ping()).await;
        match &result {
            Ok(()) => self.mark_success().await,
            Err(e) => debug!("Cache ping failed: {}", e),
        }
        result
    }

    pub async fn state(&self) -> CacheState {
        self.connection.lock().await.state
    }

    /// Read a raw value, recording the access against its pattern
    pub async fn get(&self, key: &str, user_id: Option<&str>) -> Option<CacheValue> {
        let start = Instant::now();
        let value = self.read(key).await;
        self.track(key, value.is_some(), start, user_id).await;
        value
    }

    /// Read and deserialize a JSON value; undecodable entries count as misses
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str, user_id: Option<&str>) -> Option<T> {
        let start = Instant::now();
        let decoded = match self.read(key).await {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    let error = MemoryError::from(e);
                    warn!("Discarding cached value for {}: {}", key, error);
                    self.metrics.record_error().await;
                    None
                }
            },
            None => None,
        };

        self.track(key, decoded.is_some(), start, user_id).await;
        decoded
    }

    /// Write a raw value with an optimized TTL; `false` when the write failed
    pub async fn set(&self, key: &str, value: CacheValue, requested_ttl: Option<u64>) -> bool {
        self.tracker.record_write(key).await;

        if !self.state().await.is_usable() {
            debug!("Cache disconnected, dropping write to {}", key);
            return false;
        }

        let ttl = self.optimizer.optimize_ttl(key, requested_ttl).await;
        let ttl = self.config.jittered_ttl(ttl);

        match self.call("set", self.store.set(key, value, ttl)).await {
            Ok(()) => {
                self.mark_success().await;
                debug!("Cached {} for {}s", key, ttl);
                true
            }
            Err(e) => {
                self.mark_failure("set", key, &e).await;
                false
            }
        }
    }

    /// Serialize and write a JSON value
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, requested_ttl: Option<u64>) -> bool {
        match serde_json::to_string(value) {
            Ok(raw) => self.set(key, raw, requested_ttl).await,
            Err(e) => {
                let error = MemoryError::from(e);
                warn!("Cannot serialize value for {}: {}", key, error);
                self.metrics.record_error().await;
                false
            }
        }
    }

    /// Delete every key matching a `*` glob; 0 when the store is unavailable
    pub async fn delete_matching(&self, pattern: &str) -> usize {
        if !self.state().await.is_usable() {
            return 0;
        }

        match self.call("delete_matching", self.store.delete_matching(pattern)).await {
            Ok(count) => {
                self.mark_success().await;
                count
            }
            Err(e) => {
                self.mark_failure("delete_matching", pattern, &e).await;
                0
            }
        }
    }

    /// Persist the pattern map under the fixed snapshot key
    pub async fn persist_patterns(&self) -> bool {
        if !self.state().await.is_usable() {
            return false;
        }

        let snapshot = self.tracker.snapshot().await;
        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cannot serialize pattern snapshot: {}", e);
                self.metrics.record_error().await;
                return false;
            }
        };

        let key = self.config.pattern_snapshot_key.clone();
        let ttl = self.config.pattern_snapshot_ttl.as_secs();
        match self.call("persist_patterns", self.store.set(&key, raw, ttl)).await {
            Ok(()) => {
                self.mark_success().await;
                debug!("Persisted {} key patterns", snapshot.len());
                true
            }
            Err(e) => {
                self.mark_failure("persist_patterns", &key, &e).await;
                false
            }
        }
    }

    /// Load a previously persisted pattern map, returning how many were restored
    pub async fn load_patterns(&self) -> usize {
        if !self.state().await.is_usable() {
            return 0;
        }

        let key = self.config.pattern_snapshot_key.clone();
        let raw = match self.call("load_patterns", self.store.get(&key)).await {
            Ok(Some(raw)) => {
                self.mark_success().await;
                raw
            }
            Ok(None) => {
                self.mark_success().await;
                return 0;
            }
            Err(e) => {
                self.mark_failure("load_patterns", &key, &e).await;
                return 0;
            }
        };

        match serde_json::from_str::<PatternSnapshot>(&raw) {
            Ok(snapshot) => self.tracker.restore(snapshot).await,
            Err(e) => {
                warn!("Ignoring unreadable pattern snapshot: {}", e);
                self.metrics.record_error().await;
                0
            }
        }
    }

    /// TTL a write to `key` would currently receive (before jitter)
    pub async fn optimize_ttl(&self, key: &str, requested_ttl: Option<u64>) -> u64 {
        self.optimizer.optimize_ttl(key, requested_ttl).await
    }

    /// Live entry count of the store, if it can be read
    pub async fn store_len(&self) -> Option<usize> {
        if !self.state().await.is_usable() {
            return None;
        }
        self.call("len", self.store.len()).await.ok()
    }

    pub fn tracker(&self) -> Arc<PatternTracker> {
        self.tracker.clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn read(&self, key: &str) -> Option<CacheValue> {
        if !self.state().await.is_usable() {
            debug!("Cache disconnected, treating {} as a miss", key);
            return None;
        }

        match self.call("get", self.store.get(key)).await {
            Ok(value) => {
                self.mark_success().await;
                value
            }
            Err(e) => {
                self.mark_failure("get", key, &e).await;
                None
            }
        }
    }

    async fn track(&self, key: &str, is_hit: bool, start: Instant, user_id: Option<&str>) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.tracker.track_access(key, is_hit, elapsed_ms, user_id).await;
    }

    /// Run a store call under the configured deadline
    async fn call<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MemoryError::timeout(
                self.config.call_timeout,
                format!("cache {}", op),
            )),
        }
    }

    async fn mark_success(&self) {
        let mut connection = self.connection.lock().await;
        if connection.state != CacheState::Connected {
            info!("Cache state {} -> connected", connection.state);
        }
        connection.state = CacheState::Connected;
        connection.consecutive_failures = 0;
    }

    async fn mark_failure(&self, op: &str, key: &str, error: &MemoryError) {
        warn!("Cache {} failed for {}: {}", op, key, error);
        self.metrics.record_error().await;

        let mut connection = self.connection.lock().await;
        connection.consecutive_failures += 1;
        let next = if connection.consecutive_failures >= self.config.max_consecutive_failures {
            CacheState::Disconnected
        } else {
            CacheState::Degraded
        };
        if next != connection.state {
            warn!("Cache state {} -> {}", connection.state, next);
        }
        connection.state = next;
    }
}
