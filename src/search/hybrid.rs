//! Hybrid memory service: cached, fused search over both back ends

use crate::cache::{
    extract_pattern, AdaptiveCache, CacheState, CacheWarmer, KeyValueStore, WarmHandler,
};
use crate::config::MemoryConfig;
use crate::error::{MemoryError, Result};
use crate::health::{ComponentHealth, HealthReport, DEFAULT_DEGRADED_THRESHOLD_MS};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::search::backends::{ContextualStore, StructuralStore};
use crate::search::fusion::{merge_and_rank, FusionConfig};
use crate::search::types::{FusedResult, MemoryRecord, NewMemory, Query, ResultItem};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Prefix of every cached search result key
pub const SEARCH_KEY_PREFIX: &str = "memory:search:";

/// Marker in front of the user id so numeric or UUID ids are never
/// generalized into a shared pattern
pub const USER_SEGMENT_PREFIX: &str = "user-";

/// Search over contextual and structural memory behind an adaptive cache
pub struct HybridMemory {
    cache: Arc<AdaptiveCache>,
    contextual: Arc<dyn ContextualStore>,
    structural: Arc<dyn StructuralStore>,
    metrics: Arc<MetricsCollector>,
    fusion: FusionConfig,
    backend_timeout: Duration,
    /// Last query seen per cache key pattern, replayed when warming
    recent_queries: RwLock<HashMap<String, Query>>,
}

impl HybridMemory {
    pub fn new(
        config: MemoryConfig,
        cache_store: Arc<dyn KeyValueStore>,
        contextual: Arc<dyn ContextualStore>,
        structural: Arc<dyn StructuralStore>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(MetricsCollector::new());
        let cache = Arc::new(AdaptiveCache::new(config.cache, cache_store, metrics.clone()));

        Ok(Self {
            cache,
            contextual,
            structural,
            metrics,
            fusion: config.fusion,
            backend_timeout: config.backend_timeout,
            recent_queries: RwLock::new(HashMap::new()),
        })
    }

    /// Ping the cache store; searches work in every resulting state
    pub async fn connect(&self) -> CacheState {
        let state = self.cache.connect().await;
        info!("Hybrid memory ready (cache {})", state);
        state
    }

    /// Warmer that replays remembered queries through this service
    pub fn warmer(self: &Arc<Self>) -> Arc<CacheWarmer> {
        let handler: Arc<dyn WarmHandler> = Arc::clone(self) as Arc<dyn WarmHandler>;
        Arc::new(CacheWarmer::new(self.cache.clone(), handler))
    }

    /// Cache key of a query: `memory:search:user-{user}:{hash(text, filters)}`
    pub fn cache_key(query: &Query) -> String {
        let mut hasher = DefaultHasher::new();
        query.text().hash(&mut hasher);
        for (name, value) in query.filters() {
            name.hash(&mut hasher);
            value.to_string().hash(&mut hasher);
        }
        format!("{}{}", user_search_prefix(query.user_id()), hasher.finish())
    }

    /// Glob matching every cached search of one user
    pub fn user_search_glob(user_id: &str) -> String {
        format!("{}*", user_search_prefix(user_id))
    }

    /// Run a search, answering from the cache when possible
    pub async fn search(&self, query: &Query) -> Result<FusedResult> {
        let start = Instant::now();
        let key = Self::cache_key(query);
        self.remember(&key, query).await;

        if let Some(cached) = self
            .cache
            .get_json::<FusedResult>(&key, Some(query.user_id()))
            .await
        {
            debug!("[{}] cache hit for {}", query.request_id(), key);
            self.metrics.record_hit().await;
            self.metrics.record_search(elapsed_ms(start)).await;
            return Ok(cached);
        }
        self.metrics.record_miss().await;

        let outcome = self.fetch_and_merge(query).await;
        self.metrics.record_search(elapsed_ms(start)).await;

        match outcome {
            Ok(fused) => {
                if !self.cache.set_json(&key, &fused, None).await {
                    debug!("[{}] result for {} not cached", query.request_id(), key);
                }
                Ok(fused)
            }
            Err(e) => {
                warn!("[{}] search failed: {}", query.request_id(), e);
                self.metrics.record_error().await;
                Err(e)
            }
        }
    }

    /// Store a memory and drop the user's cached searches
    pub async fn add_memory(&self, memory: NewMemory) -> Result<String> {
        let added = self
            .with_deadline(
                "contextual add",
                self.contextual
                    .add(&memory.user_id, &memory.content, &memory.metadata),
            )
            .await;

        let id = match added {
            Ok(id) => id,
            Err(e) => {
                warn!("Adding memory for {} failed: {}", memory.user_id, e);
                self.metrics.record_error().await;
                return Err(e);
            }
        };

        let invalidated = self.invalidate_searches(Some(&memory.user_id)).await;
        debug!(
            "Added memory {} for {}, invalidated {} cached searches",
            id, memory.user_id, invalidated
        );
        Ok(id)
    }

    /// Every memory the contextual store holds for a user
    pub async fn all_memories(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let fetched = self
            .with_deadline("contextual get_all", self.contextual.get_all(user_id))
            .await;
        if let Err(e) = &fetched {
            warn!("Listing memories for {} failed: {}", user_id, e);
            self.metrics.record_error().await;
        }
        fetched
    }

    /// Replace a memory's content and drop the cached searches it may appear in.
    ///
    /// With a known `owner` only that user's searches are dropped, otherwise
    /// every cached search is.
    pub async fn update_memory(&self, memory_id: &str, content: &str, owner: Option<&str>) -> Result<()> {
        let updated = self
            .with_deadline("contextual update", self.contextual.update(memory_id, content))
            .await;
        self.after_change("update", memory_id, owner, updated).await
    }

    /// Delete a memory and drop the cached searches it may appear in
    pub async fn delete_memory(&self, memory_id: &str, owner: Option<&str>) -> Result<()> {
        let deleted = self
            .with_deadline("contextual delete", self.contextual.delete(memory_id))
            .await;
        self.after_change("delete", memory_id, owner, deleted).await
    }

    /// Ping the cache store and both back ends
    pub async fn health(&self) -> HealthReport {
        let (cache, contextual, structural) = tokio::join!(
            check_component("cache", false, self.cache.ping()),
            check_component(
                "contextual",
                true,
                self.with_deadline("contextual ping", self.contextual.ping())
            ),
            check_component(
                "structural",
                true,
                self.with_deadline("structural ping", self.structural.ping())
            ),
        );
        HealthReport::from_components(vec![cache, contextual, structural])
    }

    /// Metrics snapshot; cache size is the live entry count, 0 while the
    /// cache is unavailable
    pub async fn metrics(&self) -> MetricsSnapshot {
        let cache_size = self.cache.store_len().await.unwrap_or(0);
        self.metrics.snapshot(cache_size).await
    }

    pub fn cache(&self) -> &Arc<AdaptiveCache> {
        &self.cache
    }

    pub fn fusion_config(&self) -> &FusionConfig {
        &self.fusion
    }

    async fn after_change(
        &self,
        op: &str,
        memory_id: &str,
        owner: Option<&str>,
        outcome: Result<()>,
    ) -> Result<()> {
        if let Err(e) = outcome {
            warn!("Memory {} {} failed: {}", op, memory_id, e);
            self.metrics.record_error().await;
            return Err(e);
        }

        let invalidated = self.invalidate_searches(owner).await;
        debug!(
            "Memory {} {}, invalidated {} cached searches",
            op, memory_id, invalidated
        );
        Ok(())
    }

    async fn invalidate_searches(&self, owner: Option<&str>) -> usize {
        let glob = match owner {
            Some(user_id) => Self::user_search_glob(user_id),
            None => format!("{}*", SEARCH_KEY_PREFIX),
        };
        self.cache.delete_matching(&glob).await
    }

    async fn remember(&self, key: &str, query: &Query) {
        let pattern = extract_pattern(key);
        self.recent_queries.write().await.insert(pattern, query.clone());
    }

    /// Query both back ends concurrently and fuse the results
    async fn fetch_and_merge(&self, query: &Query) -> Result<FusedResult> {
        let limit = self.fusion.max_results;

        let (contextual, structural) = tokio::try_join!(
            self.with_deadline(
                "contextual search",
                self.contextual
                    .search(query.text(), query.user_id(), query.filters(), limit),
            ),
            self.with_deadline("structural search", self.structural.search(query.text(), limit)),
        )?;

        debug!(
            "[{}] contextual results: {}, structural results: {}",
            query.request_id(),
            contextual.len(),
            structural.len()
        );

        let contextual: Vec<ResultItem> = contextual.into_iter().map(ResultItem::from).collect();
        let structural: Vec<ResultItem> = structural.into_iter().map(ResultItem::from).collect();

        Ok(merge_and_rank(
            &contextual,
            &structural,
            self.fusion.weights,
            self.fusion.max_results,
        ))
    }

    async fn with_deadline<T>(&self, context: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.backend_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(MemoryError::timeout(self.backend_timeout, context)),
        }
    }
}

#[async_trait]
impl WarmHandler for HybridMemory {
    /// Replay the last query seen for `pattern`, or let the graph store warm it
    async fn warm(&self, pattern: &str) -> Result<()> {
        let remembered = self.recent_queries.read().await.get(pattern).cloned();

        match remembered {
            Some(query) => {
                let fused = self.fetch_and_merge(&query).await?;
                let key = Self::cache_key(&query);
                let cached = self.cache.set_json(&key, &fused, None).await;
                debug!("Warmed {} ({} results, cached={})", key, fused.len(), cached);
                Ok(())
            }
            None => {
                self.with_deadline("structural warm", self.structural.warm(pattern))
                    .await
            }
        }
    }
}

async fn check_component(name: &str, critical: bool, check: impl Future<Output = Result<()>>) -> ComponentHealth {
    let start = Instant::now();
    match check.await {
        Ok(()) => ComponentHealth::healthy(name, critical, start.elapsed(), DEFAULT_DEGRADED_THRESHOLD_MS),
        Err(e) => ComponentHealth::unhealthy(name, critical, start.elapsed(), &e.to_string()),
    }
}

fn user_search_prefix(user_id: &str) -> String {
    format!("{}{}{}:", SEARCH_KEY_PREFIX, USER_SEGMENT_PREFIX, user_id)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_shape() {
        let query = Query::new("rust async", "alice");
        let key = HybridMemory::cache_key(&query);
        assert!(key.starts_with("memory:search:user-alice:"));
        assert_eq!(extract_pattern(&key), "memory:search:user-alice:*");
        assert_eq!(HybridMemory::user_search_glob("alice"), "memory:search:user-alice:*");
    }

    #[test]
    fn test_numeric_and_uuid_users_keep_their_own_pattern() {
        let uuid = "0f8fad5b-d9cb-469f-a165-70867728950e";
        let patterns: Vec<String> = ["42", "43", uuid]
            .iter()
            .map(|user| extract_pattern(&HybridMemory::cache_key(&Query::new("rust", *user))))
            .collect();

        assert_eq!(patterns[0], "memory:search:user-42:*");
        assert_eq!(patterns[1], "memory:search:user-43:*");
        assert_eq!(patterns[2], format!("memory:search:user-{}:*", uuid));
    }

    #[test]
    fn test_cache_key_depends_on_text_and_filters() {
        let plain = Query::new("rust", "alice");
        let same = Query::new("rust", "alice");
        let filtered = Query::new("rust", "alice").with_filter("topic", "code");
        let other_text = Query::new("go", "alice");

        assert_eq!(HybridMemory::cache_key(&plain), HybridMemory::cache_key(&same));
        assert_ne!(HybridMemory::cache_key(&plain), HybridMemory::cache_key(&filtered));
        assert_ne!(HybridMemory::cache_key(&plain), HybridMemory::cache_key(&other_text));
    }
}
