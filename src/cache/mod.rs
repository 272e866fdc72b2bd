//! # Adaptive Caching Layer
//!
//! A learning cache in front of a key-value store:
//!
//! - **Pattern tracking**: concrete keys are generalized (`user:42` becomes
//!   `user:*`) and access statistics accumulate per pattern
//! - **TTL optimization**: frequently read patterns get longer TTLs, bounded
//!   by a configured floor and ceiling
//! - **Warming**: periodic analysis queues the hottest patterns and a warming
//!   task refreshes them before they are requested again
//! - **Graceful degradation**: store failures turn into misses and failed
//!   writes, never errors for the caller
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use weave_memory::cache::{AdaptiveCache, CacheConfig, InMemoryStore};
//! use weave_memory::MetricsCollector;
//!
//! # async fn example() {
//! let cache = AdaptiveCache::new(
//!     CacheConfig::default(),
//!     Arc::new(InMemoryStore::default()),
//!     Arc::new(MetricsCollector::new()),
//! );
//! cache.connect().await;
//!
//! cache.set("memory:search:user-alice:42", "[]".to_string(), Some(1000)).await;
//! if let Some(value) = cache.get("memory:search:user-alice:42", Some("alice")).await {
//!     println!("Cache hit: {}", value);
//! }
//! # }
//! ```

pub mod adaptive;
pub mod config;
pub mod entry;
pub mod pattern;
pub mod store;
pub mod ttl;
pub mod types;
pub mod warmer;

pub use adaptive::AdaptiveCache;
pub use config::{CacheConfig, CacheConfigBuilder, MemoryStoreConfig, PATTERN_SNAPSHOT_KEY};
pub use entry::CacheEntry;
pub use pattern::{extract_pattern, PatternTracker, WILDCARD};
pub use store::{start_auto_cleanup, InMemoryStore, KeyValueStore, StoreStats};
pub use ttl::TtlOptimizer;
pub use types::{CacheKey, CacheState, CacheValue, PatternSnapshot, PatternStats};
pub use warmer::{CacheWarmer, WarmHandler, WarmingQueue, WarmingReport};
