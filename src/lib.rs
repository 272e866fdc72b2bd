//! # Weave Memory (weave-memory)
//!
//! Hybrid memory search for Rust: results from a contextual (similarity)
//! store and a structural (graph) store are fused into one ranking and
//! served through an adaptive, self-warming cache.
//!
//! ## Features
//!
//! - Weighted fusion of both back ends (0.6 contextual / 0.4 structural by default)
//! - Key pattern tracking with frequency-scaled TTLs
//! - Background pattern analysis and cache warming with clean shutdown
//! - Graceful degradation when the cache store is unreachable
//! - Search metrics and per-component health reporting
//! - Neo4j full-text adapter for the structural store
//!
//! ## Hybrid Search
//!
//! ```no_run
//! use std::sync::Arc;
//! use weave_memory::cache::InMemoryStore;
//! use weave_memory::graph::Neo4jGraphStore;
//! use weave_memory::search::{ContextualStore, HybridMemory, Query};
//! use weave_memory::MemoryConfig;
//!
//! # async fn run(contextual: Arc<dyn ContextualStore>) -> anyhow::Result<()> {
//! let config = MemoryConfig::from_env()?;
//! let structural = Arc::new(Neo4jGraphStore::connect(&config.graph).await?);
//! let cache_store = Arc::new(InMemoryStore::new(config.store.clone()));
//!
//! let memory = Arc::new(HybridMemory::new(config, cache_store, contextual, structural)?);
//! memory.connect().await;
//!
//! let warmer = memory.warmer();
//! warmer.start().await;
//!
//! let results = memory.search(&Query::new("rust ownership", "alice")).await?;
//! for item in results.iter() {
//!     println!("{} {:.3} {:?}", item.item.id, item.combined_score, item.relevance);
//! }
//!
//! warmer.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod health;
pub mod metrics;
pub mod search;

// Re-export main types for convenience
pub use cache::{
    AdaptiveCache, CacheConfig, CacheConfigBuilder, CacheState, CacheWarmer, InMemoryStore,
    KeyValueStore, PatternTracker, TtlOptimizer, WarmHandler,
};
pub use config::{GraphConfig, MemoryConfig};
pub use error::{MemoryError, Result};
pub use graph::Neo4jGraphStore;
pub use health::{ComponentHealth, HealthReport, HealthStatus};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use search::{
    merge_and_rank, FusedResult, FusionConfig, FusionWeights, HybridMemory, Query, ResultItem,
};
