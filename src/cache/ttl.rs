//! Frequency-based TTL optimization

use crate::cache::{config::CacheConfig, pattern::PatternTracker};
use std::sync::Arc;
use tracing::debug;

/// Computes the TTL a write is stored with
pub struct TtlOptimizer {
    config: CacheConfig,
    tracker: Arc<PatternTracker>,
}

impl TtlOptimizer {
    pub fn new(config: CacheConfig, tracker: Arc<PatternTracker>) -> Self {
        Self { config, tracker }
    }

    /// Effective TTL in seconds for a write to `key`.
    ///
    /// Patterns read more than `optimization_min_accesses` times get
    /// `base * (1 + frequency / 100)`. The result always lies within
    /// `[ttl_floor, ttl_ceiling]`.
    pub async fn optimize_ttl(&self, key: &str, requested: Option<u64>) -> u64 {
        let base = requested.unwrap_or_else(|| self.config.default_ttl.as_secs());

        if !self.config.ml_optimization {
            return self.config.clamp_ttl(base);
        }

        let Some(stats) = self.tracker.stats_for_key(key).await else {
            return self.config.clamp_ttl(base);
        };

        if stats.access_count <= self.config.optimization_min_accesses {
            return self.config.clamp_ttl(base);
        }

        let frequency = if stats.access_frequency.is_finite() {
            stats.access_frequency.max(0.0)
        } else {
            0.0
        };
        let ceiling = self.config.ttl_ceiling.as_secs();
        let scaled = (base as f64 * (1.0 + frequency / 100.0)).min(ceiling as f64);
        let ttl = self.config.clamp_ttl(scaled.round() as u64);

        debug!(
            "Optimized TTL for {}: {}s -> {}s (frequency {:.2}/h)",
            key, base, ttl, frequency
        );
        ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::{PatternSnapshot, PatternStats};
    use chrono::Utc;
    use std::time::Duration;

    async fn tracker_with(pattern: &str, access_count: u64, frequency: f64) -> Arc<PatternTracker> {
        let tracker = Arc::new(PatternTracker::default());
        let mut stats = PatternStats::new(Utc::now());
        stats.access_count = access_count;
        stats.access_frequency = frequency;
        tracker
            .restore(PatternSnapshot {
                frequent_keys: vec![(pattern.to_string(), stats)],
                timestamp: Utc::now(),
            })
            .await;
        tracker
    }

    #[tokio::test]
    async fn test_scales_with_frequency() {
        let tracker = tracker_with("memory:search:*", 50, 20.0).await;
        let optimizer = TtlOptimizer::new(CacheConfig::default(), tracker);

        assert_eq!(optimizer.optimize_ttl("memory:search:7", Some(1000)).await, 1200);
    }

    #[tokio::test]
    async fn test_below_threshold_unchanged() {
        let tracker = tracker_with("memory:search:*", 10, 500.0).await;
        let optimizer = TtlOptimizer::new(CacheConfig::default(), tracker);

        assert_eq!(optimizer.optimize_ttl("memory:search:7", Some(1000)).await, 1000);
        assert_eq!(optimizer.optimize_ttl("memory:search:7", None).await, 3600);
    }

    #[tokio::test]
    async fn test_unknown_pattern_uses_default() {
        let optimizer = TtlOptimizer::new(CacheConfig::default(), Arc::new(PatternTracker::default()));
        assert_eq!(optimizer.optimize_ttl("nothing:1", None).await, 3600);
    }

    #[tokio::test]
    async fn test_never_exceeds_ceiling() {
        let tracker = tracker_with("hot:*", 1_000, 1_000_000.0).await;
        let optimizer = TtlOptimizer::new(CacheConfig::default(), tracker);

        assert_eq!(optimizer.optimize_ttl("hot:1", Some(80_000)).await, 86_400);
        assert_eq!(optimizer.optimize_ttl("hot:1", Some(10_000_000)).await, 86_400);
    }

    #[tokio::test]
    async fn test_never_below_floor() {
        let optimizer = TtlOptimizer::new(CacheConfig::default(), Arc::new(PatternTracker::default()));
        assert_eq!(optimizer.optimize_ttl("k:1", Some(1)).await, 60);
    }

    #[tokio::test]
    async fn test_disabled_optimization() {
        let tracker = tracker_with("hot:*", 1_000, 100.0).await;
        let config = CacheConfig::builder()
            .ml_optimization(false)
            .default_ttl(Duration::from_secs(900))
            .build();
        let optimizer = TtlOptimizer::new(config, tracker);

        assert_eq!(optimizer.optimize_ttl("hot:1", Some(1000)).await, 1000);
        assert_eq!(optimizer.optimize_ttl("hot:1", None).await, 900);
    }
}
