//! Search and cache metrics with a bounded latency window

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Number of latency samples kept
pub const LATENCY_WINDOW: usize = 1000;

/// Read-only view of the collected metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_searches: u64,
    pub hits: u64,
    pub misses: u64,
    pub error_count: u64,
    pub average_search_time_ms: f64,
    pub error_rate: f64,
    pub cache_hit_rate: f64,
    pub cache_size: usize,
}

#[derive(Debug, Default)]
struct Counters {
    total_searches: u64,
    hits: u64,
    misses: u64,
    errors: u64,
    latencies: VecDeque<f64>,
}

/// Rolling counters for the search path
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a completed search and its latency
    pub async fn record_search(&self, latency_ms: f64) {
        let mut counters = self.counters.write().await;
        counters.total_searches += 1;
        counters.latencies.push_back(latency_ms);
        while counters.latencies.len() > LATENCY_WINDOW {
            counters.latencies.pop_front();
        }
    }

    pub async fn record_hit(&self) {
        self.counters.write().await.hits += 1;
    }

    pub async fn record_miss(&self) {
        self.counters.write().await.misses += 1;
    }

    pub async fn record_error(&self) {
        self.counters.write().await.errors += 1;
    }

    /// Snapshot of the counters; `cache_size` is supplied by the caller
    pub async fn snapshot(&self, cache_size: usize) -> MetricsSnapshot {
        let counters = self.counters.read().await;
        let searches = counters.total_searches.max(1) as f64;

        let average_search_time_ms = if counters.latencies.is_empty() {
            0.0
        } else {
            counters.latencies.iter().sum::<f64>() / counters.latencies.len() as f64
        };

        MetricsSnapshot {
            total_searches: counters.total_searches,
            hits: counters.hits,
            misses: counters.misses,
            error_count: counters.errors,
            average_search_time_ms,
            error_rate: counters.errors as f64 / searches,
            cache_hit_rate: counters.hits as f64 / searches,
            cache_size,
        }
    }

    /// Number of latency samples currently held
    pub async fn latency_samples(&self) -> usize {
        self.counters.read().await.latencies.len()
    }

    pub async fn reset(&self) {
        *self.counters.write().await = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_snapshot() {
        let metrics = MetricsCollector::new();
        let snapshot = metrics.snapshot(0).await;

        assert_eq!(snapshot.total_searches, 0);
        assert_eq!(snapshot.average_search_time_ms, 0.0);
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.cache_hit_rate, 0.0);
    }

    #[tokio::test]
    async fn test_rates() {
        let metrics = MetricsCollector::new();
        for latency in [10.0, 20.0, 30.0, 40.0] {
            metrics.record_search(latency).await;
        }
        metrics.record_hit().await;
        metrics.record_miss().await;
        metrics.record_error().await;

        let snapshot = metrics.snapshot(7).await;
        assert_eq!(snapshot.total_searches, 4);
        assert_eq!(snapshot.average_search_time_ms, 25.0);
        assert_eq!(snapshot.cache_hit_rate, 0.25);
        assert_eq!(snapshot.error_rate, 0.25);
        assert_eq!(snapshot.cache_size, 7);
    }

    #[tokio::test]
    async fn test_errors_without_searches() {
        let metrics = MetricsCollector::new();
        metrics.record_error().await;
        metrics.record_error().await;
        assert_eq!(metrics.snapshot(0).await.error_rate, 2.0);
    }

    #[tokio::test]
    async fn test_latency_window_is_bounded() {
        let metrics = MetricsCollector::new();
        for i in 0..(LATENCY_WINDOW + 250) {
            metrics.record_search(i as f64).await;
        }

        assert_eq!(metrics.latency_samples().await, LATENCY_WINDOW);
        let snapshot = metrics.snapshot(0).await;
        assert_eq!(snapshot.total_searches, (LATENCY_WINDOW + 250) as u64);
        // oldest 250 samples dropped: mean of 250..1249
        assert_eq!(snapshot.average_search_time_ms, 749.5);
    }

    #[tokio::test]
    async fn test_reset() {
        let metrics = MetricsCollector::new();
        metrics.record_search(5.0).await;
        metrics.reset().await;
        assert_eq!(metrics.snapshot(0).await, MetricsSnapshot::default());
    }
}
