//! Background pattern analysis and cache warming
//!
//! Two periodic tasks run beside the request path:
//! - analysis ranks patterns by frequency, queues the hottest and persists
//!   the pattern map;
//! - warming drains the queue and invokes the [`WarmHandler`] per pattern.
//!
//! Both tasks hold a cancellation token so [`CacheWarmer::shutdown`] stops
//! them deterministically.

use crate::cache::{adaptive::AdaptiveCache, config::CacheConfig, types::CacheState};
use crate::error::{MemoryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Refreshes cached data for one key pattern
#[async_trait]
pub trait WarmHandler: Send + Sync {
    async fn warm(&self, pattern: &str) -> Result<()>;
}

/// Set of patterns waiting for a warming pass
#[derive(Debug, Default)]
pub struct WarmingQueue {
    patterns: Mutex<HashSet<String>>,
}

impl WarmingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add patterns, returning how many were not already queued
    pub async fn enqueue<I, S>(&self, patterns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queue = self.patterns.lock().await;
        let mut added = 0;
        for pattern in patterns {
            if queue.insert(pattern.into()) {
                added += 1;
            }
        }
        added
    }

    /// Take every queued pattern, leaving the queue empty
    pub async fn drain(&self) -> HashSet<String> {
        std::mem::take(&mut *self.patterns.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.patterns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.patterns.lock().await.is_empty()
    }

    pub async fn contains(&self, pattern: &str) -> bool {
        self.patterns.lock().await.contains(pattern)
    }
}

/// Outcome of one warming pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarmingReport {
    pub attempted: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

struct RunningTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Drives pattern analysis and cache warming
pub struct CacheWarmer {
    cache: Arc<AdaptiveCache>,
    handler: Arc<dyn WarmHandler>,
    queue: WarmingQueue,
    pass_lock: Mutex<()>,
    tasks: Mutex<Option<RunningTasks>>,
}

impl CacheWarmer {
    pub fn new(cache: Arc<AdaptiveCache>, handler: Arc<dyn WarmHandler>) -> Self {
        Self {
            cache,
            handler,
            queue: WarmingQueue::new(),
            pass_lock: Mutex::new(()),
            tasks: Mutex::new(None),
        }
    }

    fn config(&self) -> &CacheConfig {
        self.cache.config()
    }

    /// Restore persisted patterns and spawn both background tasks.
    ///
    /// Calling `start` on a running warmer is a no-op.
    pub async fn start(self: &Arc<Self>) -> usize {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            debug!("Cache warmer already running");
            return 0;
        }

        let restored = self.cache.load_patterns().await;
        let cancel = CancellationToken::new();

        let analysis = {
            let warmer = Arc::clone(self);
            spawn_periodic(self.config().analysis_interval, cancel.clone(), move || {
                let warmer = Arc::clone(&warmer);
                async move {
                    warmer.analyze_patterns().await;
                }
            })
        };

        let warming = {
            let warmer = Arc::clone(self);
            spawn_periodic(self.config().warming_interval, cancel.clone(), move || {
                let warmer = Arc::clone(&warmer);
                async move {
                    warmer.run_warming_pass().await;
                }
            })
        };

        info!(
            "Cache warmer started (analysis every {:?}, warming every {:?}, {} patterns restored)",
            self.config().analysis_interval,
            self.config().warming_interval,
            restored
        );

        *tasks = Some(RunningTasks {
            cancel,
            handles: vec![analysis, warming],
        });
        restored
    }

    /// Cancel both tasks and wait for them to finish
    pub async fn shutdown(&self) {
        let Some(running) = self.tasks.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                error!("Cache warmer task ended abnormally: {}", e);
            }
        }
        info!("Cache warmer stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.tasks.lock().await.is_some()
    }

    /// Rank patterns, queue the hottest and persist the pattern map
    pub async fn analyze_patterns(&self) -> Vec<String> {
        if self.cache.state().await != CacheState::Connected {
            self.cache.reconnect().await;
        }

        let config = self.config();
        let top: Vec<String> = self
            .cache
            .tracker()
            .top_patterns(config.warm_top_n, config.min_warm_frequency)
            .await
            .into_iter()
            .map(|(pattern, _)| pattern)
            .collect();

        let added = self.queue.enqueue(top.iter().cloned()).await;
        let persisted = self.cache.persist_patterns().await;

        debug!(
            "Pattern analysis: {} hot patterns ({} newly queued), persisted={}",
            top.len(),
            added,
            persisted
        );
        top
    }

    /// Warm every queued pattern; the queue is empty afterwards
    pub async fn run_warming_pass(&self) -> WarmingReport {
        let _pass = self.pass_lock.lock().await;
        let patterns = self.queue.drain().await;
        let mut report = WarmingReport {
            attempted: patterns.len(),
            ..Default::default()
        };

        if patterns.is_empty() {
            return report;
        }

        let deadline = self.config().warm_timeout;
        let mut set = JoinSet::new();
        for pattern in patterns {
            let handler = Arc::clone(&self.handler);
            set.spawn(async move {
                let outcome = warm_with_deadline(handler.as_ref(), &pattern, deadline).await;
                (pattern, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((pattern, Ok(()))) => report.succeeded.push(pattern),
                Ok((pattern, Err(e))) => {
                    warn!("Warming {} failed: {}", pattern, e);
                    report.failed.push((pattern, e.to_string()));
                }
                Err(e) => {
                    error!("Warm task aborted: {}", e);
                    report.failed.push(("<unknown>".to_string(), e.to_string()));
                }
            }
        }

        report.succeeded.sort();
        report.failed.sort();
        info!(
            "Warming pass: {} attempted, {} succeeded, {} failed",
            report.attempted,
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    /// Queue arbitrary patterns and warm immediately
    pub async fn force_warm<I, S>(&self, patterns: I) -> WarmingReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue.enqueue(patterns).await;
        self.run_warming_pass().await
    }

    pub fn queue(&self) -> &WarmingQueue {
        &self.queue
    }
}

async fn warm_with_deadline(handler: &dyn WarmHandler, pattern: &str, deadline: Duration) -> Result<()> {
    match tokio::time::timeout(deadline, handler.warm(pattern)).await {
        Ok(result) => result,
        Err(_) => Err(MemoryError::timeout(deadline, format!("warming {}", pattern))),
    }
}

fn spawn_periodic<F, Fut>(period: Duration, cancel: CancellationToken, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the first run belongs one period out
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => tick().await,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::InMemoryStore;
    use crate::metrics::MetricsCollector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
        warmed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WarmHandler for CountingHandler {
        async fn warm(&self, pattern: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.warmed.lock().await.push(pattern.to_string());
            if pattern.starts_with("fail") {
                return Err(MemoryError::QueryError("boom".to_string()));
            }
            Ok(())
        }
    }

    fn warmer_with(handler: Arc<CountingHandler>) -> Arc<CacheWarmer> {
        let cache = Arc::new(AdaptiveCache::new(
            CacheConfig::default(),
            Arc::new(InMemoryStore::default()),
            Arc::new(MetricsCollector::new()),
        ));
        Arc::new(CacheWarmer::new(cache, handler))
    }

    #[tokio::test]
    async fn test_queue_has_set_semantics() {
        let queue = WarmingQueue::new();
        assert_eq!(queue.enqueue(["a:*", "b:*", "a:*"]).await, 2);
        assert_eq!(queue.enqueue(["a:*"]).await, 0);
        assert_eq!(queue.len().await, 2);

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_force_warm_isolates_failures() {
        let handler = Arc::new(CountingHandler::default());
        let warmer = warmer_with(handler.clone());

        let report = warmer.force_warm(["fail:*", "ok:*", "also:*"]).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, vec!["also:*".to_string(), "ok:*".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(warmer.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_analysis_queues_hottest_patterns() {
        let handler = Arc::new(CountingHandler::default());
        let warmer = warmer_with(handler);
        let tracker = warmer.cache.tracker();
        for i in 0..12 {
            for _ in 0..=i {
                tracker.track_access(&format!("p{}:1", i), true, 1.0, None).await;
            }
        }

        let top = warmer.analyze_patterns().await;
        assert_eq!(top.len(), 10);
        assert_eq!(top[0], "p11:*");
        assert_eq!(warmer.queue().len().await, 10);
        assert!(!warmer.queue().contains("p0:*").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_hits_deadline() {
        struct Stuck;

        #[async_trait]
        impl WarmHandler for Stuck {
            async fn warm(&self, _pattern: &str) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let cache = Arc::new(AdaptiveCache::new(
            CacheConfig::default(),
            Arc::new(InMemoryStore::default()),
            Arc::new(MetricsCollector::new()),
        ));
        let warmer = CacheWarmer::new(cache, Arc::new(Stuck));

        let report = warmer.force_warm(["slow:*"]).await;
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_tasks_run_and_stop() {
        let handler = Arc::new(CountingHandler::default());
        let warmer = warmer_with(handler.clone());
        warmer.cache.tracker().track_access("hot:1", true, 1.0, None).await;

        warmer.start().await;
        assert!(warmer.is_running().await);

        // analysis at 300s queues, warming at 600s drains
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(handler.calls.load(Ordering::SeqCst) >= 1);
        assert!(warmer.queue().is_empty().await);

        warmer.shutdown().await;
        assert!(!warmer.is_running().await);

        let calls = handler.calls.load(Ordering::SeqCst);
        warmer.cache.tracker().track_access("hot:2", true, 1.0, None).await;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), calls);
    }
}
