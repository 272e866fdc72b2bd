//! Key pattern extraction and per-pattern access statistics
//!
//! Concrete keys such as `memory:search:user:42` are generalized to
//! `memory:search:user:*` so statistics accumulate across every key that
//! shares a shape. The tracker owns the pattern map behind a single lock and
//! is shared by the request path and the background analysis task.

use crate::cache::types::{PatternSnapshot, PatternStats};
use chrono::{DateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Token substituted for dynamic key segments
pub const WILDCARD: &str = "*";

const SEGMENT_SEPARATOR: char = ':';

/// Shortest window frequency is measured over, in hours (one minute)
const MIN_FREQUENCY_WINDOW_HOURS: f64 = 1.0 / 60.0;

static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid regex")
});
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));
static EPOCH_MILLIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").expect("valid regex"));

/// Generalize a concrete cache key into its pattern.
///
/// Segments are rewritten to `*` by the first rule that matches, in order:
/// numeric id (only after a colon), UUID, ISO date, 13-digit epoch millis.
pub fn extract_pattern(key: &str) -> String {
    key.split(SEGMENT_SEPARATOR)
        .enumerate()
        .map(|(index, segment)| {
            let dynamic = (index > 0 && NUMERIC_ID.is_match(segment))
                || UUID.is_match(segment)
                || ISO_DATE.is_match(segment)
                || EPOCH_MILLIS.is_match(segment);
            if dynamic {
                WILDCARD
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join(":")
}

/// Tracks access statistics per key pattern
pub struct PatternTracker {
    patterns: RwLock<HashMap<String, PatternStats>>,
    max_users_per_pattern: usize,
}

impl PatternTracker {
    pub fn new(max_users_per_pattern: usize) -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            max_users_per_pattern,
        }
    }

    /// Record a read through `key`, returning the pattern it resolved to
    pub async fn track_access(
        &self,
        key: &str,
        is_hit: bool,
        duration_ms: f64,
        user_id: Option<&str>,
    ) -> String {
        self.track_access_at(key, is_hit, duration_ms, user_id, Utc::now())
            .await
    }

    pub(crate) async fn track_access_at(
        &self,
        key: &str,
        is_hit: bool,
        duration_ms: f64,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let pattern = extract_pattern(key);
        let mut patterns = self.patterns.write().await;
        let stats = patterns.entry(pattern.clone()).or_insert_with(|| {
            debug!("New key pattern observed: {}", pattern);
            PatternStats::new(now)
        });

        stats.access_count += 1;
        let n = stats.access_count as f64;

        let sample = if duration_ms.is_finite() { duration_ms.max(0.0) } else { 0.0 };
        stats.avg_duration_ms = if stats.access_count == 1 {
            sample
        } else {
            (stats.avg_duration_ms + sample) / 2.0
        };

        let hit = if is_hit { 1.0 } else { 0.0 };
        stats.hit_rate = ((stats.hit_rate * (n - 1.0) + hit) / n).clamp(0.0, 1.0);

        stats.last_access_time = now;
        stats.access_frequency = n / hours_between(stats.first_seen, now);

        *stats.hourly_accesses.entry(now.hour()).or_insert(0) += 1;
        if let Some(user) = user_id {
            if stats.users.len() < self.max_users_per_pattern || stats.users.contains(user) {
                stats.users.insert(user.to_string());
            }
        }

        pattern
    }

    /// Register the pattern of a written key without touching read statistics
    pub async fn record_write(&self, key: &str) -> String {
        let pattern = extract_pattern(key);
        let now = Utc::now();
        let mut patterns = self.patterns.write().await;
        patterns
            .entry(pattern.clone())
            .or_insert_with(|| PatternStats::new(now))
            .last_access_time = now;
        pattern
    }

    /// Statistics of one pattern
    pub async fn stats(&self, pattern: &str) -> Option<PatternStats> {
        self.patterns.read().await.get(pattern).cloned()
    }

    /// Statistics of the pattern a concrete key resolves to
    pub async fn stats_for_key(&self, key: &str) -> Option<PatternStats> {
        self.stats(&extract_pattern(key)).await
    }

    /// Up to `n` patterns ranked by frequency, descending, ties by name
    pub async fn top_patterns(&self, n: usize, min_frequency: f64) -> Vec<(String, PatternStats)> {
        let patterns = self.patterns.read().await;
        let mut ranked: Vec<(String, PatternStats)> = patterns
            .iter()
            .filter(|(_, stats)| stats.access_frequency >= min_frequency)
            .map(|(pattern, stats)| (pattern.clone(), stats.clone()))
            .collect();

        ranked.sort_by(|a, b| {
            b.1.access_frequency
                .total_cmp(&a.1.access_frequency)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(n);
        ranked
    }

    /// Copy of the full map in its persisted form
    pub async fn snapshot(&self) -> PatternSnapshot {
        let patterns = self.patterns.read().await;
        let mut frequent_keys: Vec<(String, PatternStats)> = patterns
            .iter()
            .map(|(pattern, stats)| (pattern.clone(), stats.clone()))
            .collect();
        frequent_keys.sort_by(|a, b| a.0.cmp(&b.0));

        PatternSnapshot {
            frequent_keys,
            timestamp: Utc::now(),
        }
    }

    /// Merge a persisted snapshot into the live map.
    ///
    /// Patterns already observed in this process keep their live statistics.
    pub async fn restore(&self, snapshot: PatternSnapshot) -> usize {
        let mut patterns = self.patterns.write().await;
        let mut restored = 0;

        for (pattern, mut stats) in snapshot.frequent_keys {
            if patterns.contains_key(&pattern) {
                continue;
            }
            stats.hit_rate = if stats.hit_rate.is_finite() {
                stats.hit_rate.clamp(0.0, 1.0)
            } else {
                0.0
            };
            patterns.insert(pattern, stats);
            restored += 1;
        }

        info!("Restored {} key patterns from snapshot", restored);
        restored
    }

    pub async fn len(&self) -> usize {
        self.patterns.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.patterns.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.patterns.write().await.clear();
    }
}

impl Default for PatternTracker {
    fn default() -> Self {
        Self::new(100)
    }
}

fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let hours = (end - start).num_milliseconds() as f64 / 3_600_000.0;
    hours.max(MIN_FREQUENCY_WINDOW_HOURS)
}
