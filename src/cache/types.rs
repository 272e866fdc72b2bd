//! Core type definitions for the cache layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Cache key type
pub type CacheKey = String;

/// Cache value type - serialized JSON
pub type CacheValue = String;

/// Connection state of the adaptive cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// Store reachable, last operation succeeded
    Connected,
    /// Store reachable but recent operations failed
    Degraded,
    /// Store unreachable; operations short-circuit
    Disconnected,
}

impl CacheState {
    /// Whether operations should be forwarded to the store
    pub fn is_usable(&self) -> bool {
        !matches!(self, CacheState::Disconnected)
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheState::Connected => write!(f, "connected"),
            CacheState::Degraded => write!(f, "degraded"),
            CacheState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Access statistics for one key pattern
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatternStats {
    /// Number of observed reads
    pub access_count: u64,

    /// Exponentially smoothed read duration, `(avg + sample) / 2`
    pub avg_duration_ms: f64,

    /// Fraction of reads that hit, in [0, 1]
    pub hit_rate: f64,

    /// Reads per hour since the pattern was first seen
    pub access_frequency: f64,

    /// Time of the most recent read or write
    pub last_access_time: DateTime<Utc>,

    /// Time the pattern was first observed
    pub first_seen: DateTime<Utc>,

    /// Reads per hour of day (0-23), diagnostics only
    #[serde(default)]
    pub hourly_accesses: BTreeMap<u32, u64>,

    /// Users that read through this pattern, diagnostics only
    #[serde(default)]
    pub users: BTreeSet<String>,
}

impl PatternStats {
    /// Zeroed statistics for a pattern first seen at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            access_count: 0,
            avg_duration_ms: 0.0,
            hit_rate: 0.0,
            access_frequency: 0.0,
            last_access_time: now,
            first_seen: now,
            hourly_accesses: BTreeMap::new(),
            users: BTreeSet::new(),
        }
    }

    /// Hour of day with the most reads, if any
    pub fn peak_hour(&self) -> Option<u32> {
        self.hourly_accesses
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(hour, _)| *hour)
    }
}

/// Persisted form of the pattern map
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSnapshot {
    /// `[pattern, stats]` pairs
    pub frequent_keys: Vec<(String, PatternStats)>,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl PatternSnapshot {
    pub fn len(&self) -> usize {
        self.frequent_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequent_keys.is_empty()
    }
}
