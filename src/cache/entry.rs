//! Cache entry held by the in-process store

use crate::cache::types::{CacheKey, CacheValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored value with its TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cache key
    pub key: CacheKey,

    /// The serialized value
    pub value: CacheValue,

    /// TTL the entry was written with
    pub ttl_seconds: u64,

    /// When the entry was written
    pub write_time: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,

    /// Last read time (for LRU tracking)
    pub accessed_at: DateTime<Utc>,

    /// Number of reads
    pub access_count: u64,
}

impl CacheEntry {
    /// Create a new entry expiring `ttl_seconds` from now
    pub fn new(key: CacheKey, value: CacheValue, ttl_seconds: u64) -> Self {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(Duration::from_secs(ttl_seconds))
                .unwrap_or(chrono::Duration::seconds(3600));

        Self {
            key,
            value,
            ttl_seconds,
            write_time: now,
            expires_at,
            accessed_at: now,
            access_count: 0,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Mark the entry as read
    pub fn mark_accessed(&mut self) {
        self.accessed_at = Utc::now();
        self.access_count += 1;
    }

    /// Approximate footprint: key + value + bookkeeping
    pub fn calculate_size(&self) -> usize {
        self.key.len() + self.value.len() + std::mem::size_of::<Self>()
    }
}
