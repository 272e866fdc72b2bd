//! Configuration for the adaptive cache, TTL optimizer and cache warmer

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed key the pattern map is persisted under
pub const PATTERN_SNAPSHOT_KEY: &str = "memory:cache:patterns";

/// Configuration for the adaptive cache layer
///
/// Defaults:
/// - Default TTL: 1 hour, bounded to [60s, 24h]
/// - Pattern-based TTL scaling after more than 10 observed accesses
/// - Analysis every 5 minutes, warming every 10 minutes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL used when a write does not request one
    pub default_ttl: Duration,

    /// Upper bound for any TTL handed to the store
    pub ttl_ceiling: Duration,

    /// Lower bound for any TTL handed to the store
    pub ttl_floor: Duration,

    /// TTL jitter factor (0.0 - 1.0), applied after optimization
    /// 0.0 keeps TTLs exact
    pub ttl_jitter: f64,

    /// Scale TTLs by observed pattern frequency
    pub ml_optimization: bool,

    /// Accesses a pattern needs (strictly more than) before its TTL is scaled
    pub optimization_min_accesses: u64,

    /// Interval of the pattern analysis task
    pub analysis_interval: Duration,

    /// Interval of the warming task
    pub warming_interval: Duration,

    /// Number of hottest patterns queued per analysis pass
    pub warm_top_n: usize,

    /// Patterns below this frequency (accesses/hour) are never queued
    pub min_warm_frequency: f64,

    /// Deadline for every cache store call
    pub call_timeout: Duration,

    /// Deadline for a single warm callback
    pub warm_timeout: Duration,

    /// Consecutive failures before the cache is considered disconnected
    pub max_consecutive_failures: u32,

    /// Key the pattern map is persisted under
    pub pattern_snapshot_key: String,

    /// Self-expiry of the persisted pattern map
    pub pattern_snapshot_ttl: Duration,

    /// Distinct users remembered per pattern (diagnostics)
    pub max_users_per_pattern: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            ttl_ceiling: Duration::from_secs(86_400),
            ttl_floor: Duration::from_secs(60),
            ttl_jitter: 0.0,
            ml_optimization: true,
            optimization_min_accesses: 10,
            analysis_interval: Duration::from_secs(300),
            warming_interval: Duration::from_secs(600),
            warm_top_n: 10,
            min_warm_frequency: 0.0,
            call_timeout: Duration::from_secs(5),
            warm_timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
            pattern_snapshot_key: PATTERN_SNAPSHOT_KEY.to_string(),
            pattern_snapshot_ttl: Duration::from_secs(86_400),
            max_users_per_pattern: 100,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_floor.is_zero() {
            return Err("ttl_floor must be greater than 0".to_string());
        }

        if self.ttl_floor > self.ttl_ceiling {
            return Err("ttl_floor must not exceed ttl_ceiling".to_string());
        }

        if self.ttl_jitter < 0.0 || self.ttl_jitter > 1.0 {
            return Err("ttl_jitter must be between 0.0 and 1.0".to_string());
        }

        if self.analysis_interval.is_zero() || self.warming_interval.is_zero() {
            return Err("background intervals must be greater than 0".to_string());
        }

        if self.call_timeout.is_zero() || self.warm_timeout.is_zero() {
            return Err("timeouts must be greater than 0".to_string());
        }

        if self.max_consecutive_failures == 0 {
            return Err("max_consecutive_failures must be greater than 0".to_string());
        }

        if self.min_warm_frequency < 0.0 {
            return Err("min_warm_frequency must not be negative".to_string());
        }

        Ok(())
    }

    /// Clamp a TTL in seconds to the configured bounds
    pub fn clamp_ttl(&self, ttl_secs: u64) -> u64 {
        ttl_secs.clamp(self.ttl_floor.as_secs(), self.ttl_ceiling.as_secs())
    }

    /// Apply the configured jitter to a TTL, staying within bounds
    pub fn jittered_ttl(&self, ttl_secs: u64) -> u64 {
        if self.ttl_jitter == 0.0 {
            return ttl_secs;
        }

        let base = ttl_secs as f64;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * base * self.ttl_jitter;
        self.clamp_ttl((base + jitter).max(1.0).round() as u64)
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    default_ttl: Option<Duration>,
    ttl_ceiling: Option<Duration>,
    ttl_floor: Option<Duration>,
    ttl_jitter: Option<f64>,
    ml_optimization: Option<bool>,
    optimization_min_accesses: Option<u64>,
    analysis_interval: Option<Duration>,
    warming_interval: Option<Duration>,
    warm_top_n: Option<usize>,
    min_warm_frequency: Option<f64>,
    call_timeout: Option<Duration>,
    warm_timeout: Option<Duration>,
    max_consecutive_failures: Option<u32>,
    pattern_snapshot_key: Option<String>,
}

impl CacheConfigBuilder {
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn ttl_ceiling(mut self, ttl: Duration) -> Self {
        self.ttl_ceiling = Some(ttl);
        self
    }

    pub fn ttl_floor(mut self, ttl: Duration) -> Self {
        self.ttl_floor = Some(ttl);
        self
    }

    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Enable or disable frequency-based TTL scaling
    pub fn ml_optimization(mut self, enable: bool) -> Self {
        self.ml_optimization = Some(enable);
        self
    }

    pub fn optimization_min_accesses(mut self, accesses: u64) -> Self {
        self.optimization_min_accesses = Some(accesses);
        self
    }

    pub fn analysis_interval(mut self, interval: Duration) -> Self {
        self.analysis_interval = Some(interval);
        self
    }

    pub fn warming_interval(mut self, interval: Duration) -> Self {
        self.warming_interval = Some(interval);
        self
    }

    pub fn warm_top_n(mut self, n: usize) -> Self {
        self.warm_top_n = Some(n);
        self
    }

    pub fn min_warm_frequency(mut self, frequency: f64) -> Self {
        self.min_warm_frequency = Some(frequency);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn warm_timeout(mut self, timeout: Duration) -> Self {
        self.warm_timeout = Some(timeout);
        self
    }

    pub fn max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = Some(failures);
        self
    }

    pub fn pattern_snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.pattern_snapshot_key = Some(key.into());
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            ttl_ceiling: self.ttl_ceiling.unwrap_or(defaults.ttl_ceiling),
            ttl_floor: self.ttl_floor.unwrap_or(defaults.ttl_floor),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            ml_optimization: self.ml_optimization.unwrap_or(defaults.ml_optimization),
            optimization_min_accesses: self
                .optimization_min_accesses
                .unwrap_or(defaults.optimization_min_accesses),
            analysis_interval: self.analysis_interval.unwrap_or(defaults.analysis_interval),
            warming_interval: self.warming_interval.unwrap_or(defaults.warming_interval),
            warm_top_n: self.warm_top_n.unwrap_or(defaults.warm_top_n),
            min_warm_frequency: self
                .min_warm_frequency
                .unwrap_or(defaults.min_warm_frequency),
            call_timeout: self.call_timeout.unwrap_or(defaults.call_timeout),
            warm_timeout: self.warm_timeout.unwrap_or(defaults.warm_timeout),
            max_consecutive_failures: self
                .max_consecutive_failures
                .unwrap_or(defaults.max_consecutive_failures),
            pattern_snapshot_key: self
                .pattern_snapshot_key
                .unwrap_or(defaults.pattern_snapshot_key),
            ..defaults
        }
    }
}

/// Preset configurations
impl CacheConfig {
    /// Short-lived results, frequent analysis and warming
    pub fn realtime() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            ttl_ceiling: Duration::from_secs(3600),
            ttl_floor: Duration::from_secs(30),
            ttl_jitter: 0.10,
            analysis_interval: Duration::from_secs(60),
            warming_interval: Duration::from_secs(120),
            ..Default::default()
        }
    }

    /// Slowly changing memories, no scaling
    pub fn static_content() -> Self {
        Self {
            default_ttl: Duration::from_secs(23 * 3600),
            ml_optimization: false,
            ttl_jitter: 0.05,
            ..Default::default()
        }
    }
}

/// Configuration for the in-process key-value store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,

    /// Maximum total size of cached data in bytes
    pub max_size_bytes: usize,

    /// Interval of the expired-entry sweep
    pub cleanup_interval: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_size_bytes: 100 * 1024 * 1024,
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.ttl_ceiling, Duration::from_secs(86_400));
        assert_eq!(config.analysis_interval, Duration::from_secs(300));
        assert_eq!(config.warming_interval, Duration::from_secs(600));
        assert_eq!(config.warm_top_n, 10);
        assert_eq!(config.pattern_snapshot_key, PATTERN_SNAPSHOT_KEY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid = CacheConfig::default();
        invalid.ttl_floor = Duration::from_secs(100_000);
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.ttl_jitter = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.max_consecutive_failures = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .default_ttl(Duration::from_secs(600))
            .ml_optimization(false)
            .warm_top_n(3)
            .build();

        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert!(!config.ml_optimization);
        assert_eq!(config.warm_top_n, 3);
        assert_eq!(config.ttl_ceiling, Duration::from_secs(86_400));
    }

    #[test]
    fn test_clamp_ttl() {
        let config = CacheConfig::default();
        assert_eq!(config.clamp_ttl(10), 60);
        assert_eq!(config.clamp_ttl(1000), 1000);
        assert_eq!(config.clamp_ttl(1_000_000), 86_400);
    }

    #[test]
    fn test_jittered_ttl_stays_in_bounds() {
        let config = CacheConfig {
            ttl_jitter: 0.5,
            ..Default::default()
        };

        for _ in 0..100 {
            let ttl = config.jittered_ttl(86_400);
            assert!(ttl <= 86_400);
            assert!(ttl >= 60);
        }

        let exact = CacheConfig::default();
        assert_eq!(exact.jittered_ttl(1234), 1234);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(CacheConfig::realtime().default_ttl, Duration::from_secs(300));
        assert!(!CacheConfig::static_content().ml_optimization);
        assert!(CacheConfig::realtime().validate().is_ok());
    }
}
