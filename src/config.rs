//! Service-level configuration assembled from defaults and the environment
//!
//! Recognized variables (all optional):
//!
//! | Variable | Field |
//! |---|---|
//! | `WEAVE_CONTEXTUAL_WEIGHT` / `WEAVE_STRUCTURAL_WEIGHT` | fusion weights |
//! | `WEAVE_MAX_RESULTS` | fused result cap |
//! | `WEAVE_DEFAULT_TTL_SECS` / `WEAVE_TTL_CEILING_SECS` / `WEAVE_TTL_FLOOR_SECS` | TTL bounds |
//! | `WEAVE_ML_OPTIMIZATION` | frequency-based TTL scaling |
//! | `WEAVE_ANALYSIS_INTERVAL_SECS` / `WEAVE_WARMING_INTERVAL_SECS` | background tasks |
//! | `WEAVE_CALL_TIMEOUT_MS` | cache store deadline |
//! | `WEAVE_BACKEND_TIMEOUT_MS` | back-end deadline |
//! | `NEO4J_URI` / `NEO4J_USER` / `NEO4J_PASSWORD` / `NEO4J_DATABASE` | graph store |

use crate::cache::{CacheConfig, MemoryStoreConfig};
use crate::error::{MemoryError, Result};
use crate::search::FusionConfig;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the Neo4j graph store
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Name of the full-text index queried by searches
    pub fulltext_index: String,
    pub fetch_size: usize,
    pub max_connections: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            fulltext_index: "memory_fulltext".to_string(),
            fetch_size: 500,
            max_connections: 16,
        }
    }
}

/// Top-level configuration of the hybrid memory service
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub cache: CacheConfig,
    pub store: MemoryStoreConfig,
    pub fusion: FusionConfig,
    pub graph: GraphConfig,
    /// Deadline for every contextual/structural store call
    pub backend_timeout: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            store: MemoryStoreConfig::default(),
            fusion: FusionConfig::default(),
            graph: GraphConfig::default(),
            backend_timeout: Duration::from_secs(10),
        }
    }
}

impl MemoryConfig {
    /// Defaults overridden by `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(weight) = parse_var::<f64, _>(&lookup, "WEAVE_CONTEXTUAL_WEIGHT")? {
            config.fusion.weights.contextual = weight;
        }
        if let Some(weight) = parse_var::<f64, _>(&lookup, "WEAVE_STRUCTURAL_WEIGHT")? {
            config.fusion.weights.structural = weight;
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, "WEAVE_MAX_RESULTS")? {
            config.fusion.max_results = max;
        }

        if let Some(secs) = parse_var::<u64, _>(&lookup, "WEAVE_DEFAULT_TTL_SECS")? {
            config.cache.default_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "WEAVE_TTL_CEILING_SECS")? {
            config.cache.ttl_ceiling = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "WEAVE_TTL_FLOOR_SECS")? {
            config.cache.ttl_floor = Duration::from_secs(secs);
        }
        if let Some(enabled) = parse_var::<bool, _>(&lookup, "WEAVE_ML_OPTIMIZATION")? {
            config.cache.ml_optimization = enabled;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "WEAVE_ANALYSIS_INTERVAL_SECS")? {
            config.cache.analysis_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "WEAVE_WARMING_INTERVAL_SECS")? {
            config.cache.warming_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "WEAVE_CALL_TIMEOUT_MS")? {
            config.cache.call_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "WEAVE_BACKEND_TIMEOUT_MS")? {
            config.backend_timeout = Duration::from_millis(ms);
        }

        if let Some(uri) = lookup("NEO4J_URI") {
            config.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            config.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            config.graph.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            config.graph.database = database;
        }

        config.validate()?;
        debug!("Loaded configuration: {:?}", config.fusion);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate().map_err(MemoryError::ConfigError)?;
        self.fusion.validate()?;
        if self.backend_timeout.is_zero() {
            return Err(MemoryError::ConfigError(
                "backend_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            MemoryError::ConfigError(format!("invalid value {:?} for {}: {}", raw, name, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = MemoryConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.fusion.weights.contextual, 0.6);
        assert_eq!(config.fusion.weights.structural, 0.4);
        assert_eq!(config.fusion.max_results, 20);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
    }

    #[test]
    fn test_overrides() {
        let config = MemoryConfig::from_lookup(lookup_from(&[
            ("WEAVE_CONTEXTUAL_WEIGHT", "0.7"),
            ("WEAVE_STRUCTURAL_WEIGHT", "0.3"),
            ("WEAVE_MAX_RESULTS", "5"),
            ("WEAVE_ML_OPTIMIZATION", "false"),
            ("WEAVE_CALL_TIMEOUT_MS", "250"),
            ("NEO4J_URI", "bolt://graph:7687"),
        ]))
        .unwrap();

        assert_eq!(config.fusion.weights.contextual, 0.7);
        assert_eq!(config.fusion.max_results, 5);
        assert!(!config.cache.ml_optimization);
        assert_eq!(config.cache.call_timeout, Duration::from_millis(250));
        assert_eq!(config.graph.uri, "bolt://graph:7687");
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let err = MemoryConfig::from_lookup(lookup_from(&[("WEAVE_MAX_RESULTS", "lots")])).unwrap_err();
        assert!(matches!(err, MemoryError::ConfigError(_)));
        assert!(err.to_string().contains("WEAVE_MAX_RESULTS"));
    }

    #[test]
    fn test_invalid_combination_rejected() {
        let result = MemoryConfig::from_lookup(lookup_from(&[("WEAVE_CONTEXTUAL_WEIGHT", "-1")]));
        assert!(result.is_err());

        let mut config = MemoryConfig::default();
        config.backend_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
