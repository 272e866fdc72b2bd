//! Health reporting for the cache store and both retrieval back ends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response time above which a reachable component is reported degraded
pub const DEFAULT_DEGRADED_THRESHOLD_MS: u64 = 1000;

/// Health status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Component is responsive
    Healthy,
    /// Component responds slowly, or an optional component is down
    Degraded,
    /// Component is not responsive or erroring
    Unhealthy,
}

impl HealthStatus {
    /// Status code a health endpoint would answer with
    pub fn to_http_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 200,
            HealthStatus::Unhealthy => 503,
        }
    }

    /// Searches can still be served
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Result of probing one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    /// Searches cannot be served while a critical component is down
    pub critical: bool,
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: &str, critical: bool, response_time: Duration, degraded_threshold_ms: u64) -> Self {
        let response_time_ms = response_time.as_millis() as u64;
        let status = if response_time_ms > degraded_threshold_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            name: name.to_string(),
            status,
            response_time_ms,
            critical,
            error: None,
        }
    }

    pub fn unhealthy(name: &str, critical: bool, response_time: Duration, error: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Unhealthy,
            response_time_ms: response_time.as_millis() as u64,
            critical,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregated health of the memory service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Overall status: unhealthy if a critical component is down, degraded if
    /// anything else is not fully healthy.
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let critical_down = components
            .iter()
            .any(|c| c.critical && c.status == HealthStatus::Unhealthy);
        let any_impaired = components.iter().any(|c| c.status != HealthStatus::Healthy);

        let status = if critical_down {
            HealthStatus::Unhealthy
        } else if any_impaired {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            components,
            timestamp: Utc::now(),
        }
    }

    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unhealthy_maps_to_503() {
        for status in [HealthStatus::Healthy, HealthStatus::Degraded] {
            assert_eq!(status.to_http_status_code(), 200);
            assert!(status.is_operational());
        }
        assert_eq!(HealthStatus::Unhealthy.to_http_status_code(), 503);
        assert!(!HealthStatus::Unhealthy.is_operational());
    }

    #[test]
    fn test_slow_component_is_degraded() {
        let component = ComponentHealth::healthy("cache", false, Duration::from_millis(1500), 1000);
        assert_eq!(component.status, HealthStatus::Degraded);
        assert_eq!(component.response_time_ms, 1500);
    }

    #[test]
    fn test_report_aggregation() {
        let fast = Duration::from_millis(5);

        let all_up = HealthReport::from_components(vec![
            ComponentHealth::healthy("cache", false, fast, 1000),
            ComponentHealth::healthy("contextual", true, fast, 1000),
        ]);
        assert_eq!(all_up.status, HealthStatus::Healthy);

        let cache_down = HealthReport::from_components(vec![
            ComponentHealth::unhealthy("cache", false, fast, "refused"),
            ComponentHealth::healthy("contextual", true, fast, 1000),
        ]);
        assert_eq!(cache_down.status, HealthStatus::Degraded);
        assert_eq!(cache_down.component("cache").unwrap().error.as_deref(), Some("refused"));

        let backend_down = HealthReport::from_components(vec![
            ComponentHealth::healthy("cache", false, fast, 1000),
            ComponentHealth::unhealthy("structural", true, fast, "refused"),
        ]);
        assert_eq!(backend_down.status, HealthStatus::Unhealthy);
    }
}
