//! Component health grading for the observability endpoints.

use serde::Serialize;

use crate::breaker::{CircuitBreaker, CircuitState};
use crate::metrics::SearchMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub status: HealthStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

/// Grade the engine: open circuits degrade the provider component, and the
/// overall status is the worst component.
pub fn assess(
    breakers: &[&CircuitBreaker],
    metrics: &SearchMetrics,
    cache_entries: usize,
) -> HealthReport {
    let open: Vec<&'static str> = breakers
        .iter()
        .filter(|b| b.state() == CircuitState::Open)
        .map(|b| b.name())
        .collect();
    let provider_status = if open.is_empty() {
        HealthStatus::Healthy
    } else if open.len() < breakers.len() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Down
    };

    let snapshot = metrics.snapshot();
    let search_status = if snapshot.total_requests > 0
        && snapshot.empty_responses == snapshot.total_requests
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let components = vec![
        ComponentHealth {
            name: "search",
            status: search_status,
            detail: format!(
                "{} requests, p95 {}ms",
                snapshot.total_requests, snapshot.p95_latency_ms
            ),
        },
        ComponentHealth {
            name: "providers",
            status: provider_status,
            detail: if open.is_empty() {
                "all circuits closed".to_string()
            } else {
                format!("open circuits: {}", open.join(", "))
            },
        },
        ComponentHealth {
            name: "cache",
            status: HealthStatus::Healthy,
            detail: format!("{cache_entries} entries"),
        },
        ComponentHealth {
            name: "metrics",
            status: HealthStatus::Healthy,
            detail: format!("hit rate {:.2}", snapshot.cache_hit_rate),
        },
    ];

    let status = components
        .iter()
        .map(|c| c.status)
        .max_by_key(|s| match s {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Down => 2,
        })
        .unwrap_or(HealthStatus::Healthy);

    HealthReport { status, components }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn all_closed_circuits_are_healthy() {
        let places = CircuitBreaker::new("places");
        let events = CircuitBreaker::new("events");
        let metrics = SearchMetrics::new();
        let report = assess(&[&places, &events], &metrics, 3);
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.components.len(), 4);
    }

    #[test]
    fn one_open_circuit_degrades_two_down() {
        let places = CircuitBreaker::with_policy("places", 1, Duration::from_secs(60), 2);
        let events = CircuitBreaker::with_policy("events", 1, Duration::from_secs(60), 2);
        let metrics = SearchMetrics::new();

        places.record_failure();
        let report = assess(&[&places, &events], &metrics, 0);
        assert_eq!(report.status, HealthStatus::Degraded);

        events.record_failure();
        let report = assess(&[&places, &events], &metrics, 0);
        assert_eq!(report.status, HealthStatus::Down);
    }
}
