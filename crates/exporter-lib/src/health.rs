//! Health check infrastructure for the exporter
//!
//! Tracks the topology fetcher and every registered collector, and backs
//! the `/healthz` and `/readyz` endpoints.

use crate::collector::ScrapeReport;
use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Last run succeeded
    Healthy,
    /// Last run failed, previously published output is still served
    Degraded,
    /// Nothing useful can be served
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
///
/// Collectors register under their own names next to these.
pub mod components {
    pub const FETCHER: &str = "fetcher";
    pub const ORCHESTRATOR: &str = "orchestrator";
}

/// Health registry for tracking component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// A cycle was skipped because the snapshot could not be fetched
    pub async fn record_fetch_failure(&self, error: &FetchError) {
        self.set_degraded(components::FETCHER, error.to_string()).await;
    }

    /// Apply the outcome of a completed scrape cycle
    ///
    /// The exporter becomes ready after its first completed cycle. The
    /// orchestrator turns unhealthy only when every collector failed.
    pub async fn record_scrape(&self, report: &ScrapeReport) {
        {
            let mut entries = self.components.write().await;
            entries.insert(components::FETCHER.to_string(), ComponentHealth::healthy());

            for outcome in &report.outcomes {
                let health = match &outcome.result {
                    Ok(()) => ComponentHealth::healthy(),
                    Err(e) => ComponentHealth::degraded(e.to_string()),
                };
                entries.insert(outcome.collector.to_string(), health);
            }

            let all_failed = !report.outcomes.is_empty()
                && report.failures().count() == report.outcomes.len();
            let orchestrator = if all_failed {
                ComponentHealth::unhealthy("All collectors failed")
            } else {
                ComponentHealth::healthy()
            };
            entries.insert(components::ORCHESTRATOR.to_string(), orchestrator);
        }

        self.set_ready(true).await;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let reason = if !ready {
            Some("No scrape cycle completed yet")
        } else if health.status == ComponentStatus::Unhealthy {
            Some("Critical component unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorOutcome;
    use crate::error::CollectorError;
    use std::time::Duration;

    fn report(results: Vec<(&'static str, bool)>) -> ScrapeReport {
        ScrapeReport {
            outcomes: results
                .into_iter()
                .map(|(collector, ok)| CollectorOutcome {
                    collector,
                    result: if ok {
                        Ok(())
                    } else {
                        Err(CollectorError::Timeout {
                            collector,
                            timeout: Duration::from_secs(1),
                        })
                    },
                })
                .collect(),
            duration: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        registry.register(components::FETCHER).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_fetcher() {
        let registry = HealthRegistry::new();
        registry.register(components::FETCHER).await;

        let error = FetchError::Unavailable("director unreachable".to_string());
        registry.record_fetch_failure(&error).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::FETCHER].message.as_deref(),
            Some("topology source unavailable: director unreachable")
        );
    }

    #[tokio::test]
    async fn test_record_scrape_marks_ready_and_degrades_failed_collectors() {
        let registry = HealthRegistry::new();
        registry
            .record_scrape(&report(vec![("Deployments", true), ("ServiceDiscovery", false)]))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components["ServiceDiscovery"].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components["Deployments"].status,
            ComponentStatus::Healthy
        );
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_all_collectors_failing_is_unhealthy() {
        let registry = HealthRegistry::new();
        registry
            .record_scrape(&report(vec![("Deployments", false), ("ServiceDiscovery", false)]))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Critical component unhealthy")
        );
    }

    #[tokio::test]
    async fn test_recovery_after_failed_cycle() {
        let registry = HealthRegistry::new();
        registry
            .record_scrape(&report(vec![("ServiceDiscovery", false)]))
            .await;
        registry
            .record_scrape(&report(vec![("ServiceDiscovery", true)]))
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }
}
