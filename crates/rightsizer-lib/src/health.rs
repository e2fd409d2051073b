//! Health tracking for the rightsizing service
//!
//! Components report the outcome of every run. A failure degrades the
//! component; a run of consecutive failures escalates it to unhealthy,
//! which takes the service out of readiness until a run succeeds again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive failures after which a component counts as unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 5;

/// Component names for health tracking
pub mod components {
    pub const HARVESTER: &str = "harvester";
    pub const APPLIER: &str = "applier";
    pub const STATE_STORE: &str = "state_store";
    pub const PROVIDER: &str = "provider";
}

/// Ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    /// Error message of the latest failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consecutive_failures: u32,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn fresh() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            updated_at: Utc::now(),
        }
    }

    fn fail(&mut self, message: String) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.status = if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            ComponentStatus::Unhealthy
        } else {
            ComponentStatus::Degraded
        };
        self.message = Some(message);
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    started: bool,
}

/// Shared registry of component health
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::fresh());
    }

    /// A successful run resets the component
    pub async fn record_success(&self, name: &str) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::fresh());
    }

    pub async fn record_failure(&self, name: &str, message: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .components
            .entry(name.to_string())
            .or_insert_with(ComponentHealth::fresh)
            .fail(message.into());
    }

    /// Flip once startup wiring has finished
    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.started = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse {
            status,
            components: state.components.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;

        let unhealthy: Vec<&str> = state
            .components
            .iter()
            .filter(|(_, c)| c.status == ComponentStatus::Unhealthy)
            .map(|(name, _)| name.as_str())
            .collect();

        let reason = if !state.started {
            Some("service still starting".to_string())
        } else if !unhealthy.is_empty() {
            Some(format!("unhealthy: {}", unhealthy.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_single_failure_degrades() {
        let registry = HealthRegistry::new();
        registry.register(components::HARVESTER).await;
        registry.register(components::APPLIER).await;

        registry
            .record_failure(components::HARVESTER, "recommendation source unavailable")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());

        let harvester = &health.components[components::HARVESTER];
        assert_eq!(harvester.consecutive_failures, 1);
        assert_eq!(
            harvester.message.as_deref(),
            Some("recommendation source unavailable")
        );
        assert_eq!(
            health.components[components::APPLIER].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_repeated_failures_escalate_and_success_resets() {
        let registry = HealthRegistry::new();
        registry.set_ready(true).await;

        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry.record_failure(components::STATE_STORE, "disk full").await;
        }

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("unhealthy: state_store"));

        registry.record_success(components::STATE_STORE).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components[components::STATE_STORE].consecutive_failures, 0);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_not_ready_until_started() {
        let registry = HealthRegistry::new();
        registry.register(components::PROVIDER).await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("service still starting"));

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);
    }
}
