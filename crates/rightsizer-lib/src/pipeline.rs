//! Kind dispatcher
//!
//! Routes harvest and apply runs to the adapter for the requested resource
//! kind and records metrics, log events and component health around each run.

use crate::adapter::{
    AutoscalingApi, AutoscalingGroupAdapter, ComputeApi, ComputeInstanceAdapter, DatabaseApi,
    DatabaseInstanceAdapter, FunctionAdapter, FunctionApi,
};
use crate::applier::{self, ApplyOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::harvester::{self, HarvestReport};
use crate::health::{components, HealthRegistry};
use crate::invocation::{InvocationResult, InvocationStatus, Invoker, Trigger};
use crate::models::{ChangeKey, ResourceKind};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::source::RecommendationSource;
use crate::store::StateStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// One adapter per resource kind
pub struct Adapters {
    pub autoscaling: AutoscalingGroupAdapter,
    pub compute: ComputeInstanceAdapter,
    pub database: DatabaseInstanceAdapter,
    pub function: FunctionAdapter,
}

impl Adapters {
    /// Build all four adapters on top of a single provider client
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: AutoscalingApi + ComputeApi + DatabaseApi + FunctionApi + 'static,
    {
        Self {
            autoscaling: AutoscalingGroupAdapter::new(provider.clone()),
            compute: ComputeInstanceAdapter::new(provider.clone()),
            database: DatabaseInstanceAdapter::new(provider.clone()),
            function: FunctionAdapter::new(provider),
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn StateStore>,
    source: Arc<dyn RecommendationSource>,
    adapters: Adapters,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn StateStore>,
        source: Arc<dyn RecommendationSource>,
        adapters: Adapters,
    ) -> Self {
        Self {
            store,
            source,
            adapters,
            metrics: PipelineMetrics::new(),
            logger: StructuredLogger::new("rightsizer"),
            health: None,
        }
    }

    /// Pipeline whose source and adapters all talk to `provider`
    pub fn with_provider<P>(store: Arc<dyn StateStore>, provider: Arc<P>) -> Self
    where
        P: RecommendationSource
            + AutoscalingApi
            + ComputeApi
            + DatabaseApi
            + FunctionApi
            + 'static,
    {
        let adapters = Adapters::from_provider(provider.clone());
        Self::new(store, provider, adapters)
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Harvest recommendations for `kind` into the state store
    pub async fn harvest(&self, kind: ResourceKind) -> PipelineResult<HarvestReport> {
        let start = Instant::now();
        let source = self.source.as_ref();
        let store = self.store.as_ref();

        let result = match kind {
            ResourceKind::AutoscalingGroup => {
                harvester::harvest(source, &self.adapters.autoscaling, store).await
            }
            ResourceKind::ComputeInstance => {
                harvester::harvest(source, &self.adapters.compute, store).await
            }
            ResourceKind::DatabaseInstance => {
                harvester::harvest(source, &self.adapters.database, store).await
            }
            ResourceKind::FunctionResource => {
                harvester::harvest(source, &self.adapters.function, store).await
            }
        };

        match &result {
            Ok(report) => {
                self.metrics
                    .record_harvest(report, start.elapsed().as_secs_f64());
                self.logger.log_harvest(report);
                if let Some(health) = &self.health {
                    health.record_success(components::HARVESTER).await;
                    health.record_success(components::PROVIDER).await;
                    health.record_success(components::STATE_STORE).await;
                }
            }
            Err(e) => {
                self.metrics.record_failure("harvest", Some(kind));
                self.logger.log_harvest_failed(kind, e);
                if let Some(health) = &self.health {
                    let message = format!("{} harvest failed: {}", kind, e);
                    health
                        .record_failure(components::HARVESTER, message.clone())
                        .await;
                    match e {
                        PipelineError::Store(_) => {
                            health.record_failure(components::STATE_STORE, message).await
                        }
                        _ => health.record_failure(components::PROVIDER, message).await,
                    }
                }
            }
        }

        result
    }

    /// Apply the pending change stored at `key` (`{ResourceKind}/{resourceId}`)
    pub async fn apply(&self, key: &str) -> PipelineResult<ApplyOutcome> {
        let start = Instant::now();

        let parsed = ChangeKey::parse(key);
        let kind = parsed.as_ref().ok().map(|k| k.kind);
        let result = match parsed {
            Ok(change_key) => self.apply_change(&change_key).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                if let Some(kind) = kind {
                    self.metrics
                        .record_apply(kind, outcome, start.elapsed().as_secs_f64());
                }
                self.logger.log_apply(outcome);
                if let Some(health) = &self.health {
                    health.record_success(components::APPLIER).await;
                }
            }
            Err(e) => {
                self.metrics.record_failure("apply", kind);
                self.logger.log_apply_failed(key, e);
                if e.status() == InvocationStatus::ServerError {
                    if let Some(health) = &self.health {
                        health
                            .record_failure(components::APPLIER, format!("apply {} failed: {}", key, e))
                            .await;
                    }
                }
            }
        }

        result
    }

    async fn apply_change(&self, key: &ChangeKey) -> PipelineResult<ApplyOutcome> {
        let store = self.store.as_ref();
        match key.kind {
            ResourceKind::AutoscalingGroup => {
                applier::apply(key, store, &self.adapters.autoscaling).await
            }
            ResourceKind::ComputeInstance => applier::apply(key, store, &self.adapters.compute).await,
            ResourceKind::DatabaseInstance => {
                applier::apply(key, store, &self.adapters.database).await
            }
            ResourceKind::FunctionResource => {
                applier::apply(key, store, &self.adapters.function).await
            }
        }
    }

    /// Run whatever `trigger` asks for and report it as an [`InvocationResult`]
    pub async fn invoke(&self, trigger: Trigger) -> InvocationResult {
        match trigger {
            Trigger::Timer { kind } => match self.harvest(kind).await {
                Ok(report) => {
                    let result = InvocationResult::success(format!(
                        "Successfully processed {} recommendations",
                        report.upserted
                    ));
                    attach_details(result, &report)
                }
                Err(e) => error_result(&e),
            },
            Trigger::Change { key } => match self.apply(&key).await {
                Ok(outcome) => outcome_result(outcome),
                Err(e) => error_result(&e),
            },
        }
    }
}

#[async_trait]
impl Invoker for Pipeline {
    async fn invoke(&self, trigger: Trigger) -> InvocationResult {
        Pipeline::invoke(self, trigger).await
    }
}

fn outcome_result(outcome: ApplyOutcome) -> InvocationResult {
    let result = match &outcome {
        ApplyOutcome::Applied {
            key, value, detail, ..
        } => InvocationResult::success(format!(
            "Successfully updated {} to {} ({})",
            key, value, detail
        )),
        ApplyOutcome::Rejected {
            key, current_state, ..
        } => InvocationResult::new(
            InvocationStatus::ClientError,
            format!("{} is not eligible for resizing in state {}", key, current_state),
        )
        .with_current_state(current_state.clone()),
    };
    attach_details(result, &outcome)
}

fn error_result(err: &PipelineError) -> InvocationResult {
    InvocationResult::new(err.status(), err.to_string())
}

fn attach_details<T: serde::Serialize>(result: InvocationResult, details: &T) -> InvocationResult {
    match serde_json::to_value(details) {
        Ok(value) => result.with_details(value),
        Err(_) => result,
    }
}
