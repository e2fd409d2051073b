//! Resource rightsizing pipeline
//!
//! This crate provides the core functionality for:
//! - Harvesting sizing recommendations into durable pending changes
//! - Applying pending changes to live resources behind eligibility checks
//! - Resource adapters for autoscaling groups, compute instances,
//!   database instances and functions
//! - State stores with change notifications
//! - Health checks and observability

pub mod adapter;
pub mod applier;
pub mod error;
pub mod harvester;
pub mod health;
pub mod invocation;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod provider;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod worker;

pub use applier::ApplyOutcome;
pub use error::{PipelineError, PipelineResult, ProviderError, StoreError};
pub use harvester::HarvestReport;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use invocation::{InvocationResult, InvocationStatus, Invoker, Trigger};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{Adapters, Pipeline};
pub use scheduler::{HarvestScheduler, HarvestSchedulerBuilder, SchedulerConfig};
pub use source::RecommendationSource;
pub use store::{ChangeNotification, StateStore};
pub use worker::{ApplyWorker, WorkerStats};
