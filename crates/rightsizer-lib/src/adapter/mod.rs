//! Resource adapters
//!
//! One adapter per resource kind. Each adapter knows how to:
//! - Extract the resource id from a provider-specific recommendation subject
//! - Resolve and describe the live resource
//! - Decide whether the live resource may be resized right now
//! - Apply a new sizing value through the kind's mutation API
//!
//! The harvest and apply algorithms are written once against
//! [`ResourceAdapter`] and shared by all kinds.

mod autoscaling;
mod compute;
mod database;
mod function;

pub use autoscaling::{
    AutoscalingApi, AutoscalingGroupAdapter, GroupDescription, LaunchConfiguration, LaunchSource,
};
pub use compute::{ComputeApi, ComputeInstanceAdapter, InstanceDescription, InstanceState};
pub use database::{DatabaseApi, DatabaseInstanceAdapter, DbInstanceDescription};
pub use function::{
    FunctionAdapter, FunctionApi, FunctionConfiguration, MAX_FUNCTION_MEMORY_MB,
    MIN_FUNCTION_MEMORY_MB,
};

use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind, SizingValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of an eligibility check on a live resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Resizing is blocked while the resource is in `state`
    Blocked { state: String },
}

/// What an adapter did to the live resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedSizing {
    pub value: SizingValue,
    /// Human-readable description of the mutation performed
    pub detail: String,
}

/// Capability set for one resource kind
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Live resource state as returned by `describe`
    type State: Send + Sync + std::fmt::Debug;

    fn kind(&self) -> ResourceKind;

    /// Parse the resource id out of a recommendation subject
    fn extract_resource_id(&self, raw: &RawRecommendation) -> Option<String>;

    /// Whether the resource currently exists
    async fn exists(&self, resource_id: &str) -> Result<bool, ProviderError> {
        Ok(self.describe(resource_id).await?.is_some())
    }

    /// Fetch live state, `None` if the resource is gone
    async fn describe(&self, resource_id: &str) -> Result<Option<Self::State>, ProviderError>;

    fn eligibility(&self, state: &Self::State) -> Eligibility;

    fn is_eligible(&self, state: &Self::State) -> bool {
        self.eligibility(state) == Eligibility::Eligible
    }

    /// Apply `value` to the live resource
    async fn apply_sizing(
        &self,
        resource_id: &str,
        value: &SizingValue,
        state: &Self::State,
    ) -> Result<AppliedSizing, ProviderError>;
}

/// Text after the last `separator`, `None` when empty
pub(crate) fn suffix_after(subject: &str, separator: char) -> Option<String> {
    let suffix = subject.rsplit(separator).next()?.trim();
    if suffix.is_empty() {
        None
    } else {
        Some(suffix.to_string())
    }
}

/// Instance type carried by `value`, rejecting other shapes
pub(crate) fn require_instance_type(
    kind: ResourceKind,
    value: &SizingValue,
) -> Result<String, ProviderError> {
    match value.instance_type() {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        _ => Err(ProviderError::InvalidValue(format!(
            "{} requires an instance type, got {}",
            kind, value
        ))),
    }
}
