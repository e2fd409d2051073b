//! Compute instance adapter
//!
//! Instances are resized in place, which the provider only allows while the
//! instance is stopped.

use super::{require_instance_type, suffix_after, AppliedSizing, Eligibility, ResourceAdapter};
use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind, SizingValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Instance power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub instance_type: String,
    pub state: InstanceState,
}

/// Compute instance mutation API
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, ProviderError>;

    async fn modify_instance_type(
        &self,
        instance_id: &str,
        instance_type: &str,
    ) -> Result<(), ProviderError>;
}

pub struct ComputeInstanceAdapter {
    api: Arc<dyn ComputeApi>,
}

impl ComputeInstanceAdapter {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResourceAdapter for ComputeInstanceAdapter {
    type State = InstanceDescription;

    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeInstance
    }

    /// `arn:...:instance/i-0abc` yields `i-0abc`
    fn extract_resource_id(&self, raw: &RawRecommendation) -> Option<String> {
        suffix_after(&raw.subject, '/')
    }

    async fn describe(&self, resource_id: &str) -> Result<Option<Self::State>, ProviderError> {
        self.api.describe_instance(resource_id).await
    }

    fn eligibility(&self, state: &Self::State) -> Eligibility {
        match state.state {
            InstanceState::Stopped => Eligibility::Eligible,
            other => Eligibility::Blocked {
                state: other.to_string(),
            },
        }
    }

    async fn apply_sizing(
        &self,
        resource_id: &str,
        value: &SizingValue,
        _state: &Self::State,
    ) -> Result<AppliedSizing, ProviderError> {
        let instance_type = require_instance_type(self.kind(), value)?;

        self.api
            .modify_instance_type(resource_id, &instance_type)
            .await?;
        info!(instance_id = %resource_id, instance_type = %instance_type, "Modified instance type");

        Ok(AppliedSizing {
            value: value.clone(),
            detail: format!("updated instance {} to {}", resource_id, instance_type),
        })
    }
}
