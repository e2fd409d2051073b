//! Autoscaling group adapter
//!
//! A group launches instances either from a versioned launch template or from
//! an immutable launch configuration. Resizing never edits the source in
//! place:
//! - Launch template: a new version is cloned from the group's current
//!   version with only the instance type overridden, and the group is
//!   repointed at it
//! - Launch configuration: the configuration is cloned under a timestamped
//!   name with the new instance type, and the group is repointed at the clone

use super::{require_instance_type, AppliedSizing, Eligibility, ResourceAdapter};
use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind, SizingValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const GROUP_NAME_MARKER: &str = "autoScalingGroupName/";

/// Where a group's instances get their launch parameters from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchSource {
    LaunchTemplate {
        launch_template_id: String,
        version: String,
    },
    LaunchConfiguration {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub group_name: String,
    #[serde(default)]
    pub launch_source: Option<LaunchSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfiguration {
    pub name: String,
    pub image_id: String,
    pub instance_type: String,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_instance_profile: Option<String>,
}

/// Autoscaling and launch template API
#[async_trait]
pub trait AutoscalingApi: Send + Sync {
    async fn describe_group(
        &self,
        group_name: &str,
    ) -> Result<Option<GroupDescription>, ProviderError>;

    /// Create a template version cloned from `source_version` with the
    /// instance type overridden; returns the new version number
    async fn create_launch_template_version(
        &self,
        launch_template_id: &str,
        source_version: &str,
        instance_type: &str,
    ) -> Result<u64, ProviderError>;

    async fn describe_launch_configuration(
        &self,
        name: &str,
    ) -> Result<Option<LaunchConfiguration>, ProviderError>;

    async fn create_launch_configuration(
        &self,
        configuration: &LaunchConfiguration,
    ) -> Result<(), ProviderError>;

    async fn update_group_launch_source(
        &self,
        group_name: &str,
        launch_source: &LaunchSource,
    ) -> Result<(), ProviderError>;
}

pub struct AutoscalingGroupAdapter {
    api: Arc<dyn AutoscalingApi>,
}

impl AutoscalingGroupAdapter {
    pub fn new(api: Arc<dyn AutoscalingApi>) -> Self {
        Self { api }
    }

    /// Name for a cloned launch configuration: `{group}-{YYYYmmdd-HHMMSS}`
    pub fn launch_configuration_name(group_name: &str, now: DateTime<Utc>) -> String {
        format!("{}-{}", group_name, now.format("%Y%m%d-%H%M%S"))
    }

    async fn resize_launch_template(
        &self,
        group_name: &str,
        launch_template_id: &str,
        version: &str,
        instance_type: &str,
    ) -> Result<String, ProviderError> {
        let new_version = self
            .api
            .create_launch_template_version(launch_template_id, version, instance_type)
            .await?;

        self.api
            .update_group_launch_source(
                group_name,
                &LaunchSource::LaunchTemplate {
                    launch_template_id: launch_template_id.to_string(),
                    version: new_version.to_string(),
                },
            )
            .await?;

        info!(
            group_name = %group_name,
            launch_template_id = %launch_template_id,
            source_version = %version,
            new_version = new_version,
            "Repointed group at new launch template version"
        );

        Ok(format!(
            "launch template {} version {} (from version {})",
            launch_template_id, new_version, version
        ))
    }

    async fn resize_launch_configuration(
        &self,
        group_name: &str,
        current_name: &str,
        instance_type: &str,
    ) -> Result<String, ProviderError> {
        let current = self
            .api
            .describe_launch_configuration(current_name)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("launch configuration {}", current_name))
            })?;

        let clone = LaunchConfiguration {
            name: Self::launch_configuration_name(group_name, Utc::now()),
            instance_type: instance_type.to_string(),
            ..current
        };

        self.api.create_launch_configuration(&clone).await?;
        self.api
            .update_group_launch_source(
                group_name,
                &LaunchSource::LaunchConfiguration {
                    name: clone.name.clone(),
                },
            )
            .await?;

        info!(
            group_name = %group_name,
            previous_configuration = %current_name,
            launch_configuration = %clone.name,
            "Repointed group at cloned launch configuration"
        );

        Ok(format!(
            "launch configuration {} (cloned from {})",
            clone.name, current_name
        ))
    }
}

#[async_trait]
impl ResourceAdapter for AutoscalingGroupAdapter {
    type State = GroupDescription;

    fn kind(&self) -> ResourceKind {
        ResourceKind::AutoscalingGroup
    }

    /// Accepts a bare group name or a group ARN ending in `autoScalingGroupName/{name}`
    fn extract_resource_id(&self, raw: &RawRecommendation) -> Option<String> {
        let name = match raw.subject.rfind(GROUP_NAME_MARKER) {
            Some(idx) => &raw.subject[idx + GROUP_NAME_MARKER.len()..],
            None => raw.subject.as_str(),
        };

        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    async fn describe(&self, resource_id: &str) -> Result<Option<Self::State>, ProviderError> {
        self.api.describe_group(resource_id).await
    }

    fn eligibility(&self, _state: &Self::State) -> Eligibility {
        Eligibility::Eligible
    }

    async fn apply_sizing(
        &self,
        resource_id: &str,
        value: &SizingValue,
        state: &Self::State,
    ) -> Result<AppliedSizing, ProviderError> {
        let instance_type = require_instance_type(self.kind(), value)?;

        let detail = match &state.launch_source {
            Some(LaunchSource::LaunchTemplate {
                launch_template_id,
                version,
            }) => {
                self.resize_launch_template(resource_id, launch_template_id, version, &instance_type)
                    .await?
            }
            Some(LaunchSource::LaunchConfiguration { name }) => {
                self.resize_launch_configuration(resource_id, name, &instance_type)
                    .await?
            }
            None => {
                return Err(ProviderError::InvalidValue(format!(
                    "group {} has neither a launch template nor a launch configuration",
                    resource_id
                )))
            }
        };

        Ok(AppliedSizing {
            value: value.clone(),
            detail: format!(
                "updated ASG {} to use instance type {} via {}",
                resource_id, instance_type, detail
            ),
        })
    }
}
