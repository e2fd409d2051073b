//! Core data models for the rightsizing pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Resource categories the pipeline knows how to resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    AutoscalingGroup,
    ComputeInstance,
    DatabaseInstance,
    FunctionResource,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::AutoscalingGroup,
        ResourceKind::ComputeInstance,
        ResourceKind::DatabaseInstance,
        ResourceKind::FunctionResource,
    ];

    /// Canonical name, also used as the first segment of change keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::AutoscalingGroup => "AutoscalingGroup",
            ResourceKind::ComputeInstance => "ComputeInstance",
            ResourceKind::DatabaseInstance => "DatabaseInstance",
            ResourceKind::FunctionResource => "FunctionResource",
        }
    }

    /// URL-friendly slug used by the provider gateway and the CLI
    pub fn slug(&self) -> &'static str {
        match self {
            ResourceKind::AutoscalingGroup => "autoscaling-group",
            ResourceKind::ComputeInstance => "compute-instance",
            ResourceKind::DatabaseInstance => "database-instance",
            ResourceKind::FunctionResource => "function",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s) || kind.slug() == s)
            .ok_or_else(|| PipelineError::InvalidKey(format!("unknown resource kind '{}'", s)))
    }
}

/// A sizing value; its shape depends on the resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizingValue {
    /// Instance type or class, e.g. `m5.large` or `db.t3.medium`
    InstanceType(String),
    /// Function memory size in megabytes
    MemoryMb(u32),
}

impl SizingValue {
    pub fn instance_type(&self) -> Option<&str> {
        match self {
            SizingValue::InstanceType(t) => Some(t),
            SizingValue::MemoryMb(_) => None,
        }
    }

    pub fn memory_mb(&self) -> Option<u32> {
        match self {
            SizingValue::MemoryMb(mb) => Some(*mb),
            SizingValue::InstanceType(_) => None,
        }
    }
}

impl fmt::Display for SizingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingValue::InstanceType(t) => f.write_str(t),
            SizingValue::MemoryMb(mb) => write!(f, "{}MB", mb),
        }
    }
}

/// State store key of a pending change: `{kind}/{resource_id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    pub kind: ResourceKind,
    pub resource_id: String,
}

impl ChangeKey {
    pub fn new(kind: ResourceKind, resource_id: impl Into<String>) -> Self {
        Self {
            kind,
            resource_id: resource_id.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let (kind, resource_id) = raw
            .trim_start_matches('/')
            .split_once('/')
            .ok_or_else(|| PipelineError::InvalidKey(format!("'{}' has no kind prefix", raw)))?;

        let kind: ResourceKind = kind.parse()?;

        if resource_id.is_empty() {
            return Err(PipelineError::InvalidKey(format!("'{}' has an empty resource id", raw)));
        }
        if resource_id.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(PipelineError::InvalidKey(format!(
                "'{}' contains an invalid path segment",
                raw
            )));
        }

        Ok(Self::new(kind, resource_id))
    }
}

impl fmt::Display for ChangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.resource_id)
    }
}

/// Durable record bridging the harvest and apply phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub current_value: SizingValue,
    pub recommended_value: SizingValue,
    pub last_updated: DateTime<Utc>,
}

impl PendingChange {
    pub fn key(&self) -> ChangeKey {
        ChangeKey::new(self.resource_kind, self.resource_id.clone())
    }
}

/// A recommendation as produced by the recommendation source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecommendation {
    /// Provider-specific descriptor of the subject (ARN, group name)
    pub subject: String,
    pub current_value: SizingValue,
    /// Candidate values, best first
    #[serde(default)]
    pub ranked_options: Vec<SizingValue>,
}

impl RawRecommendation {
    pub fn top_option(&self) -> Option<&SizingValue> {
        self.ranked_options.first()
    }
}
