//! Serverless function adapter
//!
//! Functions are sized by memory and can be updated at any time.

use super::{AppliedSizing, Eligibility, ResourceAdapter};
use crate::error::ProviderError;
use crate::models::{RawRecommendation, ResourceKind, SizingValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const MIN_FUNCTION_MEMORY_MB: u32 = 128;
pub const MAX_FUNCTION_MEMORY_MB: u32 = 10_240;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfiguration {
    pub function_name: String,
    pub memory_mb: u32,
}

/// Function configuration API
#[async_trait]
pub trait FunctionApi: Send + Sync {
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> Result<Option<FunctionConfiguration>, ProviderError>;

    async fn update_function_memory(
        &self,
        function_name: &str,
        memory_mb: u32,
    ) -> Result<(), ProviderError>;
}

pub struct FunctionAdapter {
    api: Arc<dyn FunctionApi>,
}

impl FunctionAdapter {
    pub fn new(api: Arc<dyn FunctionApi>) -> Self {
        Self { api }
    }
}

/// Function name from an ARN, dropping a trailing version or alias qualifier
fn function_name_from_subject(subject: &str) -> Option<String> {
    let segments: Vec<&str> = subject.split(':').collect();

    let name = match segments.iter().position(|s| *s == "function") {
        Some(idx) if idx + 1 < segments.len() => segments[idx + 1],
        _ => segments.last().copied().unwrap_or_default(),
    };

    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl ResourceAdapter for FunctionAdapter {
    type State = FunctionConfiguration;

    fn kind(&self) -> ResourceKind {
        ResourceKind::FunctionResource
    }

    fn extract_resource_id(&self, raw: &RawRecommendation) -> Option<String> {
        function_name_from_subject(&raw.subject)
    }

    async fn describe(&self, resource_id: &str) -> Result<Option<Self::State>, ProviderError> {
        self.api.get_function_configuration(resource_id).await
    }

    fn eligibility(&self, _state: &Self::State) -> Eligibility {
        Eligibility::Eligible
    }

    async fn apply_sizing(
        &self,
        resource_id: &str,
        value: &SizingValue,
        _state: &Self::State,
    ) -> Result<AppliedSizing, ProviderError> {
        let memory_mb = value.memory_mb().ok_or_else(|| {
            ProviderError::InvalidValue(format!("{} requires a memory size, got {}", self.kind(), value))
        })?;

        if !(MIN_FUNCTION_MEMORY_MB..=MAX_FUNCTION_MEMORY_MB).contains(&memory_mb) {
            return Err(ProviderError::InvalidValue(format!(
                "memory size {}MB outside {}..={}MB",
                memory_mb, MIN_FUNCTION_MEMORY_MB, MAX_FUNCTION_MEMORY_MB
            )));
        }

        self.api.update_function_memory(resource_id, memory_mb).await?;
        info!(function_name = %resource_id, memory_mb = memory_mb, "Updated function memory");

        Ok(AppliedSizing {
            value: value.clone(),
            detail: format!("updated function {} memory to {}MB", resource_id, memory_mb),
        })
    }
}
