//! Invocation contract shared by harvest and apply runs
//!
//! Every run accepts a [`Trigger`] and answers with an [`InvocationResult`]
//! whose shape is the same on success and failure paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ResourceKind;

/// What caused a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Periodic timer tick: harvest recommendations for one kind
    Timer { kind: ResourceKind },
    /// State store change notification: apply the change written at `key`
    Change { key: String },
}

/// Status class of a run result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Success,
    ClientError,
    ServerError,
}

impl InvocationStatus {
    pub fn code(&self) -> u16 {
        match self {
            InvocationStatus::Success => 200,
            InvocationStatus::ClientError => 400,
            InvocationStatus::ServerError => 500,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => InvocationStatus::Success,
            400..=499 => InvocationStatus::ClientError,
            _ => InvocationStatus::ServerError,
        }
    }
}

/// Structured result returned by every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status_code: u16,
    pub message: String,
    /// Blocking live state when an apply was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl InvocationResult {
    pub fn new(status: InvocationStatus, message: impl Into<String>) -> Self {
        Self {
            status_code: status.code(),
            message: message.into(),
            current_state: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(InvocationStatus::Success, message)
    }

    pub fn with_current_state(mut self, state: impl Into<String>) -> Self {
        self.current_state = Some(state.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> InvocationStatus {
        InvocationStatus::from_code(self.status_code)
    }

    pub fn is_success(&self) -> bool {
        self.status() == InvocationStatus::Success
    }
}

/// Anything that can run a trigger to completion
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, trigger: Trigger) -> InvocationResult;
}
