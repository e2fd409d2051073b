//! Error types for the rightsizing pipeline

use thiserror::Error;

use crate::invocation::InvocationStatus;
use crate::models::ResourceKind;

/// Errors raised by state store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize value for {key}: {message}")]
    Serialize { key: String, message: String },

    #[error("failed to deserialize value at {key}: {message}")]
    Deserialize { key: String, message: String },

    #[error("invalid state store key: {0}")]
    InvalidKey(String),
}

/// Errors raised by the recommendation source and resource mutation APIs
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("provider resource not found: {0}")]
    NotFound(String),

    #[error("invalid sizing value: {0}")]
    InvalidValue(String),
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by a harvest or apply run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("recommendation source unavailable: {0}")]
    SourceUnavailable(#[source] ProviderError),

    #[error("pending change not found: {0}")]
    ChangeNotFound(String),

    #[error("{kind} {resource_id} not found")]
    ResourceNotFound {
        kind: ResourceKind,
        resource_id: String,
    },

    #[error("failed to resize {kind} {resource_id}: {source}")]
    MutationFailure {
        kind: ResourceKind,
        resource_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to describe {kind} {resource_id}: {source}")]
    Provider {
        kind: ResourceKind,
        resource_id: String,
        #[source]
        source: ProviderError,
    },

    #[error("invalid change key: {0}")]
    InvalidKey(String),

    #[error("invalid pending change at {key}: {reason}")]
    InvalidRecord { key: String, reason: String },

    #[error("change {key} belongs to {actual}, not {expected}")]
    KindMismatch {
        key: String,
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Invocation status this error is reported with
    pub fn status(&self) -> InvocationStatus {
        match self {
            PipelineError::ChangeNotFound(_)
            | PipelineError::ResourceNotFound { .. }
            | PipelineError::InvalidKey(_)
            | PipelineError::KindMismatch { .. } => InvocationStatus::ClientError,
            PipelineError::SourceUnavailable(_)
            | PipelineError::MutationFailure { .. }
            | PipelineError::Provider { .. }
            | PipelineError::InvalidRecord { .. }
            | PipelineError::Store(_) => InvocationStatus::ServerError,
        }
    }

    /// Short machine-friendly label, used as a metrics label
    pub fn label(&self) -> &'static str {
        match self {
            PipelineError::SourceUnavailable(_) => "source_unavailable",
            PipelineError::ChangeNotFound(_) => "change_not_found",
            PipelineError::ResourceNotFound { .. } => "resource_not_found",
            PipelineError::MutationFailure { .. } => "mutation_failure",
            PipelineError::Provider { .. } => "provider",
            PipelineError::InvalidKey(_) => "invalid_key",
            PipelineError::InvalidRecord { .. } => "invalid_record",
            PipelineError::KindMismatch { .. } => "kind_mismatch",
            PipelineError::Store(_) => "store",
        }
    }
}
