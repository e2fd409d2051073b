//! Apply phase
//!
//! Reacts to a change notification: reloads the pending change, re-checks the
//! live resource and applies the recommended value when the resource is
//! eligible. The pending change itself is left untouched; it is refreshed by
//! the next harvest.

use crate::adapter::{Eligibility, ResourceAdapter};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ChangeKey, SizingValue};
use crate::store::{load_pending_change, StateStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of an apply run that did not fail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The recommended value was applied to the live resource
    Applied {
        key: String,
        resource_id: String,
        value: SizingValue,
        detail: String,
        applied_at: DateTime<Utc>,
    },
    /// The live resource is in a state that forbids resizing; nothing was changed
    Rejected {
        key: String,
        resource_id: String,
        current_state: String,
        rejected_at: DateTime<Utc>,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied { .. } => "applied",
            ApplyOutcome::Rejected { .. } => "rejected",
        }
    }
}

/// Run one apply for the change stored at `change_key`
pub async fn apply<A: ResourceAdapter>(
    change_key: &ChangeKey,
    store: &dyn StateStore,
    adapter: &A,
) -> PipelineResult<ApplyOutcome> {
    let kind = adapter.kind();
    let key = change_key.to_string();

    if change_key.kind != kind {
        return Err(PipelineError::KindMismatch {
            key,
            expected: kind,
            actual: change_key.kind,
        });
    }

    let change = load_pending_change(store, change_key)
        .await?
        .ok_or_else(|| PipelineError::ChangeNotFound(key.clone()))?;

    let resource_id = change.resource_id.as_str();

    let state = adapter
        .describe(resource_id)
        .await
        .map_err(|source| PipelineError::Provider {
            kind,
            resource_id: resource_id.to_string(),
            source,
        })?
        .ok_or_else(|| PipelineError::ResourceNotFound {
            kind,
            resource_id: resource_id.to_string(),
        })?;

    if let Eligibility::Blocked { state: blocking } = adapter.eligibility(&state) {
        warn!(
            key = %key,
            current_state = %blocking,
            "Resource not eligible for resizing, leaving unchanged"
        );
        return Ok(ApplyOutcome::Rejected {
            key,
            resource_id: resource_id.to_string(),
            current_state: blocking,
            rejected_at: Utc::now(),
        });
    }

    let applied = adapter
        .apply_sizing(resource_id, &change.recommended_value, &state)
        .await
        .map_err(|source| PipelineError::MutationFailure {
            kind,
            resource_id: resource_id.to_string(),
            source,
        })?;

    info!(key = %key, value = %applied.value, detail = %applied.detail, "Applied sizing change");

    Ok(ApplyOutcome::Applied {
        key,
        resource_id: resource_id.to_string(),
        value: applied.value,
        detail: applied.detail,
        applied_at: Utc::now(),
    })
}
