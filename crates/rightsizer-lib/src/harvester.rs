//! Harvest phase
//!
//! Pulls recommendations for one resource kind, resolves each to a live
//! resource and upserts a pending change per resource. Eligibility is not
//! checked here; it is re-evaluated at apply time.

use crate::adapter::ResourceAdapter;
use crate::error::{PipelineError, PipelineResult, StoreError};
use crate::models::{ChangeKey, PendingChange, ResourceKind};
use crate::source::RecommendationSource;
use crate::store::{save_pending_change, StateStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Why a recommendation record did not produce a pending change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The subject did not contain a usable resource id
    UnparseableSubject,
    /// The resource no longer exists
    ResourceMissing,
    /// Resolving the resource failed
    LookupFailed,
    /// The record carried no ranked options
    NoOptions,
    /// The resource id cannot form a state store key
    InvalidKey,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnparseableSubject => "unparseable_subject",
            SkipReason::ResourceMissing => "resource_missing",
            SkipReason::LookupFailed => "lookup_failed",
            SkipReason::NoOptions => "no_options",
            SkipReason::InvalidKey => "invalid_key",
        }
    }
}

/// A record the harvest run passed over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecommendation {
    pub subject: String,
    pub reason: SkipReason,
}

/// Summary of one harvest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
    pub kind: ResourceKind,
    /// Records received from the recommendation source
    pub listed: usize,
    /// Pending changes written
    pub upserted: usize,
    pub upserted_keys: Vec<String>,
    pub skipped: Vec<SkippedRecommendation>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl HarvestReport {
    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}

/// Run one harvest for the adapter's resource kind
///
/// Listing failures and store write failures abort the run. Anything that
/// goes wrong with a single record, including a resource id the store
/// cannot key, only skips that record.
pub async fn harvest<A: ResourceAdapter>(
    source: &dyn RecommendationSource,
    adapter: &A,
    store: &dyn StateStore,
) -> PipelineResult<HarvestReport> {
    let kind = adapter.kind();
    let started_at = Utc::now();
    let start = Instant::now();

    let recommendations = source
        .list_recommendations(kind)
        .await
        .map_err(PipelineError::SourceUnavailable)?;

    debug!(kind = %kind, count = recommendations.len(), "Listed recommendations");

    let mut report = HarvestReport {
        kind,
        listed: recommendations.len(),
        upserted: 0,
        upserted_keys: Vec::new(),
        skipped: Vec::new(),
        started_at,
        duration_ms: 0,
    };

    for recommendation in recommendations {
        let skip = |reason: SkipReason| SkippedRecommendation {
            subject: recommendation.subject.clone(),
            reason,
        };

        let Some(resource_id) = adapter.extract_resource_id(&recommendation) else {
            warn!(kind = %kind, subject = %recommendation.subject, "Could not extract resource id");
            report.skipped.push(skip(SkipReason::UnparseableSubject));
            continue;
        };

        match adapter.exists(&resource_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(kind = %kind, resource_id = %resource_id, "Resource not found, skipping");
                report.skipped.push(skip(SkipReason::ResourceMissing));
                continue;
            }
            Err(e) => {
                warn!(kind = %kind, resource_id = %resource_id, error = %e, "Failed to resolve resource, skipping");
                report.skipped.push(skip(SkipReason::LookupFailed));
                continue;
            }
        }

        let Some(recommended_value) = recommendation.top_option().cloned() else {
            debug!(kind = %kind, resource_id = %resource_id, "No recommendation options, skipping");
            report.skipped.push(skip(SkipReason::NoOptions));
            continue;
        };

        let change = PendingChange {
            resource_id,
            resource_kind: kind,
            current_value: recommendation.current_value.clone(),
            recommended_value,
            last_updated: Utc::now(),
        };

        // A key the applier could not parse back would never be applied
        if let Err(e) = ChangeKey::parse(&change.key().to_string()) {
            warn!(kind = %kind, resource_id = %change.resource_id, error = %e, "Resource id does not form a valid key, skipping");
            report.skipped.push(skip(SkipReason::InvalidKey));
            continue;
        }

        let key = match save_pending_change(store, &change).await {
            Ok(key) => key,
            Err(PipelineError::Store(StoreError::InvalidKey(key))) => {
                warn!(kind = %kind, key = %key, "State store rejected key, skipping");
                report.skipped.push(skip(SkipReason::InvalidKey));
                continue;
            }
            Err(e) => return Err(e),
        };
        debug!(
            key = %key,
            current = %change.current_value,
            recommended = %change.recommended_value,
            "Upserted pending change"
        );

        report.upserted += 1;
        report.upserted_keys.push(key.to_string());
    }

    report.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        kind = %kind,
        listed = report.listed,
        upserted = report.upserted,
        skipped = report.skipped.len(),
        duration_ms = report.duration_ms,
        "Harvest complete"
    );

    Ok(report)
}
