//! Observability infrastructure for the rightsizing pipeline
//!
//! Provides:
//! - Prometheus metrics (run latency, upserts, skips, apply outcomes, failures)
//! - Structured JSON logging with tracing

use crate::applier::ApplyOutcome;
use crate::error::PipelineError;
use crate::harvester::HarvestReport;
use crate::models::ResourceKind;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for run durations (in seconds)
const RUN_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    harvest_duration_seconds: HistogramVec,
    apply_duration_seconds: HistogramVec,
    changes_upserted: IntCounterVec,
    recommendations_skipped: IntCounterVec,
    apply_outcomes: IntCounterVec,
    run_failures: IntCounterVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            harvest_duration_seconds: register_histogram_vec!(
                "rightsizer_harvest_duration_seconds",
                "Time spent in a harvest run",
                &["kind"],
                RUN_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register harvest_duration_seconds"),

            apply_duration_seconds: register_histogram_vec!(
                "rightsizer_apply_duration_seconds",
                "Time spent in an apply run",
                &["kind"],
                RUN_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register apply_duration_seconds"),

            changes_upserted: register_int_counter_vec!(
                "rightsizer_changes_upserted_total",
                "Pending changes written by harvest runs",
                &["kind"]
            )
            .expect("Failed to register changes_upserted"),

            recommendations_skipped: register_int_counter_vec!(
                "rightsizer_recommendations_skipped_total",
                "Recommendations passed over by harvest runs",
                &["kind", "reason"]
            )
            .expect("Failed to register recommendations_skipped"),

            apply_outcomes: register_int_counter_vec!(
                "rightsizer_apply_outcomes_total",
                "Apply runs by outcome",
                &["kind", "outcome"]
            )
            .expect("Failed to register apply_outcomes"),

            run_failures: register_int_counter_vec!(
                "rightsizer_run_failures_total",
                "Harvest and apply runs that failed",
                &["phase", "kind"]
            )
            .expect("Failed to register run_failures"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    /// Record a finished harvest run
    pub fn record_harvest(&self, report: &HarvestReport, duration_secs: f64) {
        let kind = report.kind.as_str();
        let inner = self.inner();

        inner
            .harvest_duration_seconds
            .with_label_values(&[kind])
            .observe(duration_secs);
        inner
            .changes_upserted
            .with_label_values(&[kind])
            .inc_by(report.upserted as u64);

        for skipped in &report.skipped {
            inner
                .recommendations_skipped
                .with_label_values(&[kind, skipped.reason.as_str()])
                .inc();
        }
    }

    /// Record a finished apply run
    pub fn record_apply(&self, kind: ResourceKind, outcome: &ApplyOutcome, duration_secs: f64) {
        let inner = self.inner();
        inner
            .apply_duration_seconds
            .with_label_values(&[kind.as_str()])
            .observe(duration_secs);
        inner
            .apply_outcomes
            .with_label_values(&[kind.as_str(), outcome.label()])
            .inc();
    }

    /// Record a failed run; `kind` is `None` when the trigger named no valid kind
    pub fn record_failure(&self, phase: &str, kind: Option<ResourceKind>) {
        let kind = kind.map(|k| k.as_str()).unwrap_or("unknown");
        self.inner()
            .run_failures
            .with_label_values(&[phase, kind])
            .inc();
    }
}

/// Structured logger for pipeline events
///
/// Every event carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, role: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            role = %role,
            "Rightsizer started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Rightsizer shutting down"
        );
    }

    pub fn log_harvest(&self, report: &HarvestReport) {
        info!(
            event = "harvest_completed",
            instance = %self.instance,
            kind = %report.kind,
            listed = report.listed,
            upserted = report.upserted,
            skipped = report.skipped.len(),
            duration_ms = report.duration_ms,
            "Harvest run completed"
        );

        for skipped in &report.skipped {
            info!(
                event = "recommendation_skipped",
                instance = %self.instance,
                kind = %report.kind,
                subject = %skipped.subject,
                reason = skipped.reason.as_str(),
                "Recommendation skipped"
            );
        }
    }

    pub fn log_harvest_failed(&self, kind: ResourceKind, err: &PipelineError) {
        error!(
            event = "harvest_failed",
            instance = %self.instance,
            kind = %kind,
            error = %err,
            "Harvest run failed"
        );
    }

    pub fn log_apply(&self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied {
                key, value, detail, ..
            } => {
                info!(
                    event = "change_applied",
                    instance = %self.instance,
                    key = %key,
                    value = %value,
                    detail = %detail,
                    "Sizing change applied"
                );
            }
            ApplyOutcome::Rejected {
                key, current_state, ..
            } => {
                warn!(
                    event = "change_rejected",
                    instance = %self.instance,
                    key = %key,
                    current_state = %current_state,
                    "Sizing change rejected, resource not eligible"
                );
            }
        }
    }

    pub fn log_apply_failed(&self, key: &str, err: &PipelineError) {
        error!(
            event = "apply_failed",
            instance = %self.instance,
            key = %key,
            error = %err,
            error_class = err.label(),
            "Apply run failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvester::{SkipReason, SkippedRecommendation};
    use chrono::Utc;

    #[test]
    fn test_pipeline_metrics_recording() {
        let metrics = PipelineMetrics::new();
        let report = HarvestReport {
            kind: ResourceKind::ComputeInstance,
            listed: 2,
            upserted: 1,
            upserted_keys: vec!["ComputeInstance/i-1".to_string()],
            skipped: vec![SkippedRecommendation {
                subject: "arn:aws:ec2:r:1:instance/i-2".to_string(),
                reason: SkipReason::ResourceMissing,
            }],
            started_at: Utc::now(),
            duration_ms: 12,
        };

        metrics.record_harvest(&report, 0.012);
        metrics.record_failure("apply", None);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "rightsizer_changes_upserted_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("rightsizer-0");
        assert_eq!(logger.instance, "rightsizer-0");
    }
}
