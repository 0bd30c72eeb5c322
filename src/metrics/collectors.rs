//! High-level metric recording for pipeline operations.
//!
//! `MetricsCollector` wraps the raw Prometheus statics. Every method is a
//! no-op until `init_metrics()` has run, so library code and tests can record
//! freely without touching global state.

use std::time::Duration;

use super::prometheus::{
    ITEM_FALLBACKS_TOTAL, JOBS_IN_PROGRESS, JOBS_TOTAL, MUSIC_SELECTIONS_TOTAL,
    PROVIDER_RETRIES_TOTAL, STAGE_DURATION,
};

/// Metrics collector for recording reelforge operational metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Create a new MetricsCollector instance.
    pub fn new() -> Self {
        Self
    }

    /// Record a job reaching a terminal status (`completed` or `failed`).
    pub fn record_job(&self, status: &str) {
        if let Some(jobs_total) = JOBS_TOTAL.get() {
            jobs_total.with_label_values(&[status]).inc();
        }

        tracing::trace!(status = status, "Recorded job metric");
    }

    /// Record the execution of one pipeline stage.
    ///
    /// # Arguments
    ///
    /// * `stage` - Stage label (e.g. "rendering")
    /// * `success` - Whether the stage succeeded
    /// * `duration` - Wall-clock time spent in the stage
    pub fn record_stage(&self, stage: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "failure" };

        if let Some(stage_duration) = STAGE_DURATION.get() {
            stage_duration
                .with_label_values(&[stage, outcome])
                .observe(duration.as_secs_f64());
        }

        tracing::trace!(
            stage = stage,
            outcome = outcome,
            duration_ms = duration.as_millis() as u64,
            "Recorded stage metric"
        );
    }

    /// Record one retry against an external provider.
    pub fn record_retry(&self, operation: &str) {
        if let Some(retries) = PROVIDER_RETRIES_TOTAL.get() {
            retries.with_label_values(&[operation]).inc();
        }
    }

    /// Record which fallback-chain source produced a music selection
    /// (`none` when the chain came up empty).
    pub fn record_music_selection(&self, source: &str) {
        if let Some(selections) = MUSIC_SELECTIONS_TOTAL.get() {
            selections.with_label_values(&[source]).inc();
        }
    }

    /// Record an item recovered by its fallback provider.
    pub fn record_item_fallback(&self, operation: &str) {
        if let Some(fallbacks) = ITEM_FALLBACKS_TOTAL.get() {
            fallbacks.with_label_values(&[operation]).inc();
        }
    }

    /// Increment the count of jobs in progress by 1.
    pub fn inc_jobs_in_progress(&self) {
        if let Some(jobs_in_progress) = JOBS_IN_PROGRESS.get() {
            jobs_in_progress.inc();
        }
    }

    /// Decrement the count of jobs in progress by 1.
    pub fn dec_jobs_in_progress(&self) {
        if let Some(jobs_in_progress) = JOBS_IN_PROGRESS.get() {
            jobs_in_progress.dec();
        }
    }
}
