//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by reelforge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, Gauge, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all reelforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total number of jobs that reached a terminal state, labeled by status.
pub static JOBS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Stage execution duration in seconds, labeled by stage and outcome.
pub static STAGE_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Total retries issued against external providers, labeled by operation.
pub static PROVIDER_RETRIES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Total music selections, labeled by the fallback-chain source that won.
pub static MUSIC_SELECTIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Per-item failures recovered by a fallback provider, labeled by operation.
pub static ITEM_FALLBACKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Number of batch jobs currently holding a concurrency permit.
pub static JOBS_IN_PROGRESS: OnceLock<Gauge> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Should be called once at application startup. Calling it again is harmless:
/// the statics keep the first registration.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let jobs_total = CounterVec::new(
        Opts::new(
            "reelforge_jobs_total",
            "Total number of jobs that reached a terminal state",
        ),
        &["status"],
    )?;

    let stage_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "reelforge_stage_duration_seconds",
            "Pipeline stage duration in seconds",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0]),
        &["stage", "outcome"],
    )?;

    let provider_retries_total = CounterVec::new(
        Opts::new(
            "reelforge_provider_retries_total",
            "Total retries issued against external providers",
        ),
        &["operation"],
    )?;

    let music_selections_total = CounterVec::new(
        Opts::new(
            "reelforge_music_selections_total",
            "Total music selections by winning source",
        ),
        &["source"],
    )?;

    let item_fallbacks_total = CounterVec::new(
        Opts::new(
            "reelforge_item_fallbacks_total",
            "Per-item failures recovered by a fallback provider",
        ),
        &["operation"],
    )?;

    let jobs_in_progress = Gauge::new(
        "reelforge_jobs_in_progress",
        "Number of batch jobs currently holding a concurrency permit",
    )?;

    registry.register(Box::new(jobs_total.clone()))?;
    registry.register(Box::new(stage_duration.clone()))?;
    registry.register(Box::new(provider_retries_total.clone()))?;
    registry.register(Box::new(music_selections_total.clone()))?;
    registry.register(Box::new(item_fallbacks_total.clone()))?;
    registry.register(Box::new(jobs_in_progress.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = JOBS_TOTAL.set(jobs_total);
    let _ = STAGE_DURATION.set(stage_duration);
    let _ = PROVIDER_RETRIES_TOTAL.set(provider_retries_total);
    let _ = MUSIC_SELECTIONS_TOTAL.set(music_selections_total);
    let _ = ITEM_FALLBACKS_TOTAL.set(item_fallbacks_total);
    let _ = JOBS_IN_PROGRESS.set(jobs_in_progress);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, returns a
/// comment line describing the problem instead.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
