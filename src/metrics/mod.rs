//! Metrics module for Prometheus-based monitoring.
//!
//! Records job outcomes, stage durations, provider retries, fallback-chain
//! selections and batch concurrency.
//!
//! # Example
//!
//! ```ignore
//! use reelforge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//!
//! let collector = MetricsCollector::new();
//! collector.record_stage("rendering", true, std::time::Duration::from_secs(42));
//!
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    ITEM_FALLBACKS_TOTAL, JOBS_IN_PROGRESS, JOBS_TOTAL, MUSIC_SELECTIONS_TOTAL,
    PROVIDER_RETRIES_TOTAL, REGISTRY, STAGE_DURATION,
};
