//! reelforge: resumable multi-stage pipeline for short-form video jobs.
//!
//! This library provides the job store and state machine, the stage
//! orchestrator, the fallback-chain music selector, the bounded-concurrency
//! batch runner and the retry primitive they all share. External services
//! are reached through the capability traits in [`ports`].

// Core modules
pub mod batch;
pub mod cli;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod ports;
pub mod retry;
pub mod selection;
pub mod utils;

// Re-export commonly used types
pub use error::{ProviderError, StoreError};
pub use jobs::{Job, JobInput, JobPatch, JobStatus, JobStore};
pub use pipeline::{PipelineConfig, PipelineError, PipelineOrchestrator, Ports};
