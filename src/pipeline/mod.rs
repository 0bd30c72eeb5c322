//! Resumable job pipeline.
//!
//! # Architecture
//!
//! - **Config**: [`PipelineConfig`], retry policy, timeouts and segment math parameters
//! - **Segments**: segment count math and script payload normalization
//! - **Manifest**: the render manifest built from stage outputs
//! - **Orchestrator**: [`PipelineOrchestrator`], the per-job state machine driver
//!
//! # Pipeline Flow
//!
//! `pending → transcribing → planning → generating_commentary →
//! synthesizing_voiceover → selecting_music → generating_images →
//! generating_subtitles → building_manifest → rendering → completed`,
//! with `failed` reachable from any stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reelforge::jobs::{JobInput, JobStore};
//! use reelforge::pipeline::{PipelineConfig, PipelineOrchestrator, Ports};
//!
//! let store = Arc::new(JobStore::in_memory());
//! let ports = Ports::new(transcriber, planner, voice, subtitles, images, renderer);
//! let orchestrator = PipelineOrchestrator::new(store.clone(), ports, PipelineConfig::default());
//!
//! let input = JobInput::audio("https://cdn.example.com/note.m4a", 30, 60).with_consent(true);
//! let job = store.create_job(input, None).await?;
//! let finished = orchestrator.run(&job.id).await?;
//! println!("{:?}", finished.final_video_url);
//! ```

pub mod config;
pub mod manifest;
pub mod orchestrator;
pub mod segments;

pub use config::{ConfigError, PipelineConfig, MAX_SEGMENTS};
pub use manifest::{build_manifest, Manifest, ManifestError};
pub use orchestrator::{validate_input, PipelineError, PipelineOrchestrator, Ports};
pub use segments::{normalize_segments, reconcile_plan, segment_count};
