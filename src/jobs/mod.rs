//! Job records and their persistence.
//!
//! # Overview
//!
//! - **model**: the [`Job`] document, its status state machine and stage outputs
//! - **store**: [`JobStore`], which owns merge rules, transition guards and events
//! - **repository**: the [`JobRepository`] port plus an in-memory backend
//! - **redis** / **postgres**: durable backends
//!
//! # Usage
//!
//! ```rust,ignore
//! use reelforge::jobs::{JobInput, JobPatch, JobStatus, JobStore};
//!
//! let store = JobStore::in_memory();
//! let job = store.create_job(JobInput::audio("https://cdn.example.com/note.m4a", 30, 60), None).await?;
//!
//! // Salvage: patch a recovered field, then re-run the pipeline.
//! store.update_job(&job.id, JobPatch::new().video_url("https://cdn.example.com/v.mp4")).await?;
//! ```

pub mod migrations;
pub mod model;
pub mod postgres;
pub mod redis;
pub mod repository;
pub mod schema;
pub mod store;

pub use model::{
    Job, JobInput, JobPatch, JobSource, JobStatus, LogoPosition, MediaAsset, MediaProvider,
    MusicChoice, Plan, SegmentContent, SelectionSource, StyleOptions, Subtitles, Voiceover,
};
pub use postgres::{MigrationError, PostgresJobRepository};
pub use self::redis::RedisJobRepository;
pub use repository::{InMemoryJobRepository, JobRepository};
pub use store::{DurationLimits, JobEvent, JobStore};
