//! Capability ports consumed by the pipeline.
//!
//! Every external service (transcription, LLM planning, TTS, catalogs,
//! image/video generation, render, notification) is reached through one of
//! these traits. Optional capabilities are passed around as
//! `Option<Arc<dyn Port>>`; an absent port is a configuration fact, not an
//! error, unless the stage that needs it actually runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::jobs::{Job, JobEvent, Plan, Subtitles, Voiceover};
use crate::pipeline::manifest::Manifest;

/// Audio URL to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_url: &str) -> Result<String, ProviderError>;
}

/// Site URL to readable text.
#[async_trait]
pub trait WebsiteReader: Send + Sync {
    async fn read(&self, url: &str) -> Result<String, ProviderError>;
}

/// Input to the planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub transcript: String,
    pub min_duration_seconds: u32,
    pub max_duration_seconds: u32,
}

/// LLM planning and script writing.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Proposes a plan. Its target duration and segment count are advisory.
    async fn plan(&self, request: &PlanRequest) -> Result<Plan, ProviderError>;

    /// Writes the per-segment script. The payload is whatever the model
    /// produced (array, wrapper object, numbered keys or a JSON string) and
    /// is normalized by the caller.
    async fn write_segments(
        &self,
        transcript: &str,
        plan: &Plan,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Text to speech.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Voiceover, ProviderError>;
}

/// A candidate asset, e.g. a music track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub duration_seconds: f64,
    pub url: String,
    #[serde(default)]
    pub is_generated: bool,
}

impl Track {
    pub fn new(id: impl Into<String>, url: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            duration_seconds,
            url: url.into(),
            is_generated: false,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Catalog query. Empty `tags` or an absent window means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub min_duration_seconds: Option<f64>,
    #[serde(default)]
    pub max_duration_seconds: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Searchable store of candidate assets.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<Track>, ProviderError>;

    async fn get(&self, id: &str) -> Result<Option<Track>, ProviderError>;
}

/// Generates a new asset from a description.
#[async_trait]
pub trait ResourceGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, duration_seconds: f64) -> Result<Track, ProviderError>;
}

/// Subtitles for a synthesized voiceover.
#[async_trait]
pub trait SubtitleGenerator: Send + Sync {
    async fn generate(&self, audio_url: &str, script: &str) -> Result<Subtitles, ProviderError>;
}

/// Prompt to image URL.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Request for one generated video clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub prompt: String,
    pub duration_seconds: f64,
}

/// State of a submitted video generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum VideoStatus {
    Pending,
    Succeeded { url: String },
    Failed { reason: String },
}

/// Long-running video generation: submit once, poll until done.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Returns a provider task id.
    async fn submit(&self, request: &VideoRequest) -> Result<String, ProviderError>;

    async fn poll(&self, task_id: &str) -> Result<VideoStatus, ProviderError>;
}

/// Manifest to final video URL.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, manifest: &Manifest) -> Result<String, ProviderError>;
}

/// Status-change, completion and error hooks.
///
/// Failures are reported to the caller, which logs them; a notifier can
/// never fail a job.
#[async_trait]
pub trait JobNotifier: Send + Sync {
    async fn status_changed(&self, job: &Job, event: &JobEvent) -> Result<(), ProviderError>;

    async fn completed(&self, job: &Job) -> Result<(), ProviderError>;

    async fn failed(&self, job: &Job) -> Result<(), ProviderError>;
}
