//! Job record, status state machine and stage outputs.
//!
//! A [`Job`] is created once, then filled in stage by stage. Each optional
//! field is written by exactly one stage; its presence is what makes the
//! stage count as done when the pipeline is re-run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::manifest::Manifest;

/// Status of a job. Stages are listed in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Transcribing,
    Planning,
    GeneratingCommentary,
    SynthesizingVoiceover,
    SelectingMusic,
    GeneratingImages,
    GeneratingSubtitles,
    BuildingManifest,
    Rendering,
    Completed,
    Failed,
}

impl JobStatus {
    /// The in-progress stages in execution order.
    pub const STAGES: [JobStatus; 9] = [
        JobStatus::Transcribing,
        JobStatus::Planning,
        JobStatus::GeneratingCommentary,
        JobStatus::SynthesizingVoiceover,
        JobStatus::SelectingMusic,
        JobStatus::GeneratingImages,
        JobStatus::GeneratingSubtitles,
        JobStatus::BuildingManifest,
        JobStatus::Rendering,
    ];

    /// Position in the forward order. `Failed` sits outside the order.
    fn rank(self) -> Option<usize> {
        match self {
            JobStatus::Pending => Some(0),
            JobStatus::Transcribing => Some(1),
            JobStatus::Planning => Some(2),
            JobStatus::GeneratingCommentary => Some(3),
            JobStatus::SynthesizingVoiceover => Some(4),
            JobStatus::SelectingMusic => Some(5),
            JobStatus::GeneratingImages => Some(6),
            JobStatus::GeneratingSubtitles => Some(7),
            JobStatus::BuildingManifest => Some(8),
            JobStatus::Rendering => Some(9),
            JobStatus::Completed => Some(10),
            JobStatus::Failed => None,
        }
    }

    /// True for the stage statuses between `pending` and `completed`.
    pub fn is_in_progress(self) -> bool {
        Self::STAGES.contains(&self)
    }

    /// True once nothing more will happen without outside intervention.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Allowed: staying put, forward moves (including skips), any
    /// non-completed state to `failed`, and `failed` back into an
    /// in-progress stage. `completed` accepts nothing.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self == JobStatus::Completed {
            return false;
        }
        if self == next || next == JobStatus::Failed {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (None, _) => next.is_in_progress(),
            (Some(_), None) => false,
        }
    }

    /// Snake-case label, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Transcribing => "transcribing",
            JobStatus::Planning => "planning",
            JobStatus::GeneratingCommentary => "generating_commentary",
            JobStatus::SynthesizingVoiceover => "synthesizing_voiceover",
            JobStatus::SelectingMusic => "selecting_music",
            JobStatus::GeneratingImages => "generating_images",
            JobStatus::GeneratingSubtitles => "generating_subtitles",
            JobStatus::BuildingManifest => "building_manifest",
            JobStatus::Rendering => "rendering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the raw material for a job comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JobSource {
    /// A recorded voice note, transcribed into the script source.
    Audio { url: String },
    /// A website whose text becomes the script source.
    Website { url: String },
}

impl JobSource {
    pub fn url(&self) -> &str {
        match self {
            JobSource::Audio { url } | JobSource::Website { url } => url,
        }
    }
}

/// Placement of a brand logo in the rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoPosition {
    Beginning,
    End,
    Overlay,
}

impl FromStr for LogoPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginning" => Ok(LogoPosition::Beginning),
            "end" => Ok(LogoPosition::End),
            "overlay" => Ok(LogoPosition::Overlay),
            other => Err(format!(
                "invalid logo position '{}': expected beginning, end or overlay",
                other
            )),
        }
    }
}

/// Presentation options chosen by the requester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleOptions {
    /// Prefer one generated video clip over still images.
    #[serde(default)]
    pub animated: bool,
    /// Voice preset passed to the synthesizer.
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    /// One of `beginning`, `end`, `overlay`; checked before the first stage.
    #[serde(default)]
    pub logo_position: Option<String>,
    /// Extra music tags merged with the plan's tags.
    #[serde(default)]
    pub music_tags: Vec<String>,
}

/// The original request. Never modified after creation, apart from the
/// duration clamp applied by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub source: JobSource,
    pub min_duration_seconds: u32,
    pub max_duration_seconds: u32,
    #[serde(default)]
    pub style: StyleOptions,
    /// The requester confirmed they own or may use the source material.
    #[serde(default)]
    pub consent: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl JobInput {
    /// Creates an input for a voice note with consent given.
    pub fn audio(url: impl Into<String>, min_seconds: u32, max_seconds: u32) -> Self {
        Self {
            source: JobSource::Audio { url: url.into() },
            min_duration_seconds: min_seconds,
            max_duration_seconds: max_seconds,
            style: StyleOptions::default(),
            consent: true,
            webhook_url: None,
        }
    }

    /// Creates an input for a website with consent given.
    pub fn website(url: impl Into<String>, min_seconds: u32, max_seconds: u32) -> Self {
        Self {
            source: JobSource::Website { url: url.into() },
            ..Self::audio("", min_seconds, max_seconds)
        }
    }

    pub fn with_style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }

    pub fn with_consent(mut self, consent: bool) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }
}

/// Outline produced by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub title: String,
    /// Clamped into the job's duration bounds.
    pub target_duration_seconds: f64,
    /// Always the computed count, whatever the planner proposed.
    pub segment_count: u32,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub music_tags: Vec<String>,
    #[serde(default)]
    pub music_description: Option<String>,
}

/// One narrated beat of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentContent {
    pub index: u32,
    pub text: String,
    pub image_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voiceover {
    pub url: String,
    pub duration_seconds: f64,
}

/// Fallback-chain provider that produced a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionSource {
    ExternalCatalog,
    InternalCatalog,
    Generated,
}

impl SelectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionSource::ExternalCatalog => "externalCatalog",
            SelectionSource::InternalCatalog => "internalCatalog",
            SelectionSource::Generated => "generated",
        }
    }
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the music stage. `Silent` records that the chain came up
/// empty, so the stage is still considered done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MusicChoice {
    #[serde(rename_all = "camelCase")]
    Track {
        url: String,
        source: SelectionSource,
        track_id: String,
    },
    Silent,
}

impl MusicChoice {
    pub fn url(&self) -> Option<&str> {
        match self {
            MusicChoice::Track { url, .. } => Some(url),
            MusicChoice::Silent => None,
        }
    }
}

/// Which image provider produced a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaProvider {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub index: u32,
    pub url: String,
    pub prompt: String,
    pub provider: MediaProvider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtitles {
    pub url: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// A persisted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub input: JobInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentContent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover: Option<Voiceover>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaAsset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<Subtitles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a pending job with both timestamps set to now.
    pub fn new(id: impl Into<String>, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            input,
            transcript: None,
            plan: None,
            segments: None,
            voiceover: None,
            music: None,
            media: None,
            video_url: None,
            subtitles: None,
            manifest: None,
            final_video_url: None,
            error: None,
            current_step: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the output owned by `stage` is already present.
    pub fn stage_done(&self, stage: JobStatus) -> bool {
        match stage {
            JobStatus::Pending => true,
            JobStatus::Transcribing => self.transcript.is_some(),
            JobStatus::Planning => self.plan.is_some(),
            JobStatus::GeneratingCommentary => self.segments.is_some(),
            JobStatus::SynthesizingVoiceover => self.voiceover.is_some(),
            JobStatus::SelectingMusic => self.music.is_some(),
            JobStatus::GeneratingImages => self.media.is_some() || self.video_url.is_some(),
            JobStatus::GeneratingSubtitles => self.subtitles.is_some(),
            JobStatus::BuildingManifest => self.manifest.is_some(),
            JobStatus::Rendering => self.final_video_url.is_some(),
            JobStatus::Completed => self.status == JobStatus::Completed,
            JobStatus::Failed => false,
        }
    }

    /// First stage whose output is still missing.
    pub fn next_pending_stage(&self) -> Option<JobStatus> {
        JobStatus::STAGES
            .iter()
            .copied()
            .find(|stage| !self.stage_done(*stage))
    }

    /// Advances `updated_at`, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Partial update merged into a job. `None` leaves a field untouched;
/// overlapping fields follow last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub segments: Option<Vec<SegmentContent>>,
    #[serde(default)]
    pub voiceover: Option<Voiceover>,
    #[serde(default)]
    pub music: Option<MusicChoice>,
    #[serde(default)]
    pub media: Option<Vec<MediaAsset>>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub subtitles: Option<Subtitles>,
    #[serde(default)]
    pub manifest: Option<Manifest>,
    #[serde(default)]
    pub final_video_url: Option<String>,
    #[serde(default)]
    pub current_step: Option<String>,
    /// Drops a stored error message (used when salvaging).
    #[serde(default)]
    pub clear_error: bool,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn segments(mut self, segments: Vec<SegmentContent>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn voiceover(mut self, voiceover: Voiceover) -> Self {
        self.voiceover = Some(voiceover);
        self
    }

    pub fn music(mut self, music: MusicChoice) -> Self {
        self.music = Some(music);
        self
    }

    pub fn media(mut self, media: Vec<MediaAsset>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    pub fn subtitles(mut self, subtitles: Subtitles) -> Self {
        self.subtitles = Some(subtitles);
        self
    }

    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn final_video_url(mut self, url: impl Into<String>) -> Self {
        self.final_video_url = Some(url.into());
        self
    }

    pub fn current_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.clear_error = true;
        self
    }

    /// True when applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merges the patch into `job`. Timestamps are left to the caller.
    pub fn apply(self, job: &mut Job) {
        if let Some(v) = self.transcript {
            job.transcript = Some(v);
        }
        if let Some(v) = self.plan {
            job.plan = Some(v);
        }
        if let Some(v) = self.segments {
            job.segments = Some(v);
        }
        if let Some(v) = self.voiceover {
            job.voiceover = Some(v);
        }
        if let Some(v) = self.music {
            job.music = Some(v);
        }
        if let Some(v) = self.media {
            job.media = Some(v);
        }
        if let Some(v) = self.video_url {
            job.video_url = Some(v);
        }
        if let Some(v) = self.subtitles {
            job.subtitles = Some(v);
        }
        if let Some(v) = self.manifest {
            job.manifest = Some(v);
        }
        if let Some(v) = self.final_video_url {
            job.final_video_url = Some(v);
        }
        if let Some(v) = self.current_step {
            job.current_step = Some(v);
        }
        if self.clear_error {
            job.error = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("job-1", JobInput::audio("https://cdn.example.com/note.m4a", 30, 60))
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::GeneratingCommentary).unwrap();
        assert_eq!(json, "\"generating_commentary\"");
        let status: JobStatus = serde_json::from_str("\"selecting_music\"").unwrap();
        assert_eq!(status, JobStatus::SelectingMusic);
        assert_eq!(JobStatus::BuildingManifest.to_string(), "building_manifest");
    }

    #[test]
    fn test_forward_transitions_and_skips() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Transcribing));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Rendering));
        assert!(JobStatus::Planning.can_transition_to(JobStatus::Planning));
        assert!(JobStatus::Rendering.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Rendering.can_transition_to(JobStatus::Planning));
        assert!(!JobStatus::Planning.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_failed_transitions() {
        for stage in JobStatus::STAGES {
            assert!(stage.can_transition_to(JobStatus::Failed));
            assert!(JobStatus::Failed.can_transition_to(stage));
        }
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_completed_is_final() {
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Rendering));
        assert!(JobStatus::Completed.is_terminal());
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let mut job = job();
        job.video_url = Some("https://cdn.example.com/clip.mp4".to_string());
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["status"], "pending");
        assert_eq!(value["videoUrl"], "https://cdn.example.com/clip.mp4");
        assert_eq!(value["input"]["minDurationSeconds"], 30);
        assert_eq!(value["input"]["source"]["kind"], "audio");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("transcript").is_none());

        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn test_music_choice_serialization() {
        let track = MusicChoice::Track {
            url: "https://music.example.com/a.mp3".to_string(),
            source: SelectionSource::InternalCatalog,
            track_id: "a".to_string(),
        };
        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(value["kind"], "track");
        assert_eq!(value["source"], "internalCatalog");
        assert_eq!(value["trackId"], "a");

        let silent = serde_json::to_value(MusicChoice::Silent).unwrap();
        assert_eq!(silent["kind"], "silent");
    }

    #[test]
    fn test_stage_done_and_next_pending() {
        let mut job = job();
        assert_eq!(job.next_pending_stage(), Some(JobStatus::Transcribing));

        job.transcript = Some("hello".to_string());
        assert_eq!(job.next_pending_stage(), Some(JobStatus::Planning));

        job.video_url = Some("https://cdn.example.com/clip.mp4".to_string());
        assert!(job.stage_done(JobStatus::GeneratingImages));
        assert!(!job.stage_done(JobStatus::GeneratingSubtitles));
    }

    #[test]
    fn test_patch_apply_merges_and_clears_error() {
        let mut job = job();
        job.error = Some("render failed".to_string());
        job.transcript = Some("old".to_string());

        JobPatch::new()
            .transcript("new")
            .video_url("https://cdn.example.com/v.mp4")
            .clear_error()
            .apply(&mut job);

        assert_eq!(job.transcript.as_deref(), Some("new"));
        assert_eq!(job.video_url.as_deref(), Some("https://cdn.example.com/v.mp4"));
        assert!(job.error.is_none());
        assert!(job.plan.is_none());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(JobPatch::new().is_empty());
        assert!(!JobPatch::new().clear_error().is_empty());
    }

    #[test]
    fn test_logo_position_parse() {
        assert_eq!("Overlay".parse::<LogoPosition>(), Ok(LogoPosition::Overlay));
        assert!("middle".parse::<LogoPosition>().is_err());
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut job = job();
        let before = job.updated_at;
        job.touch();
        assert!(job.updated_at >= before);
    }
}
