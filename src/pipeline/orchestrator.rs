//! Pipeline orchestrator driving a job through its stages.
//!
//! Each stage follows the same contract:
//! 1. Skip when the job already carries the stage's output
//! 2. Advance the status and fire the status-change hook
//! 3. Call the port through the [`Retrier`]
//! 4. Normalize the output and persist it as a [`JobPatch`]
//!
//! A failing stage marks the job `failed` with a readable message; everything
//! persisted so far stays, so the job can be patched and re-run.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, StoreError};
use crate::jobs::{
    Job, JobEvent, JobInput, JobPatch, JobSource, JobStatus, JobStore, LogoPosition, MediaAsset,
    MediaProvider, MusicChoice, SegmentContent, Subtitles,
};
use crate::metrics::MetricsCollector;
use crate::ports::{
    ImageGenerator, JobNotifier, PlanRequest, Planner, Renderer, SubtitleGenerator, Transcriber,
    VideoGenerator, VideoRequest, VideoStatus, VoiceSynthesizer, WebsiteReader,
};
use crate::retry::Retrier;
use crate::selection::{MusicSelector, SelectionRequest};

use super::config::PipelineConfig;
use super::manifest::{build_manifest, ManifestError};
use super::segments::{normalize_segments, reconcile_plan};

/// Errors that can occur while running a job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading or writing the job record failed.
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    /// An external capability failed after retries.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The job input was rejected before any stage ran.
    #[error("Invalid job input: {0}")]
    Validation(String),

    /// Another invocation is already driving this job.
    #[error("Job {0} is already being processed")]
    JobBusy(String),

    /// A stage ran before the output it depends on existed.
    #[error("Missing {0} required by this stage")]
    MissingInput(&'static str),

    #[error("Cannot build manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// Video generation kept reporting pending past the poll ceiling.
    #[error("Video generation {task_id} did not finish within {waited:?}")]
    VideoTimeout { task_id: String, waited: Duration },

    /// Wraps the error of a named stage.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: JobStatus,
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    fn in_stage(self, stage: JobStatus) -> Self {
        PipelineError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through stage wrappers.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Capabilities the orchestrator calls. Optional ones degrade or fail only
/// the stage that needs them.
#[derive(Clone)]
pub struct Ports {
    pub transcriber: Arc<dyn Transcriber>,
    pub website_reader: Option<Arc<dyn WebsiteReader>>,
    pub planner: Arc<dyn Planner>,
    pub voice: Arc<dyn VoiceSynthesizer>,
    pub music: Option<Arc<MusicSelector>>,
    pub subtitles: Arc<dyn SubtitleGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub fallback_images: Option<Arc<dyn ImageGenerator>>,
    pub video: Option<Arc<dyn VideoGenerator>>,
    pub renderer: Arc<dyn Renderer>,
    pub notifier: Option<Arc<dyn JobNotifier>>,
}

impl Ports {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        planner: Arc<dyn Planner>,
        voice: Arc<dyn VoiceSynthesizer>,
        subtitles: Arc<dyn SubtitleGenerator>,
        images: Arc<dyn ImageGenerator>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            transcriber,
            website_reader: None,
            planner,
            voice,
            music: None,
            subtitles,
            images,
            fallback_images: None,
            video: None,
            renderer,
            notifier: None,
        }
    }

    pub fn with_website_reader(mut self, reader: Arc<dyn WebsiteReader>) -> Self {
        self.website_reader = Some(reader);
        self
    }

    pub fn with_music(mut self, selector: Arc<MusicSelector>) -> Self {
        self.music = Some(selector);
        self
    }

    pub fn with_fallback_images(mut self, images: Arc<dyn ImageGenerator>) -> Self {
        self.fallback_images = Some(images);
        self
    }

    pub fn with_video(mut self, video: Arc<dyn VideoGenerator>) -> Self {
        self.video = Some(video);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn JobNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// Releases the per-job claim when dropped.
struct RunGuard<'a> {
    active: &'a Mutex<HashSet<String>>,
    job_id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut active = match self.active.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(&self.job_id);
    }
}

/// Drives jobs through the stage sequence.
pub struct PipelineOrchestrator {
    store: Arc<JobStore>,
    ports: Ports,
    config: PipelineConfig,
    retrier: Retrier,
    active: Mutex<HashSet<String>>,
    metrics: MetricsCollector,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator whose port calls retry per `config.retry`
    /// and are bounded by `config.call_timeout`.
    pub fn new(store: Arc<JobStore>, ports: Ports, config: PipelineConfig) -> Self {
        let retrier = Retrier::new(config.retry.clone()).with_call_timeout(config.call_timeout);
        Self {
            store,
            ports,
            config,
            retrier,
            active: Mutex::new(HashSet::new()),
            metrics: MetricsCollector::new(),
        }
    }

    /// Replaces the retrier, e.g. to inject deterministic jitter.
    pub fn with_retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs (or resumes) a job until it completes or a stage fails.
    ///
    /// Stages whose output is already present are skipped, so a failed job
    /// that was patched by hand continues from the first missing output.
    /// A completed job is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::JobBusy`] when another invocation holds the job
    /// - [`PipelineError::Store`] when the job does not exist
    /// - the stage error otherwise, after the job has been marked failed
    pub async fn run(&self, job_id: &str) -> Result<Job, PipelineError> {
        let _guard = self.claim(job_id)?;

        let job = self.store.get_job(job_id).await?;
        if job.status == JobStatus::Completed {
            debug!(job_id = %job_id, "Job already completed");
            return Ok(job);
        }

        info!(job_id = %job_id, status = %job.status, "Running job");
        match self.drive(job).await {
            Ok(job) => Ok(job),
            Err(err) => {
                if matches!(err.root(), PipelineError::Store(StoreError::NotFound(_))) {
                    warn!(job_id = %job_id, "Job disappeared while running");
                    return Err(err);
                }
                self.mark_failed(job_id, &err).await;
                Err(err)
            }
        }
    }

    fn claim(&self, job_id: &str) -> Result<RunGuard<'_>, PipelineError> {
        let mut active = match self.active.lock() {
            Ok(active) => active,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !active.insert(job_id.to_string()) {
            return Err(PipelineError::JobBusy(job_id.to_string()));
        }
        Ok(RunGuard {
            active: &self.active,
            job_id: job_id.to_string(),
        })
    }

    async fn drive(&self, mut job: Job) -> Result<Job, PipelineError> {
        validate_input(&job.input)?;

        for stage in JobStatus::STAGES {
            if job.stage_done(stage) {
                debug!(job_id = %job.id, stage = %stage, "Stage already done, skipping");
                continue;
            }

            job = self.advance(&job, stage).await?;

            let started = Instant::now();
            let result = self.execute(stage, &job).await;
            self.metrics
                .record_stage(stage.as_str(), result.is_ok(), started.elapsed());
            let patch = result.map_err(|e| e.in_stage(stage))?;

            job = self.store.update_job(&job.id, patch).await?;
            info!(
                job_id = %job.id,
                stage = %stage,
                duration_ms = started.elapsed().as_millis() as u64,
                "Stage completed"
            );
        }

        // Failed jobs re-enter through an in-progress stage.
        if job.status == JobStatus::Failed {
            job = self.advance(&job, JobStatus::Rendering).await?;
        }
        job = self.advance(&job, JobStatus::Completed).await?;

        self.metrics.record_job(JobStatus::Completed.as_str());
        info!(
            job_id = %job.id,
            final_video_url = job.final_video_url.as_deref().unwrap_or_default(),
            "Job completed"
        );
        if let Some(notifier) = &self.ports.notifier {
            self.run_hook(&job.id, "completed", notifier.completed(&job))
                .await;
        }
        Ok(job)
    }

    async fn advance(&self, job: &Job, to: JobStatus) -> Result<Job, PipelineError> {
        let from = job.status;
        let updated = self.store.update_status(&job.id, to, None).await?;
        if from != to {
            self.notify_status(&updated, from).await;
        }
        Ok(updated)
    }

    async fn mark_failed(&self, job_id: &str, err: &PipelineError) {
        let failed = match self.store.fail_job(job_id, err.to_string()).await {
            Ok(job) => job,
            Err(store_err) => {
                error!(job_id = %job_id, error = %store_err, "Could not mark job failed");
                return;
            }
        };

        self.metrics.record_job(JobStatus::Failed.as_str());
        if let Some(notifier) = &self.ports.notifier {
            self.run_hook(job_id, "failed", notifier.failed(&failed))
                .await;
        }
    }

    async fn notify_status(&self, job: &Job, from: JobStatus) {
        if let Some(notifier) = &self.ports.notifier {
            let event = JobEvent::from_job(job, from);
            self.run_hook(&job.id, "status_changed", notifier.status_changed(job, &event))
                .await;
        }
    }

    /// Awaits a notifier hook for at most `config.call_timeout`. Hook
    /// failures and timeouts are logged only.
    async fn run_hook<F>(&self, job_id: &str, hook: &'static str, call: F)
    where
        F: Future<Output = Result<(), ProviderError>>,
    {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(job_id = %job_id, hook = hook, error = %e, "Notifier hook failed"),
            Err(_) => warn!(
                job_id = %job_id,
                hook = hook,
                timeout_ms = self.config.call_timeout.as_millis() as u64,
                "Notifier hook timed out"
            ),
        }
    }

    async fn execute(&self, stage: JobStatus, job: &Job) -> Result<JobPatch, PipelineError> {
        match stage {
            JobStatus::Transcribing => self.transcribe(job).await,
            JobStatus::Planning => self.plan(job).await,
            JobStatus::GeneratingCommentary => self.write_commentary(job).await,
            JobStatus::SynthesizingVoiceover => self.synthesize(job).await,
            JobStatus::SelectingMusic => self.select_music(job).await,
            JobStatus::GeneratingImages => self.generate_visuals(job).await,
            JobStatus::GeneratingSubtitles => self.generate_subtitles(job).await,
            JobStatus::BuildingManifest => Ok(JobPatch::new().manifest(build_manifest(job)?)),
            JobStatus::Rendering => self.render(job).await,
            JobStatus::Pending | JobStatus::Completed | JobStatus::Failed => Ok(JobPatch::new()),
        }
    }

    async fn transcribe(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let text = match &job.input.source {
            JobSource::Audio { url } => {
                let transcriber = &self.ports.transcriber;
                self.retrier
                    .call("transcribe", || transcriber.transcribe(url))
                    .await?
            }
            JobSource::Website { url } => {
                let reader = self
                    .ports
                    .website_reader
                    .as_ref()
                    .ok_or_else(|| ProviderError::NotConfigured("website reader".to_string()))?;
                self.retrier.call("read_website", || reader.read(url)).await?
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::Malformed("empty transcript".to_string()).into());
        }
        Ok(JobPatch::new().transcript(text))
    }

    async fn plan(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let transcript = job
            .transcript
            .as_deref()
            .ok_or(PipelineError::MissingInput("transcript"))?;
        let request = PlanRequest {
            transcript: transcript.to_string(),
            min_duration_seconds: job.input.min_duration_seconds,
            max_duration_seconds: job.input.max_duration_seconds,
        };

        let planner = &self.ports.planner;
        let proposed = self.retrier.call("plan", || planner.plan(&request)).await?;
        let plan = reconcile_plan(
            proposed,
            job.input.min_duration_seconds,
            job.input.max_duration_seconds,
            self.config.seconds_per_segment,
            self.config.max_segments,
        );
        debug!(
            job_id = %job.id,
            target_seconds = plan.target_duration_seconds,
            segments = plan.segment_count,
            "Plan reconciled"
        );
        Ok(JobPatch::new().plan(plan))
    }

    async fn write_commentary(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let transcript = job
            .transcript
            .as_deref()
            .ok_or(PipelineError::MissingInput("transcript"))?;
        let plan = job.plan.as_ref().ok_or(PipelineError::MissingInput("plan"))?;

        let planner = &self.ports.planner;
        let raw = self
            .retrier
            .call("write_segments", || planner.write_segments(transcript, plan))
            .await?;
        let segments = normalize_segments(raw, plan.segment_count)?;
        Ok(JobPatch::new().segments(segments))
    }

    async fn synthesize(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let segments = job
            .segments
            .as_deref()
            .ok_or(PipelineError::MissingInput("segments"))?;
        let script = script_text(segments);
        let voice_name = job.input.style.voice.as_deref();

        let voice = &self.ports.voice;
        let voiceover = self
            .retrier
            .call("synthesize", || voice.synthesize(&script, voice_name))
            .await?;
        Ok(JobPatch::new().voiceover(voiceover))
    }

    async fn select_music(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let Some(selector) = &self.ports.music else {
            debug!(job_id = %job.id, "No music selector configured");
            return Ok(JobPatch::new().music(MusicChoice::Silent));
        };

        let target = job
            .voiceover
            .as_ref()
            .map(|v| v.duration_seconds)
            .or_else(|| job.plan.as_ref().map(|p| p.target_duration_seconds))
            .unwrap_or(job.input.max_duration_seconds as f64);

        let mut tags: Vec<String> = job.input.style.music_tags.clone();
        let mut request = SelectionRequest::new(target);
        if let Some(plan) = &job.plan {
            tags.extend(plan.music_tags.iter().cloned());
            if let Some(description) = &plan.music_description {
                request = request.with_description(description.clone());
            }
        }
        let request = request.with_tags(tags);

        let choice = match selector.select(&request).await {
            Some(result) => MusicChoice::Track {
                url: result.track.url,
                source: result.source,
                track_id: result.track.id,
            },
            None => MusicChoice::Silent,
        };
        Ok(JobPatch::new().music(choice))
    }

    async fn generate_visuals(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let segments = job
            .segments
            .as_deref()
            .ok_or(PipelineError::MissingInput("segments"))?;

        if job.input.style.animated {
            if let Some(video) = &self.ports.video {
                let url = self.generate_video(job, segments, video).await?;
                return Ok(JobPatch::new().video_url(url));
            }
            debug!(job_id = %job.id, "Animation requested but no video generator, using images");
        }

        let results = futures::future::join_all(
            segments
                .iter()
                .map(|segment| self.generate_image(&job.id, segment)),
        )
        .await;
        let media = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(JobPatch::new().media(media))
    }

    /// One image; a failure on the primary provider is retried once on the
    /// fallback provider before it fails the stage.
    async fn generate_image(
        &self,
        job_id: &str,
        segment: &SegmentContent,
    ) -> Result<MediaAsset, ProviderError> {
        let prompt = segment.image_prompt.as_str();
        let primary = &self.ports.images;

        let (url, provider) = match self.retrier.call("image", || primary.generate(prompt)).await {
            Ok(url) => (url, MediaProvider::Primary),
            Err(err) => {
                let Some(fallback) = &self.ports.fallback_images else {
                    return Err(err);
                };
                warn!(
                    job_id = %job_id,
                    segment = segment.index,
                    error = %err,
                    "Primary image provider failed, using fallback"
                );
                self.metrics.record_item_fallback("image");
                let url = self
                    .retrier
                    .call("image_fallback", || fallback.generate(prompt))
                    .await?;
                (url, MediaProvider::Fallback)
            }
        };

        Ok(MediaAsset {
            index: segment.index,
            url,
            prompt: prompt.to_string(),
            provider,
        })
    }

    async fn generate_video(
        &self,
        job: &Job,
        segments: &[SegmentContent],
        video: &Arc<dyn VideoGenerator>,
    ) -> Result<String, PipelineError> {
        let duration_seconds = job
            .voiceover
            .as_ref()
            .map(|v| v.duration_seconds)
            .or_else(|| job.plan.as_ref().map(|p| p.target_duration_seconds))
            .unwrap_or(job.input.min_duration_seconds as f64);
        let request = VideoRequest {
            prompt: video_prompt(job, segments),
            duration_seconds,
        };

        let task_id = self
            .retrier
            .call("video_submit", || video.submit(&request))
            .await?;
        info!(job_id = %job.id, task_id = %task_id, "Video generation submitted");

        let interval = self.config.video_poll_interval;
        let attempts = self.config.video_max_poll_attempts.max(1);
        for attempt in 1..=attempts {
            match self.retrier.call("video_poll", || video.poll(&task_id)).await? {
                VideoStatus::Succeeded { url } => return Ok(url),
                VideoStatus::Failed { reason } => {
                    return Err(ProviderError::Failed(reason).into());
                }
                VideoStatus::Pending => {
                    debug!(job_id = %job.id, task_id = %task_id, attempt = attempt, "Video still pending");
                    if attempt < attempts {
                        tokio::time::sleep(interval).await;
                    }
                }
            }
        }

        Err(PipelineError::VideoTimeout {
            task_id,
            waited: interval * attempts,
        })
    }

    async fn generate_subtitles(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let voiceover = job
            .voiceover
            .as_ref()
            .ok_or(PipelineError::MissingInput("voiceover"))?;
        let script = job
            .segments
            .as_deref()
            .map(script_text)
            .unwrap_or_default();

        let generator = &self.ports.subtitles;
        let subtitles: Subtitles = self
            .retrier
            .call("subtitles", || generator.generate(&voiceover.url, &script))
            .await?;
        Ok(JobPatch::new().subtitles(subtitles))
    }

    async fn render(&self, job: &Job) -> Result<JobPatch, PipelineError> {
        let manifest = job
            .manifest
            .as_ref()
            .ok_or(PipelineError::MissingInput("manifest"))?;
        let renderer = &self.ports.renderer;
        let url = self.retrier.call("render", || renderer.render(manifest)).await?;
        Ok(JobPatch::new().final_video_url(url))
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("retrier", &self.retrier)
            .finish()
    }
}

/// Checks the request before any stage runs.
///
/// Requires consent, an http(s) source URL (`data:` is also accepted for
/// audio), a parseable webhook URL and a known logo position.
pub fn validate_input(input: &JobInput) -> Result<(), PipelineError> {
    if !input.consent {
        return Err(PipelineError::Validation(
            "consent is required to process this source".to_string(),
        ));
    }

    match &input.source {
        JobSource::Audio { url } => check_url("audio URL", url, true)?,
        JobSource::Website { url } => check_url("website URL", url, false)?,
    }

    if let Some(webhook) = &input.webhook_url {
        check_url("webhook URL", webhook, false)?;
    }

    let style = &input.style;
    if let Some(logo) = &style.logo_url {
        check_url("logo URL", logo, false)?;
        if let Some(position) = &style.logo_position {
            position
                .parse::<LogoPosition>()
                .map_err(PipelineError::Validation)?;
        }
    }

    Ok(())
}

fn check_url(label: &str, raw: &str, allow_data: bool) -> Result<(), PipelineError> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| PipelineError::Validation(format!("{} '{}' is invalid: {}", label, raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        "data" if allow_data => Ok(()),
        scheme => Err(PipelineError::Validation(format!(
            "{} must use http(s), got '{}'",
            label, scheme
        ))),
    }
}

fn script_text(segments: &[SegmentContent]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn video_prompt(job: &Job, segments: &[SegmentContent]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(plan) = &job.plan {
        parts.push(plan.title.as_str());
    }
    parts.extend(segments.iter().map(|s| s.image_prompt.as_str()));
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::StyleOptions;

    fn input() -> JobInput {
        JobInput::audio("https://cdn.example.com/note.m4a", 15, 60).with_consent(true)
    }

    #[test]
    fn test_validate_accepts_complete_input() {
        let input = input()
            .with_webhook_url("https://hooks.example.com/reel")
            .with_style(StyleOptions {
                logo_url: Some("https://cdn.example.com/logo.png".into()),
                logo_position: Some("Beginning".into()),
                ..StyleOptions::default()
            });
        assert!(validate_input(&input).is_ok());
    }

    #[test]
    fn test_validate_requires_consent() {
        let err = validate_input(&input().with_consent(false)).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(msg) if msg.contains("consent")));
    }

    #[test]
    fn test_validate_source_schemes() {
        let data_audio = JobInput::audio("data:audio/mp3;base64,AAAA", 15, 60).with_consent(true);
        assert!(validate_input(&data_audio).is_ok());

        let data_site = JobInput::website("data:text/html,hi", 15, 60).with_consent(true);
        assert!(validate_input(&data_site).is_err());

        let ftp = JobInput::website("ftp://example.com/site", 15, 60).with_consent(true);
        assert!(validate_input(&ftp).is_err());

        let garbage = JobInput::audio("not a url", 15, 60).with_consent(true);
        assert!(validate_input(&garbage).is_err());
    }

    #[test]
    fn test_validate_webhook_and_logo() {
        assert!(validate_input(&input().with_webhook_url("::nope")).is_err());

        let bad_logo = input().with_style(StyleOptions {
            logo_url: Some("https://cdn.example.com/logo.png".into()),
            logo_position: Some("sideways".into()),
            ..StyleOptions::default()
        });
        let err = validate_input(&bad_logo).unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn test_stage_error_root_and_message() {
        let err = PipelineError::from(ProviderError::http(500, "boom"))
            .in_stage(JobStatus::Rendering);
        assert!(matches!(err.root(), PipelineError::Provider(_)));
        assert_eq!(err.to_string(), "rendering failed: Provider returned HTTP 500: boom");
    }

    #[test]
    fn test_script_text_skips_blank_segments() {
        let segments = vec![
            SegmentContent {
                index: 0,
                text: " Hello ".into(),
                image_prompt: "a".into(),
            },
            SegmentContent {
                index: 1,
                text: "  ".into(),
                image_prompt: "b".into(),
            },
            SegmentContent {
                index: 2,
                text: "World".into(),
                image_prompt: "c".into(),
            },
        ];
        assert_eq!(script_text(&segments), "Hello\n\nWorld");
    }
}
