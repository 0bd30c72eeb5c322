//! Scripted port implementations shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use reelforge::jobs::{Job, JobEvent, JobInput, JobStore, Plan, Subtitles, Voiceover};
use reelforge::pipeline::{Manifest, PipelineConfig, PipelineOrchestrator, Ports};
use reelforge::ports::{
    ImageGenerator, JobNotifier, PlanRequest, Planner, Renderer, SubtitleGenerator, Transcriber,
    VideoGenerator, VideoRequest, VideoStatus, VoiceSynthesizer,
};
use reelforge::retry::{FixedJitter, Retrier, RetryPolicy};
use reelforge::ProviderError;

pub const AUDIO_URL: &str = "https://cdn.example.com/voice-note.m4a";
pub const FINAL_URL: &str = "https://cdn.example.com/render/final.mp4";

pub fn audio_input() -> JobInput {
    JobInput::audio(AUDIO_URL, 15, 60).with_consent(true)
}

pub fn fast_retrier() -> Retrier {
    Retrier::new(
        RetryPolicy::new(2)
            .with_initial_backoff(Duration::from_millis(1))
            .with_max_backoff(Duration::from_millis(2)),
    )
    .with_jitter(Arc::new(FixedJitter(0.0)))
    .with_call_timeout(Duration::from_secs(5))
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig::default().with_video_polling(Duration::from_millis(1), 3)
}

/// Transcriber returning a fixed text, optionally slowly, tracking how many
/// calls are in flight at once.
#[derive(Default)]
pub struct MockTranscriber {
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub delay: Duration,
}

impl MockTranscriber {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio_url: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok("We just launched a new espresso blend with notes of cherry.".to_string())
    }
}

/// Planner proposing 60 seconds and a wrong segment count, then writing the
/// script as a wrapped object with numbered keys.
#[derive(Default)]
pub struct MockPlanner {
    pub plan_calls: AtomicUsize,
    pub segment_calls: AtomicUsize,
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, _request: &PlanRequest) -> Result<Plan, ProviderError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Plan {
            title: "Cherry espresso".to_string(),
            target_duration_seconds: 60.0,
            segment_count: 20,
            tone: Some("warm".to_string()),
            music_tags: vec!["calm".to_string()],
            music_description: None,
        })
    }

    async fn write_segments(&self, _transcript: &str, plan: &Plan) -> Result<Value, ProviderError> {
        self.segment_calls.fetch_add(1, Ordering::SeqCst);
        let mut numbered = serde_json::Map::new();
        for i in 1..=plan.segment_count {
            numbered.insert(
                i.to_string(),
                json!({"text": format!("Line {}", i), "imagePrompt": format!("Shot {}", i)}),
            );
        }
        Ok(json!({ "segments": Value::Object(numbered) }))
    }
}

#[derive(Default)]
pub struct MockVoice {
    pub calls: AtomicUsize,
}

#[async_trait]
impl VoiceSynthesizer for MockVoice {
    async fn synthesize(&self, _text: &str, _voice: Option<&str>) -> Result<Voiceover, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Voiceover {
            url: "https://cdn.example.com/voice.mp3".to_string(),
            duration_seconds: 48.0,
        })
    }
}

#[derive(Default)]
pub struct MockSubtitles {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SubtitleGenerator for MockSubtitles {
    async fn generate(&self, _audio_url: &str, script: &str) -> Result<Subtitles, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Subtitles {
            url: "https://cdn.example.com/subs.srt".to_string(),
            text: Some(script.to_string()),
        })
    }
}

/// Image generator that can be told to fail every call, or only the call
/// for one prompt.
pub struct MockImages {
    pub calls: AtomicUsize,
    pub fail_with: Option<ProviderError>,
    pub fail_prompt: Option<&'static str>,
    pub host: &'static str,
}

impl MockImages {
    pub fn working(host: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: None,
            fail_prompt: None,
            host,
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: Some(error),
            fail_prompt: None,
            host: "broken.example.com",
        }
    }

    pub fn failing_on(prompt: &'static str, error: ProviderError) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: Some(error),
            fail_prompt: Some(prompt),
            host: "img.example.com",
        }
    }
}

#[async_trait]
impl ImageGenerator for MockImages {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let targeted = self.fail_prompt.map_or(true, |p| p == prompt);
        match &self.fail_with {
            Some(err) if targeted => Err(err.clone()),
            _ => Ok(format!(
                "https://{}/{}.png",
                self.host,
                prompt.replace(' ', "-").to_lowercase()
            )),
        }
    }
}

/// Video generator answering each poll from a script; the last entry repeats.
pub struct MockVideo {
    pub submits: AtomicUsize,
    pub polls: AtomicUsize,
    pub script: Vec<VideoStatus>,
}

impl MockVideo {
    pub fn new(script: Vec<VideoStatus>) -> Self {
        Self {
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            script,
        }
    }
}

#[async_trait]
impl VideoGenerator for MockVideo {
    async fn submit(&self, _request: &VideoRequest) -> Result<String, ProviderError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok("task-1".to_string())
    }

    async fn poll(&self, _task_id: &str) -> Result<VideoStatus, ProviderError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        let idx = n.min(self.script.len().saturating_sub(1));
        Ok(self.script.get(idx).cloned().unwrap_or(VideoStatus::Pending))
    }
}

#[derive(Default)]
pub struct MockRenderer {
    pub calls: AtomicUsize,
    pub manifests: Mutex<Vec<Manifest>>,
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, manifest: &Manifest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.manifests.lock().unwrap().push(manifest.clone());
        Ok(FINAL_URL.to_string())
    }
}

/// Records hook calls as `"status:<to>"`, `"completed"` and `"failed"`.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobNotifier for RecordingNotifier {
    async fn status_changed(&self, _job: &Job, event: &JobEvent) -> Result<(), ProviderError> {
        self.events.lock().unwrap().push(format!("status:{}", event.to));
        Ok(())
    }

    async fn completed(&self, _job: &Job) -> Result<(), ProviderError> {
        self.events.lock().unwrap().push("completed".to_string());
        Ok(())
    }

    async fn failed(&self, _job: &Job) -> Result<(), ProviderError> {
        self.events.lock().unwrap().push("failed".to_string());
        Ok(())
    }
}

/// All mocks wired into one orchestrator, with handles kept for assertions.
pub struct Harness {
    pub store: Arc<JobStore>,
    pub transcriber: Arc<MockTranscriber>,
    pub planner: Arc<MockPlanner>,
    pub voice: Arc<MockVoice>,
    pub subtitles: Arc<MockSubtitles>,
    pub images: Arc<MockImages>,
    pub renderer: Arc<MockRenderer>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transcriber(MockTranscriber::default())
    }

    pub fn with_transcriber(transcriber: MockTranscriber) -> Self {
        Self::with_images(transcriber, MockImages::working("img.example.com"))
    }

    pub fn with_images(transcriber: MockTranscriber, images: MockImages) -> Self {
        Self {
            store: Arc::new(JobStore::in_memory()),
            transcriber: Arc::new(transcriber),
            planner: Arc::new(MockPlanner::default()),
            voice: Arc::new(MockVoice::default()),
            subtitles: Arc::new(MockSubtitles::default()),
            images: Arc::new(images),
            renderer: Arc::new(MockRenderer::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn ports(&self) -> Ports {
        Ports::new(
            self.transcriber.clone(),
            self.planner.clone(),
            self.voice.clone(),
            self.subtitles.clone(),
            self.images.clone(),
            self.renderer.clone(),
        )
        .with_notifier(self.notifier.clone())
    }

    pub fn orchestrator(&self, ports: Ports) -> PipelineOrchestrator {
        PipelineOrchestrator::new(self.store.clone(), ports, test_config())
            .with_retrier(fast_retrier())
    }
}
