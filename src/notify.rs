//! Job notification hooks.
//!
//! - [`TracingNotifier`]: structured log lines only
//! - [`WebhookNotifier`]: POSTs a JSON event to the job's `webhookUrl`
//! - [`CompositeNotifier`]: fans out to several notifiers
//!
//! Notifier errors are reported to the orchestrator, which logs them. They
//! never change a job's outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::jobs::{Job, JobEvent, JobStatus};
use crate::ports::JobNotifier;
use crate::retry::Retrier;

/// Per-request timeout for webhook deliveries.
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Logs job events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl JobNotifier for TracingNotifier {
    async fn status_changed(&self, job: &Job, event: &JobEvent) -> Result<(), ProviderError> {
        info!(
            job_id = %job.id,
            from = %event.from,
            to = %event.to,
            step = event.step.as_deref().unwrap_or_default(),
            "Job status changed"
        );
        Ok(())
    }

    async fn completed(&self, job: &Job) -> Result<(), ProviderError> {
        info!(
            job_id = %job.id,
            final_video_url = job.final_video_url.as_deref().unwrap_or_default(),
            "Job finished"
        );
        Ok(())
    }

    async fn failed(&self, job: &Job) -> Result<(), ProviderError> {
        warn!(
            job_id = %job.id,
            error = job.error.as_deref().unwrap_or_default(),
            "Job finished with an error"
        );
        Ok(())
    }
}

/// Kind of webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventKind {
    StatusChanged,
    Completed,
    Failed,
}

/// JSON body delivered to a job's webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,
    pub at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(kind: WebhookEventKind, job: &Job) -> Self {
        Self {
            event: kind,
            job_id: job.id.clone(),
            status: job.status,
            previous_status: None,
            current_step: job.current_step.clone(),
            error: job.error.clone(),
            final_video_url: job.final_video_url.clone(),
            at: job.updated_at,
        }
    }
}

/// Delivers events to `job.input.webhook_url`. Jobs without a webhook are
/// skipped.
///
/// Completion and failure events go through the retrier. Status changes are
/// sent once: they fire on every stage, and the next one supersedes them.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    retrier: Retrier,
}

impl WebhookNotifier {
    /// Creates a notifier with its own HTTP client.
    pub fn new(retrier: Retrier) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, retrier))
    }

    pub fn with_client(client: Client, retrier: Retrier) -> Self {
        Self { client, retrier }
    }

    async fn deliver(
        &self,
        job: &Job,
        event: WebhookEvent,
        retry: bool,
    ) -> Result<(), ProviderError> {
        let Some(url) = job.input.webhook_url.as_deref() else {
            return Ok(());
        };

        if retry {
            self.retrier
                .call("webhook", || self.post(url, &event))
                .await?;
        } else {
            self.post(url, &event).await?;
        }
        debug!(job_id = %job.id, event = ?event.event, "Webhook delivered");
        Ok(())
    }

    async fn post(&self, url: &str, event: &WebhookEvent) -> Result<(), ProviderError> {
        let response = self.client.post(url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(ProviderError::http(status.as_u16(), body));
        }
        Ok(())
    }
}

#[async_trait]
impl JobNotifier for WebhookNotifier {
    async fn status_changed(&self, job: &Job, event: &JobEvent) -> Result<(), ProviderError> {
        let mut payload = WebhookEvent::new(WebhookEventKind::StatusChanged, job);
        payload.previous_status = Some(event.from);
        self.deliver(job, payload, false).await
    }

    async fn completed(&self, job: &Job) -> Result<(), ProviderError> {
        self.deliver(job, WebhookEvent::new(WebhookEventKind::Completed, job), true)
            .await
    }

    async fn failed(&self, job: &Job) -> Result<(), ProviderError> {
        self.deliver(job, WebhookEvent::new(WebhookEventKind::Failed, job), true)
            .await
    }
}

/// Calls every inner notifier in order. All of them run even when one
/// fails; the first error is returned.
#[derive(Clone, Default)]
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn JobNotifier>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn JobNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

fn keep_first(first: &mut Option<ProviderError>, result: Result<(), ProviderError>) {
    if let Err(e) = result {
        if first.is_none() {
            *first = Some(e);
        }
    }
}

fn into_result(first: Option<ProviderError>) -> Result<(), ProviderError> {
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[async_trait]
impl JobNotifier for CompositeNotifier {
    async fn status_changed(&self, job: &Job, event: &JobEvent) -> Result<(), ProviderError> {
        let mut first = None;
        for notifier in &self.notifiers {
            keep_first(&mut first, notifier.status_changed(job, event).await);
        }
        into_result(first)
    }

    async fn completed(&self, job: &Job) -> Result<(), ProviderError> {
        let mut first = None;
        for notifier in &self.notifiers {
            keep_first(&mut first, notifier.completed(job).await);
        }
        into_result(first)
    }

    async fn failed(&self, job: &Job) -> Result<(), ProviderError> {
        let mut first = None;
        for notifier in &self.notifiers {
            keep_first(&mut first, notifier.failed(job).await);
        }
        into_result(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobInput;
    use crate::retry::{FixedJitter, RetryPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fast_retrier() -> Retrier {
        Retrier::new(
            RetryPolicy::new(3)
                .with_initial_backoff(Duration::from_millis(1))
                .with_max_backoff(Duration::from_millis(2)),
        )
        .with_jitter(Arc::new(FixedJitter(0.0)))
    }

    fn job(webhook: Option<String>) -> Job {
        let mut input = JobInput::audio("https://cdn.example.com/note.m4a", 15, 60);
        input.webhook_url = webhook;
        let mut job = Job::new("job-42", input);
        job.status = JobStatus::Completed;
        job.final_video_url = Some("https://cdn.example.com/final.mp4".into());
        job
    }

    /// Minimal HTTP endpoint answering with the scripted status codes and
    /// recording every request body.
    async fn serve(statuses: Vec<u16>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let recorded = bodies.clone();

        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(split) = text.find("\r\n\r\n") {
                        let length = text[..split]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if buf.len() >= split + 4 + length {
                            recorded
                                .lock()
                                .unwrap()
                                .push(String::from_utf8_lossy(&buf[split + 4..]).to_string());
                            break;
                        }
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {} X\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{}/hook", addr), bodies)
    }

    #[test]
    fn test_webhook_event_shape() {
        let event = WebhookEvent::new(WebhookEventKind::Completed, &job(None));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "completed");
        assert_eq!(value["jobId"], "job-42");
        assert_eq!(value["status"], "completed");
        assert_eq!(value["finalVideoUrl"], "https://cdn.example.com/final.mp4");
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn test_webhook_skipped_without_url() {
        let notifier = WebhookNotifier::new(fast_retrier()).unwrap();
        assert!(notifier.completed(&job(None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_retries_server_errors() {
        let (url, bodies) = serve(vec![503, 200]).await;
        let notifier = WebhookNotifier::new(fast_retrier()).unwrap();

        notifier.completed(&job(Some(url))).await.unwrap();

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        let delivered: WebhookEvent = serde_json::from_str(&bodies[1]).unwrap();
        assert_eq!(delivered.event, WebhookEventKind::Completed);
        assert_eq!(delivered.job_id, "job-42");
    }

    #[tokio::test]
    async fn test_webhook_client_error_is_not_retried() {
        let (url, bodies) = serve(vec![404]).await;
        let notifier = WebhookNotifier::new(fast_retrier()).unwrap();

        let err = notifier.failed(&job(Some(url))).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 404, .. }));
        assert_eq!(bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_change_is_sent_once() {
        let (url, bodies) = serve(vec![503, 200]).await;
        let notifier = WebhookNotifier::new(fast_retrier()).unwrap();
        let job = job(Some(url));
        let event = JobEvent::from_job(&job, JobStatus::Rendering);

        let err = notifier.status_changed(&job, &event).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http { status: 503, .. }));
        assert_eq!(bodies.lock().unwrap().len(), 1);
    }

    struct CountingNotifier {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl JobNotifier for CountingNotifier {
        async fn status_changed(&self, job: &Job, _event: &JobEvent) -> Result<(), ProviderError> {
            self.completed(job).await
        }

        async fn completed(&self, _job: &Job) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Network("unreachable".into()))
            } else {
                Ok(())
            }
        }

        async fn failed(&self, job: &Job) -> Result<(), ProviderError> {
            self.completed(job).await
        }
    }

    #[tokio::test]
    async fn test_composite_runs_all_and_reports_first_error() {
        let failing = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let healthy = Arc::new(CountingNotifier {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let composite = CompositeNotifier::new()
            .with(Arc::new(TracingNotifier))
            .with(failing.clone())
            .with(healthy.clone());

        let err = composite.completed(&job(None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
        assert_eq!(composite.len(), 3);
    }
}
