//! Job store: creation, merging updates and guarded status changes.
//!
//! The store is the only shared mutable resource in the pipeline. Mutations
//! are serialized through a store-wide lock so read-modify-write cycles never
//! interleave within one process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{Job, JobInput, JobPatch, JobStatus};
use super::repository::{InMemoryJobRepository, JobRepository};
use crate::error::StoreError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// System-wide bounds applied to every job's requested duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationLimits {
    pub min_seconds: u32,
    pub max_seconds: u32,
}

impl Default for DurationLimits {
    fn default() -> Self {
        Self {
            min_seconds: 15,
            max_seconds: 180,
        }
    }
}

impl DurationLimits {
    pub fn new(min_seconds: u32, max_seconds: u32) -> Self {
        Self {
            min_seconds: min_seconds.min(max_seconds),
            max_seconds: max_seconds.max(min_seconds),
        }
    }

    /// Clamps a requested `[min, max]` pair into the limits, keeping
    /// `min <= max`.
    pub fn clamp(&self, min: u32, max: u32) -> (u32, u32) {
        let min = min.clamp(self.min_seconds, self.max_seconds);
        let max = max.clamp(self.min_seconds, self.max_seconds).max(min);
        (min, max)
    }
}

/// Status change observed by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: String,
    pub from: JobStatus,
    pub to: JobStatus,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl JobEvent {
    /// Event describing `job` having just moved out of `from`.
    pub fn from_job(job: &Job, from: JobStatus) -> Self {
        Self {
            job_id: job.id.clone(),
            from,
            to: job.status,
            step: job.current_step.clone(),
            error: job.error.clone(),
            at: job.updated_at,
        }
    }
}

/// CRUD and status bookkeeping on top of a [`JobRepository`].
pub struct JobStore {
    repository: Arc<dyn JobRepository>,
    limits: DurationLimits,
    events: broadcast::Sender<JobEvent>,
    write_lock: Mutex<()>,
}

impl JobStore {
    pub fn new(repository: Arc<dyn JobRepository>, limits: DurationLimits) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            repository,
            limits,
            events,
            write_lock: Mutex::new(()),
        }
    }

    /// Store over a fresh in-memory repository with default limits.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryJobRepository::new()), DurationLimits::default())
    }

    pub fn limits(&self) -> DurationLimits {
        self.limits
    }

    /// Receives every status change made through this store.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Creates a pending job. A UUID v4 id is generated when none is given.
    pub async fn create_job(&self, mut input: JobInput, id: Option<String>) -> Result<Job, StoreError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let (min, max) = self
            .limits
            .clamp(input.min_duration_seconds, input.max_duration_seconds);
        if (min, max) != (input.min_duration_seconds, input.max_duration_seconds) {
            debug!(
                job_id = %id,
                requested_min = input.min_duration_seconds,
                requested_max = input.max_duration_seconds,
                min = min,
                max = max,
                "Clamped requested duration bounds"
            );
        }
        input.min_duration_seconds = min;
        input.max_duration_seconds = max;

        let job = Job::new(id, input);
        self.repository.create(&job).await?;

        info!(job_id = %job.id, "Job created");
        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> Result<Job, StoreError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Shallow-merges `patch` into the job and stamps `updated_at`.
    pub async fn update_job(&self, id: &str, patch: JobPatch) -> Result<Job, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut job = self.get_job(id).await?;
        if job.status == JobStatus::Completed {
            return Err(StoreError::Immutable(id.to_string()));
        }

        patch.apply(&mut job);
        job.touch();
        self.repository.put(&job).await?;
        Ok(job)
    }

    /// Moves the job to `status` and emits a [`JobEvent`].
    ///
    /// Leaving `failed` clears the stored error.
    pub async fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        step: Option<&str>,
    ) -> Result<Job, StoreError> {
        self.transition(id, status, step.map(str::to_string), None)
            .await
    }

    /// Marks the job failed with a human-readable message. Persisted stage
    /// outputs are kept.
    pub async fn fail_job(&self, id: &str, message: impl Into<String>) -> Result<Job, StoreError> {
        self.transition(id, JobStatus::Failed, None, Some(message.into()))
            .await
    }

    /// Removes a job. Returns whether it existed.
    pub async fn delete_job(&self, id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.repository.delete(id).await
    }

    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        self.repository.list(limit).await
    }

    async fn transition(
        &self,
        id: &str,
        status: JobStatus,
        step: Option<String>,
        error: Option<String>,
    ) -> Result<Job, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut job = self.get_job(id).await?;
        let from = job.status;

        if from == JobStatus::Completed {
            return Err(StoreError::Immutable(id.to_string()));
        }
        if !from.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: from.to_string(),
                to: status.to_string(),
            });
        }

        job.status = status;
        if status == JobStatus::Failed {
            job.error = Some(error.unwrap_or_else(|| "unknown error".to_string()));
        } else {
            job.error = None;
            job.current_step = Some(step.unwrap_or_else(|| status.to_string()));
        }
        job.touch();
        self.repository.put(&job).await?;

        if status == JobStatus::Failed {
            warn!(job_id = %id, from = %from, error = job.error.as_deref().unwrap_or_default(), "Job failed");
        } else if from != status {
            info!(job_id = %id, from = %from, to = %status, "Job status changed");
        }

        // No subscribers is not an error.
        let _ = self.events.send(JobEvent::from_job(&job, from));
        Ok(job)
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("limits", &self.limits)
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> JobInput {
        JobInput::audio("https://cdn.example.com/note.m4a", 30, 60)
    }

    #[tokio::test]
    async fn test_create_job_sets_pending_and_equal_timestamps() {
        let store = JobStore::in_memory();
        let job = store.create_job(input(), None).await.unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.created_at, job.updated_at);
        assert!(Uuid::parse_str(&job.id).is_ok());
    }

    #[tokio::test]
    async fn test_create_job_rejects_duplicate_id() {
        let store = JobStore::in_memory();
        store.create_job(input(), Some("dup".into())).await.unwrap();

        let err = store.create_job(input(), Some("dup".into())).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_create_job_clamps_durations() {
        let store = JobStore::new(
            Arc::new(InMemoryJobRepository::new()),
            DurationLimits::new(15, 120),
        );
        let job = store
            .create_job(JobInput::audio("https://a.example/x.mp3", 5, 600), None)
            .await
            .unwrap();

        assert_eq!(job.input.min_duration_seconds, 15);
        assert_eq!(job.input.max_duration_seconds, 120);
    }

    #[test]
    fn test_duration_limits_keep_order() {
        let limits = DurationLimits::new(15, 120);
        assert_eq!(limits.clamp(90, 30), (90, 90));
        assert_eq!(limits.clamp(200, 300), (120, 120));
        assert_eq!(limits.clamp(20, 40), (20, 40));
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let store = JobStore::in_memory();
        let err = store.get_job("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_job_merges_and_advances_timestamp() {
        let store = JobStore::in_memory();
        let job = store.create_job(input(), None).await.unwrap();

        let updated = store
            .update_job(&job.id, JobPatch::new().transcript("hello"))
            .await
            .unwrap();
        let again = store
            .update_job(&job.id, JobPatch::new().video_url("https://v.example/1.mp4"))
            .await
            .unwrap();

        assert_eq!(again.transcript.as_deref(), Some("hello"));
        assert_eq!(again.video_url.as_deref(), Some("https://v.example/1.mp4"));
        assert!(updated.updated_at >= job.updated_at);
        assert!(again.updated_at >= updated.updated_at);
    }

    #[tokio::test]
    async fn test_update_status_emits_event() {
        let store = JobStore::in_memory();
        let mut events = store.subscribe();
        let job = store.create_job(input(), None).await.unwrap();

        let job = store
            .update_status(&job.id, JobStatus::Transcribing, Some("Transcribing voice note"))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Transcribing);
        assert_eq!(job.current_step.as_deref(), Some("Transcribing voice note"));

        let event = events.recv().await.unwrap();
        assert_eq!(event.job_id, job.id);
        assert_eq!(event.from, JobStatus::Pending);
        assert_eq!(event.to, JobStatus::Transcribing);
    }

    #[tokio::test]
    async fn test_backward_transition_rejected() {
        let store = JobStore::in_memory();
        let job = store.create_job(input(), None).await.unwrap();
        store
            .update_status(&job.id, JobStatus::Rendering, None)
            .await
            .unwrap();

        let err = store
            .update_status(&job.id, JobStatus::Planning, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_fail_then_resume_clears_error() {
        let store = JobStore::in_memory();
        let job = store.create_job(input(), None).await.unwrap();
        store
            .update_job(&job.id, JobPatch::new().transcript("kept"))
            .await
            .unwrap();

        let failed = store.fail_job(&job.id, "planner exploded").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("planner exploded"));
        assert_eq!(failed.transcript.as_deref(), Some("kept"));

        let resumed = store
            .update_status(&job.id, JobStatus::Planning, None)
            .await
            .unwrap();
        assert_eq!(resumed.status, JobStatus::Planning);
        assert!(resumed.error.is_none());
    }

    #[tokio::test]
    async fn test_completed_job_is_immutable() {
        let store = JobStore::in_memory();
        let job = store.create_job(input(), None).await.unwrap();
        store
            .update_status(&job.id, JobStatus::Completed, None)
            .await
            .unwrap();

        let err = store
            .update_job(&job.id, JobPatch::new().transcript("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Immutable(_)));

        let err = store.fail_job(&job.id, "too late").await.unwrap_err();
        assert!(matches!(err, StoreError::Immutable(_)));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = JobStore::in_memory();
        let a = store.create_job(input(), None).await.unwrap();
        store.create_job(input(), None).await.unwrap();

        assert_eq!(store.list_jobs(10).await.unwrap().len(), 2);
        assert!(store.delete_job(&a.id).await.unwrap());
        assert_eq!(store.list_jobs(10).await.unwrap().len(), 1);
        assert!(matches!(
            store.get_job(&a.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
