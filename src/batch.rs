//! Bounded-concurrency batch execution.
//!
//! Runs many independent jobs at once while never holding more than
//! `parallelism` permits. Every job yields an outcome; one failing job never
//! affects the others.
//!
//! # Example
//!
//! ```ignore
//! use reelforge::batch::BatchRunner;
//!
//! let runner = BatchRunner::new(4);
//! let result = runner
//!     .run_pipeline(&orchestrator, job_ids, |done, total, outcome| {
//!         tracing::info!(done, total, job_id = %outcome.job_id, "Progress");
//!     })
//!     .await;
//! println!("{} ok, {} failed", result.success_count, result.failure_count);
//! ```

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jobs::JobStatus;
use crate::metrics::MetricsCollector;
use crate::pipeline::{PipelineConfig, PipelineOrchestrator};

/// Result of one job within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: String,
    /// `completed` or `failed`.
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Aggregate of a whole batch. `results` follows the input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub results: Vec<JobOutcome>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// Decrements the in-progress gauge however the job ends.
struct InProgress(MetricsCollector);

impl InProgress {
    fn start(metrics: MetricsCollector) -> Self {
        metrics.inc_jobs_in_progress();
        Self(metrics)
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        self.0.dec_jobs_in_progress();
    }
}

/// Runs jobs through a counting semaphore.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    parallelism: usize,
    metrics: MetricsCollector,
}

impl BatchRunner {
    /// Creates a runner holding at most `parallelism` permits (at least 1).
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
            metrics: MetricsCollector::new(),
        }
    }

    /// Creates a runner sized by `config.batch_parallelism`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.batch_parallelism)
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Runs `task` once per id, at most `parallelism` at a time.
    ///
    /// `task` resolves to an optional output on success. A task that panics
    /// is recorded as a failed outcome. `progress` is called after each job
    /// with `(completed, total, outcome)`, before the job's permit is
    /// released.
    pub async fn run<F, Fut, E, P>(&self, job_ids: Vec<String>, task: F, progress: P) -> BatchResult
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
        E: Display,
        P: Fn(usize, usize, &JobOutcome),
    {
        let batch_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let total = job_ids.len();
        let semaphore = Semaphore::new(self.parallelism);
        let completed = AtomicUsize::new(0);

        info!(
            batch_id = %batch_id,
            jobs = total,
            parallelism = self.parallelism,
            "Starting batch"
        );

        let futures = job_ids.into_iter().map(|job_id| {
            let semaphore = &semaphore;
            let completed = &completed;
            let task = &task;
            let progress = &progress;
            let metrics = self.metrics;
            async move {
                let start = Instant::now();
                let permit = semaphore.acquire().await;
                let outcome = match permit {
                    Ok(_permit) => {
                        let _in_progress = InProgress::start(metrics);
                        debug!(job_id = %job_id, "Batch job acquired permit");
                        let id = job_id.clone();
                        let caught = AssertUnwindSafe(async move { task(id).await })
                            .catch_unwind()
                            .await;
                        let outcome = match caught {
                            Ok(result) => outcome_for(job_id, result, start),
                            Err(payload) => {
                                let message = panic_message(payload.as_ref());
                                outcome_for::<String>(job_id, Err(message), start)
                            }
                        };
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        progress(done, total, &outcome);
                        outcome
                    }
                    Err(e) => {
                        let outcome = outcome_for::<String>(job_id, Err(e.to_string()), start);
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        progress(done, total, &outcome);
                        outcome
                    }
                };
                if let Some(error) = &outcome.error {
                    warn!(job_id = %outcome.job_id, error = %error, "Batch job failed");
                }
                outcome
            }
        });

        let results = futures::future::join_all(futures).await;
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let failure_count = results.len() - success_count;
        let completed_at = Utc::now();

        info!(
            batch_id = %batch_id,
            succeeded = success_count,
            failed = failure_count,
            "Batch finished"
        );

        BatchResult {
            batch_id,
            started_at,
            completed_at,
            results,
            success_count,
            failure_count,
        }
    }

    /// Runs each job id through the orchestrator. The output is the final
    /// video URL.
    pub async fn run_pipeline<P>(
        &self,
        orchestrator: &PipelineOrchestrator,
        job_ids: Vec<String>,
        progress: P,
    ) -> BatchResult
    where
        P: Fn(usize, usize, &JobOutcome),
    {
        self.run(
            job_ids,
            |job_id| async move {
                orchestrator
                    .run(&job_id)
                    .await
                    .map(|job| job.final_video_url)
            },
            progress,
        )
        .await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("job panicked: {}", detail),
        None => "job panicked".to_string(),
    }
}

fn outcome_for<E: Display>(
    job_id: String,
    result: Result<Option<String>, E>,
    start: Instant,
) -> JobOutcome {
    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(output) => JobOutcome {
            job_id,
            status: JobStatus::Completed,
            output,
            error: None,
            duration_ms,
        },
        Err(e) => JobOutcome {
            job_id,
            status: JobStatus::Failed,
            output: None,
            error: Some(e.to_string()),
            duration_ms,
        },
    }
}
