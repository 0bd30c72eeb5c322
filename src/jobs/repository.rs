//! Persistence port for job records and the in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::model::Job;
use crate::error::StoreError;

/// Storage backend for job documents.
///
/// Implementations only persist whole documents; merge rules and status
/// guards live in [`super::store::JobStore`].
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Loads a job, `Ok(None)` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Inserts a new job; fails with `AlreadyExists` if the id is taken.
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Overwrites an existing job document.
    async fn put(&self, job: &Job) -> Result<(), StoreError>;

    /// Removes a job. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Lists up to `limit` jobs, most recently updated first.
    async fn list(&self, limit: usize) -> Result<Vec<Job>, StoreError>;
}

/// Process-local repository backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.jobs.write().await.remove(id).is_some())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all.truncate(limit);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::JobInput;

    fn job(id: &str) -> Job {
        Job::new(id, JobInput::audio("https://cdn.example.com/a.m4a", 30, 60))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryJobRepository::new();
        repo.create(&job("a")).await.unwrap();

        let loaded = repo.get("a").await.unwrap().unwrap();
        assert_eq!(loaded.id, "a");
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let repo = InMemoryJobRepository::new();
        repo.create(&job("a")).await.unwrap();

        let err = repo.create(&job("a")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(id) if id == "a"));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryJobRepository::new();
        repo.create(&job("a")).await.unwrap();

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_orders_by_update_and_limits() {
        let repo = InMemoryJobRepository::new();
        let mut older = job("older");
        older.updated_at -= chrono::Duration::seconds(60);
        repo.create(&older).await.unwrap();
        repo.create(&job("newer")).await.unwrap();
        repo.create(&job("third")).await.unwrap();

        let listed = repo.list(2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|j| j.id != "older"));
    }
}
