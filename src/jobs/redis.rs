//! Redis-backed job repository.
//!
//! # Key layout
//!
//! - `{prefix}:job:{id}`: the job as a JSON document
//! - `{prefix}:jobs`: set of known job ids, used for listing
//!
//! When a TTL is configured every write refreshes the key's expiry, which
//! acts as the retention policy. Ids whose documents expired are pruned from
//! the index lazily during `list`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use super::model::Job;
use super::repository::JobRepository;
use crate::error::StoreError;

/// Job repository storing JSON documents in Redis.
#[derive(Clone)]
pub struct RedisJobRepository {
    redis: ConnectionManager,
    prefix: String,
    ttl: Option<Duration>,
}

impl RedisJobRepository {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `prefix` - Key prefix shared by all job keys
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        let redis = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Self::from_connection(redis, prefix))
    }

    /// Creates a repository from an existing ConnectionManager.
    pub fn from_connection(redis: ConnectionManager, prefix: &str) -> Self {
        Self {
            redis,
            prefix: prefix.to_string(),
            ttl: None,
        }
    }

    /// Expires job documents after `ttl` without writes.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn job_key(&self, id: &str) -> String {
        job_key(&self.prefix, id)
    }

    fn index_key(&self) -> String {
        index_key(&self.prefix)
    }

    fn set_command(&self, key: &str, payload: &str, only_if_absent: bool) -> redis::Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(payload);
        if only_if_absent {
            cmd.arg("NX");
        }
        if let Some(ttl) = self.ttl {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }
        cmd
    }
}

fn job_key(prefix: &str, id: &str) -> String {
    format!("{}:job:{}", prefix, id)
}

fn index_key(prefix: &str) -> String {
    format!("{}:jobs", prefix)
}

#[async_trait]
impl JobRepository for RedisJobRepository {
    async fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let mut conn = self.redis.clone();
        let data: Option<String> = conn.get(self.job_key(id)).await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.redis.clone();

        // SET NX answers nil when the key already exists.
        let created: Option<String> = self
            .set_command(&self.job_key(&job.id), &payload, true)
            .query_async(&mut conn)
            .await?;
        if created.is_none() {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }

        conn.sadd::<_, _, ()>(self.index_key(), &job.id).await?;
        Ok(())
    }

    async fn put(&self, job: &Job) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.redis.clone();

        let mut pipe = redis::pipe();
        pipe.add_command(self.set_command(&self.job_key(&job.id), &payload, false))
            .ignore();
        pipe.sadd(self.index_key(), &job.id).ignore();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();

        let (removed, _): (u32, u32) = redis::pipe()
            .del(self.job_key(id))
            .srem(self.index_key(), id)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let mut conn = self.redis.clone();
        let ids: Vec<String> = conn.smembers(self.index_key()).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| self.job_key(id)).collect();
        let documents: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::with_capacity(documents.len());
        let mut expired = Vec::new();
        for (id, document) in ids.iter().zip(documents) {
            match document {
                Some(data) => jobs.push(serde_json::from_str::<Job>(&data)?),
                None => expired.push(id.clone()),
            }
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "Pruning expired job ids from index");
            conn.srem::<_, _, ()>(self.index_key(), &expired).await?;
        }

        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        jobs.truncate(limit);
        Ok(jobs)
    }
}

impl std::fmt::Debug for RedisJobRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisJobRepository")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}
