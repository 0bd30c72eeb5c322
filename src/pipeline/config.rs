//! Pipeline configuration.
//!
//! Covers retry behavior for provider calls, per-call and video polling
//! timeouts, duration limits and segment math, batch parallelism and the
//! job store backend.

use std::time::Duration;

use thiserror::Error;

use crate::jobs::DurationLimits;
use crate::retry::RetryPolicy;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Hard ceiling on segments per video.
pub const MAX_SEGMENTS: u32 = 15;

/// Configuration for the pipeline orchestrator and batch runner.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Provider calls
    /// Retry policy applied to every external call.
    pub retry: RetryPolicy,
    /// Deadline for a single provider attempt.
    pub call_timeout: Duration,
    /// Delay between video generation status polls.
    pub video_poll_interval: Duration,
    /// Polls before a video generation is declared stuck.
    pub video_max_poll_attempts: u32,

    // Content shaping
    /// System bounds applied to requested durations.
    pub duration_limits: DurationLimits,
    /// Narration seconds covered by one segment.
    pub seconds_per_segment: f64,
    /// Upper bound on segment count (never above [`MAX_SEGMENTS`]).
    pub max_segments: u32,

    // Execution
    /// Default concurrency cap for batches.
    pub batch_parallelism: usize,

    // Storage
    /// `memory`, `redis://...` or `postgres://...`.
    pub store_url: String,
    /// Key prefix for the Redis backend.
    pub redis_prefix: String,
    /// Retention for stored jobs (Redis TTL).
    pub job_ttl: Option<Duration>,

    // Selection
    /// Seed for the music pick; random when unset.
    pub music_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(120),
            video_poll_interval: Duration::from_secs(10),
            video_max_poll_attempts: 60,

            duration_limits: DurationLimits::default(),
            seconds_per_segment: 5.0,
            max_segments: MAX_SEGMENTS,

            batch_parallelism: 4,

            store_url: "memory".to_string(),
            redis_prefix: "reelforge".to_string(),
            job_ttl: None,

            music_seed: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REELFORGE_RETRY_MAX_ATTEMPTS`: Attempts per provider call (default: 3)
    /// - `REELFORGE_RETRY_INITIAL_BACKOFF_MS`: First backoff (default: 1000)
    /// - `REELFORGE_RETRY_MAX_BACKOFF_MS`: Backoff ceiling (default: 30000)
    /// - `REELFORGE_RETRY_MULTIPLIER`: Backoff growth factor (default: 2.0)
    /// - `REELFORGE_RETRY_JITTER`: Jitter fraction (default: 0.2)
    /// - `REELFORGE_CALL_TIMEOUT_SECS`: Per-attempt timeout (default: 120)
    /// - `REELFORGE_VIDEO_POLL_INTERVAL_SECS`: Video poll interval (default: 10)
    /// - `REELFORGE_VIDEO_MAX_POLLS`: Video poll attempts (default: 60)
    /// - `REELFORGE_MIN_DURATION_SECS` / `REELFORGE_MAX_DURATION_SECS`: Duration limits (default: 15 / 180)
    /// - `REELFORGE_SECONDS_PER_SEGMENT`: Segment length (default: 5)
    /// - `REELFORGE_MAX_SEGMENTS`: Segment cap (default: 15)
    /// - `REELFORGE_BATCH_PARALLELISM`: Batch concurrency (default: 4)
    /// - `REELFORGE_STORE_URL`: Job store (default: memory)
    /// - `REELFORGE_REDIS_PREFIX`: Redis key prefix (default: reelforge)
    /// - `REELFORGE_JOB_TTL_SECS`: Job retention, unset for none
    /// - `REELFORGE_MUSIC_SEED`: Seed for music selection
    /// - `REELFORGE_REQUIRE_STORE`: When true, `REELFORGE_STORE_URL` must be set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Retry
        if let Some(val) = lookup("REELFORGE_RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_env_value(&val, "REELFORGE_RETRY_MAX_ATTEMPTS")?;
        }
        if let Some(val) = lookup("REELFORGE_RETRY_INITIAL_BACKOFF_MS") {
            let ms: u64 = parse_env_value(&val, "REELFORGE_RETRY_INITIAL_BACKOFF_MS")?;
            config.retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(val) = lookup("REELFORGE_RETRY_MAX_BACKOFF_MS") {
            let ms: u64 = parse_env_value(&val, "REELFORGE_RETRY_MAX_BACKOFF_MS")?;
            config.retry.max_backoff = Duration::from_millis(ms);
        }
        if let Some(val) = lookup("REELFORGE_RETRY_MULTIPLIER") {
            config.retry.multiplier = parse_env_value(&val, "REELFORGE_RETRY_MULTIPLIER")?;
        }
        if let Some(val) = lookup("REELFORGE_RETRY_JITTER") {
            let fraction: f64 = parse_env_value(&val, "REELFORGE_RETRY_JITTER")?;
            config.retry = config.retry.with_jitter_fraction(fraction);
        }

        // Timeouts
        if let Some(val) = lookup("REELFORGE_CALL_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "REELFORGE_CALL_TIMEOUT_SECS")?;
            config.call_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("REELFORGE_VIDEO_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "REELFORGE_VIDEO_POLL_INTERVAL_SECS")?;
            config.video_poll_interval = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("REELFORGE_VIDEO_MAX_POLLS") {
            config.video_max_poll_attempts = parse_env_value(&val, "REELFORGE_VIDEO_MAX_POLLS")?;
        }

        // Content shaping
        let mut min = config.duration_limits.min_seconds;
        let mut max = config.duration_limits.max_seconds;
        if let Some(val) = lookup("REELFORGE_MIN_DURATION_SECS") {
            min = parse_env_value(&val, "REELFORGE_MIN_DURATION_SECS")?;
        }
        if let Some(val) = lookup("REELFORGE_MAX_DURATION_SECS") {
            max = parse_env_value(&val, "REELFORGE_MAX_DURATION_SECS")?;
        }
        config.duration_limits = DurationLimits {
            min_seconds: min,
            max_seconds: max,
        };
        if let Some(val) = lookup("REELFORGE_SECONDS_PER_SEGMENT") {
            config.seconds_per_segment = parse_env_value(&val, "REELFORGE_SECONDS_PER_SEGMENT")?;
        }
        if let Some(val) = lookup("REELFORGE_MAX_SEGMENTS") {
            config.max_segments = parse_env_value(&val, "REELFORGE_MAX_SEGMENTS")?;
        }

        // Execution
        if let Some(val) = lookup("REELFORGE_BATCH_PARALLELISM") {
            config.batch_parallelism = parse_env_value(&val, "REELFORGE_BATCH_PARALLELISM")?;
        }

        // Storage
        let require_store = match lookup("REELFORGE_REQUIRE_STORE") {
            Some(val) => parse_env_bool(&val, "REELFORGE_REQUIRE_STORE")?,
            None => false,
        };
        match lookup("REELFORGE_STORE_URL") {
            Some(val) => config.store_url = val,
            None if require_store => {
                return Err(ConfigError::MissingEnvVar("REELFORGE_STORE_URL".to_string()))
            }
            None => {}
        }
        if let Some(val) = lookup("REELFORGE_REDIS_PREFIX") {
            config.redis_prefix = val;
        }
        if let Some(val) = lookup("REELFORGE_JOB_TTL_SECS") {
            let secs: u64 = parse_env_value(&val, "REELFORGE_JOB_TTL_SECS")?;
            config.job_ttl = Some(Duration::from_secs(secs));
        }

        // Selection
        if let Some(val) = lookup("REELFORGE_MUSIC_SEED") {
            config.music_seed = Some(parse_env_value(&val, "REELFORGE_MUSIC_SEED")?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::ValidationFailed(
                "retry.multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(ConfigError::ValidationFailed(
                "retry.initial_backoff cannot exceed retry.max_backoff".to_string(),
            ));
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "call_timeout must be greater than 0".to_string(),
            ));
        }

        if self.video_max_poll_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "video_max_poll_attempts must be greater than 0".to_string(),
            ));
        }

        if self.duration_limits.min_seconds == 0
            || self.duration_limits.min_seconds > self.duration_limits.max_seconds
        {
            return Err(ConfigError::ValidationFailed(format!(
                "duration limits must satisfy 0 < min <= max, got {}..{}",
                self.duration_limits.min_seconds, self.duration_limits.max_seconds
            )));
        }

        if self.seconds_per_segment.is_nan() || self.seconds_per_segment <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "seconds_per_segment must be greater than 0".to_string(),
            ));
        }

        if self.max_segments == 0 || self.max_segments > MAX_SEGMENTS {
            return Err(ConfigError::ValidationFailed(format!(
                "max_segments must be between 1 and {}",
                MAX_SEGMENTS
            )));
        }

        if self.batch_parallelism == 0 {
            return Err(ConfigError::ValidationFailed(
                "batch_parallelism must be greater than 0".to_string(),
            ));
        }

        if self.store_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "store_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    // Builder methods

    /// Sets the retry policy for provider calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets video polling interval and attempt budget.
    pub fn with_video_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.video_poll_interval = interval;
        self.video_max_poll_attempts = max_attempts;
        self
    }

    /// Sets the system duration limits.
    pub fn with_duration_limits(mut self, limits: DurationLimits) -> Self {
        self.duration_limits = limits;
        self
    }

    /// Sets the narration seconds per segment.
    pub fn with_seconds_per_segment(mut self, seconds: f64) -> Self {
        self.seconds_per_segment = seconds;
        self
    }

    /// Sets the segment cap.
    pub fn with_max_segments(mut self, max_segments: u32) -> Self {
        self.max_segments = max_segments;
        self
    }

    /// Sets the default batch parallelism.
    pub fn with_batch_parallelism(mut self, parallelism: usize) -> Self {
        self.batch_parallelism = parallelism;
        self
    }

    /// Sets the store URL.
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = url.into();
        self
    }

    /// Sets the job retention TTL.
    pub fn with_job_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl = Some(ttl);
        self
    }

    /// Sets the music selection seed.
    pub fn with_music_seed(mut self, seed: u64) -> Self {
        self.music_seed = Some(seed);
        self
    }
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
