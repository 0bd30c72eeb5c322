//! Error types shared across reelforge subsystems.
//!
//! Defines the error enums that cross module boundaries:
//! - External capability (port) failures, classified for retry decisions
//! - Job persistence and state-transition failures

use std::time::Duration;

use thiserror::Error;

/// Errors raised by external capability ports (transcription, LLM, TTS,
/// image/video generation, catalogs, render, webhooks).
///
/// The variants mirror the shape of HTTP failures so the default retry
/// classifier can decide without knowing which vendor produced the error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The provider answered with a non-success status code.
    #[error("Provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// No response was received (connection refused, reset, DNS failure).
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete within its deadline.
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered, but the payload could not be used.
    #[error("Malformed provider output: {0}")]
    Malformed(String),

    /// The provider reported a failed operation (e.g. a generation task
    /// that finished in an error state).
    #[error("Provider operation failed: {0}")]
    Failed(String),

    /// A capability required by the stage has not been configured.
    #[error("Capability not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Creates an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Default retryability classification for HTTP-shaped errors.
    ///
    /// Retries when no response arrived (network errors and timeouts), on
    /// `429 Too Many Requests` and on any `5xx`. Other `4xx` responses and
    /// malformed payloads are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            ProviderError::Malformed(_)
            | ProviderError::Failed(_)
            | ProviderError::NotConfigured(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ProviderError::http(status.as_u16(), err.to_string())
        } else if err.is_timeout() {
            ProviderError::Network(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}

/// Errors that can occur in the job store and its repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Job '{0}' already exists")]
    AlreadyExists(String),

    #[error("Invalid status transition for job '{id}' from '{from}' to '{to}'")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("Job '{0}' is completed and can no longer be modified")]
    Immutable(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] crate::jobs::postgres::MigrationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}
