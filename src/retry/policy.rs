//! Backoff policy and jitter sources.

use std::sync::Mutex;
use std::time::Duration;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first call. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Ceiling for both the backoff and the jittered delay.
    pub max_backoff: Duration,
    /// Growth factor applied to the backoff after each retry.
    pub multiplier: f64,
    /// Fraction of the current backoff used as the jitter amplitude.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and default backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial backoff.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Sets the maximum backoff.
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction (clamped to `0.0..=1.0`).
    pub fn with_jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Effective attempt budget (at least one call is always made).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Computes the sleep before the next attempt.
    ///
    /// `delay = min(current + current * jitter_fraction * sample, max_backoff)`,
    /// where `sample` is drawn from `uniform(-1, 1)`.
    pub fn delay_for(&self, current: Duration, sample: f64) -> Duration {
        let current_ns = current.as_nanos() as f64;
        let jitter_ns = current_ns * self.jitter_fraction * sample.clamp(-1.0, 1.0);
        let max_ns = self.max_backoff.as_nanos() as f64;
        nanos((current_ns + jitter_ns).min(max_ns))
    }

    /// Grows the backoff: `min(current * multiplier, max_backoff)`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        let grown = current.as_nanos() as f64 * self.multiplier.max(1.0);
        nanos(grown.min(self.max_backoff.as_nanos() as f64))
    }
}

fn nanos(value: f64) -> Duration {
    Duration::from_nanos(value.max(0.0).round() as u64)
}

/// Source of jitter samples in `[-1, 1]`.
pub trait JitterSource: Send + Sync {
    /// Draws one sample from `uniform(-1, 1)`.
    fn sample(&self) -> f64;
}

/// Jitter backed by a ChaCha8 generator, seedable for deterministic tests.
pub struct RandomJitter {
    rng: Mutex<ChaCha8Rng>,
}

impl RandomJitter {
    /// Creates a jitter source seeded from the thread RNG.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::from_rng(&mut rand::rng())),
        }
    }

    /// Creates a deterministic jitter source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.random_range(-1.0..=1.0),
            Err(poisoned) => poisoned.into_inner().random_range(-1.0..=1.0),
        }
    }
}

/// Jitter that always returns the same sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}
