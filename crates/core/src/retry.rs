//! Retry and backoff utilities for registry network operations
//!
//! This module provides configurable retry mechanisms with exponential backoff
//! and jitter to improve resilience of blob and manifest transfers against
//! transient registry failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Jitter strategy for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JitterStrategy {
    /// Full jitter: random delay between 0 and calculated delay
    #[default]
    FullJitter,
    /// Equal jitter: half calculated delay plus random half  
    EqualJitter,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (excluding initial attempt)
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Jitter strategy to apply
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with specified parameters
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter: JitterStrategy,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter,
        }
    }

    /// Calculate delay for a given attempt number (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        // Exponential backoff: base_delay * 2^attempt
        let exponential_delay = self
            .base_delay
            .as_millis()
            .saturating_mul(2_u128.pow(attempt));

        // Cap at max_delay
        let capped_delay = exponential_delay.min(self.max_delay.as_millis());
        let delay_ms = capped_delay as u64;

        self.apply_jitter(Duration::from_millis(delay_ms))
    }

    /// Apply jitter to the calculated delay
    fn apply_jitter(&self, delay: Duration) -> Duration {
        match self.jitter {
            JitterStrategy::FullJitter => {
                // Random delay between 0 and full calculated delay
                let jitter_ms = fastrand::u64(0..=delay.as_millis() as u64);
                Duration::from_millis(jitter_ms)
            }
            JitterStrategy::EqualJitter => {
                // Half calculated delay plus random half
                let half_delay = delay.as_millis() as u64 / 2;
                let jitter_ms = half_delay + fastrand::u64(0..=half_delay);
                Duration::from_millis(jitter_ms)
            }
        }
    }

    /// Apply jitter with seeded RNG for deterministic testing
    #[cfg(test)]
    fn apply_jitter_seeded(&self, delay: Duration, seed: u64) -> Duration {
        let mut rng = fastrand::Rng::with_seed(seed);
        match self.jitter {
            JitterStrategy::FullJitter => {
                let jitter_ms = rng.u64(0..=delay.as_millis() as u64);
                Duration::from_millis(jitter_ms)
            }
            JitterStrategy::EqualJitter => {
                let half_delay = delay.as_millis() as u64 / 2;
                let jitter_ms = half_delay + rng.u64(0..=half_delay);
                Duration::from_millis(jitter_ms)
            }
        }
    }

    /// Calculate delay with seeded RNG for testing
    #[cfg(test)]
    pub fn calculate_delay_seeded(&self, attempt: u32, seed: u64) -> Duration {
        let exponential_delay = self
            .base_delay
            .as_millis()
            .saturating_mul(2_u128.pow(attempt));
        let capped_delay = exponential_delay.min(self.max_delay.as_millis());
        let delay_ms = capped_delay as u64;

        self.apply_jitter_seeded(Duration::from_millis(delay_ms), seed)
    }
}

/// Error classification result for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation
    Retry,
    /// Do not retry (terminal error)
    Stop,
}

/// Error classifier function type
pub type ErrorClassifier<E> = fn(&E) -> RetryDecision;

/// Default error classifier that retries on all errors
pub fn default_classifier<E>(_error: &E) -> RetryDecision {
    RetryDecision::Retry
}

/// Retry an async operation with exponential backoff and jitter
#[instrument(level = "debug", skip(operation, classify_error))]
pub async fn retry_async<T, E, Fut, Op>(
    config: &RetryConfig,
    operation: Op,
    classify_error: ErrorClassifier<E>,
) -> std::result::Result<T, E>
where
    Op: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut last_error = None;

    for attempt in 0..=config.max_attempts {
        debug!("Retry attempt {} of {}", attempt, config.max_attempts);

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                debug!("Operation failed on attempt {}: {:?}", attempt, error);

                // Check if we should retry this error
                if classify_error(&error) == RetryDecision::Stop {
                    debug!("Error classifier indicated stop, not retrying");
                    return Err(error);
                }

                last_error = Some(error);

                // Don't sleep after the last attempt
                if attempt < config.max_attempts {
                    let delay = config.calculate_delay(attempt);
                    debug!("Sleeping for {:?} before next attempt", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // All attempts exhausted
    let final_error = last_error.expect("Should have at least one error");
    warn!(
        "All {} retry attempts exhausted, final error: {:?}",
        config.max_attempts + 1,
        final_error
    );
    Err(final_error)
}
