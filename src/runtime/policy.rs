// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry decision logic and delay calculation.
//!
//! Everything here is a pure function of its inputs (jitter aside), so the
//! executor can consult it at every attempt without holding any state.
//!
//! # Example
//!
//! ```
//! use resilience_rs::config::RetryStrategy;
//! use resilience_rs::runtime::calculate_delay;
//! use std::time::Duration;
//!
//! let delay = calculate_delay(
//!     RetryStrategy::ExponentialBackoff,
//!     3,
//!     Duration::from_millis(100),
//!     Duration::from_secs(10),
//!     false,
//! );
//! assert_eq!(delay, Duration::from_millis(800));
//! ```

use std::time::Duration;

use crate::config::{ErrorPattern, RetryPolicyConfig, RetryStrategy};
use crate::error::{Failure, FailureKind};

/// Calculate the delay before the next attempt.
///
/// # Arguments
/// * `attempt` - The attempt that just failed (0-indexed)
///
/// The computed delay is capped at `max`. With `jitter`, the capped value is
/// replaced by a uniformly random value in `[0, capped]`. Whole milliseconds.
#[must_use]
pub fn calculate_delay(
    strategy: RetryStrategy,
    attempt: u32,
    base: Duration,
    max: Duration,
    jitter: bool,
) -> Duration {
    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let delay_ms = match strategy {
        RetryStrategy::ExponentialBackoff => {
            let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
            base_ms.saturating_mul(factor)
        }
        RetryStrategy::Linear => base_ms.saturating_mul(u64::from(attempt) + 1),
        RetryStrategy::Fixed => base_ms,
    };
    let capped_ms = delay_ms.min(max_ms);

    let final_ms = if jitter {
        (rand::random::<f64>() * capped_ms as f64).floor() as u64
    } else {
        capped_ms
    };

    Duration::from_millis(final_ms.min(capped_ms))
}

/// Normalize a failure into a single message string.
///
/// HTTP failures render as `"<status>: <message>"`, falling back to the
/// canonical reason when no message was given.
#[must_use]
pub fn error_message(failure: &Failure) -> String {
    match failure.kind() {
        FailureKind::Http(status) => {
            let detail = if failure.message().is_empty() {
                status.canonical_reason().unwrap_or("error")
            } else {
                failure.message()
            };
            format!("{}: {}", status.as_u16(), detail)
        }
        _ => failure.message().to_string(),
    }
}

/// Returns `true` if the normalized message matches any pattern.
#[must_use]
pub fn matches_error_pattern(failure: &Failure, patterns: &[ErrorPattern]) -> bool {
    let message = error_message(failure);
    patterns.iter().any(|p| p.matches(&message))
}

/// Decide whether another attempt should follow `attempt`.
///
/// Order of precedence: retries exhausted, always-retry match, never-retry
/// match. Unknown failures are retried. Circuit-open failures never are.
#[must_use]
pub fn should_retry(failure: &Failure, attempt: u32, config: &RetryPolicyConfig) -> bool {
    if attempt >= config.max_retries {
        return false;
    }

    if failure.is_circuit_open() {
        return false;
    }

    if matches_error_pattern(failure, &config.always_retry_patterns) {
        return true;
    }

    if matches_error_pattern(failure, &config.no_retry_patterns) {
        return false;
    }

    true
}

/// Human-readable one-line description of a policy.
#[must_use]
pub fn describe_retry_policy(config: &RetryPolicyConfig) -> String {
    config.to_string()
}
