// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy and circuit breaker configuration values.

use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ResilienceError, Result};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// `base * 2^attempt`
    #[default]
    ExponentialBackoff,
    /// `base * (attempt + 1)`
    Linear,
    /// `base`
    Fixed,
}

impl RetryStrategy {
    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryStrategy::ExponentialBackoff => "exponential-backoff",
            RetryStrategy::Linear => "linear",
            RetryStrategy::Fixed => "fixed",
        }
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pattern matched against a normalized failure message.
///
/// In YAML a plain string is a case-insensitive substring, and
/// `{ regex: "..." }` is a regular expression.
#[derive(Debug, Clone)]
pub enum ErrorPattern {
    /// Case-insensitive substring.
    Substring(String),
    /// Regular expression, matched as written.
    Regex(Regex),
}

impl ErrorPattern {
    /// Create a case-insensitive substring pattern.
    pub fn substring(pattern: impl Into<String>) -> Self {
        ErrorPattern::Substring(pattern.into())
    }

    /// Compile a regular expression pattern.
    ///
    /// # Errors
    ///
    /// Returns `ResilienceError::Config` if the expression does not compile.
    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(ErrorPattern::Regex)
            .map_err(|e| ResilienceError::Config(format!("invalid error pattern {pattern:?}: {e}")))
    }

    /// Returns `true` if `message` matches this pattern.
    #[must_use]
    pub fn matches(&self, message: &str) -> bool {
        match self {
            ErrorPattern::Substring(needle) => message
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
            ErrorPattern::Regex(re) => re.is_match(message),
        }
    }

    /// The pattern source text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ErrorPattern::Substring(s) => s,
            ErrorPattern::Regex(re) => re.as_str(),
        }
    }
}

impl PartialEq for ErrorPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ErrorPattern::Substring(a), ErrorPattern::Substring(b)) => a == b,
            (ErrorPattern::Regex(a), ErrorPattern::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PatternRepr {
    Substring(String),
    Regex { regex: String },
}

impl Serialize for ErrorPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = match self {
            ErrorPattern::Substring(s) => PatternRepr::Substring(s.clone()),
            ErrorPattern::Regex(re) => PatternRepr::Regex {
                regex: re.as_str().to_string(),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ErrorPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match PatternRepr::deserialize(deserializer)? {
            PatternRepr::Substring(s) => Ok(ErrorPattern::Substring(s)),
            PatternRepr::Regex { regex } => Regex::new(&regex)
                .map(ErrorPattern::Regex)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Durations are carried as whole milliseconds on the wire.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Retry policy for a single operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Strategy for calculating wait times between attempts.
    pub strategy: RetryStrategy,
    /// Base delay.
    #[serde(rename = "base_delay_ms", with = "millis")]
    pub base_delay: Duration,
    /// Upper bound for any computed delay.
    #[serde(rename = "max_delay_ms", with = "millis")]
    pub max_delay: Duration,
    /// Maximum number of retries, not counting the first attempt.
    pub max_retries: u32,
    /// Replace the computed delay with a uniform random value below it.
    pub jitter: bool,
    /// Failures matching any of these fail fast.
    pub no_retry_patterns: Vec<ErrorPattern>,
    /// Failures matching any of these are always retried.
    pub always_retry_patterns: Vec<ErrorPattern>,
    /// Timeout for a single attempt.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::ExponentialBackoff,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            max_retries: 3,
            jitter: true,
            no_retry_patterns: Vec::new(),
            always_retry_patterns: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicyConfig {
    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ResilienceError::Config` if `max_delay < base_delay`.
    pub fn validate(&self) -> Result<()> {
        if self.max_delay < self.base_delay {
            return Err(ResilienceError::Config(format!(
                "max_delay ({}ms) must be >= base_delay ({}ms)",
                self.max_delay.as_millis(),
                self.base_delay.as_millis()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for RetryPolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (base: {}ms, max: {}ms, retries: {}, jitter: {})",
            self.strategy,
            self.base_delay.as_millis(),
            self.max_delay.as_millis(),
            self.max_retries,
            self.jitter
        )
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to stay open before allowing a half-open trial call.
    #[serde(rename = "reset_timeout_ms", with = "millis")]
    pub reset_timeout: Duration,
    /// Successes in half-open state needed to close the circuit.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold for recovery.
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the reset timeout.
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ResilienceError::Config` if either threshold is zero.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(ResilienceError::Config(
                "failure_threshold must be >= 1".to_string(),
            ));
        }
        if self.success_threshold == 0 {
            return Err(ResilienceError::Config(
                "success_threshold must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry policy plus circuit breaker settings for one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(flatten)]
    pub policy: RetryPolicyConfig,
    #[serde(flatten)]
    pub breaker: CircuitBreakerConfig,
}

impl RetryConfig {
    /// Create a configuration from its two halves.
    #[must_use]
    pub fn new(policy: RetryPolicyConfig, breaker: CircuitBreakerConfig) -> Self {
        Self { policy, breaker }
    }

    /// Check every invariant of both halves.
    ///
    /// # Errors
    ///
    /// Returns `ResilienceError::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.breaker.validate()
    }

    /// Set the backoff strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.policy.strategy = strategy;
        self
    }

    /// Set base and maximum delay together.
    #[must_use]
    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.policy.base_delay = base;
        self.policy.max_delay = max;
        self
    }

    /// Set the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.policy.jitter = jitter;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = timeout;
        self
    }

    /// Add a pattern that makes matching failures fail fast.
    #[must_use]
    pub fn with_no_retry_pattern(mut self, pattern: ErrorPattern) -> Self {
        self.policy.no_retry_patterns.push(pattern);
        self
    }

    /// Add a pattern that makes matching failures always retry.
    #[must_use]
    pub fn with_always_retry_pattern(mut self, pattern: ErrorPattern) -> Self {
        self.policy.always_retry_patterns.push(pattern);
        self
    }

    /// Set the breaker failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker.failure_threshold = threshold;
        self
    }

    /// Set the breaker reset timeout.
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.breaker.reset_timeout = timeout;
        self
    }

    /// Set the breaker success threshold.
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.breaker.success_threshold = threshold;
        self
    }
}
