// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured logging of retry attempts.
//!
//! [`AttemptLogger`] emits one log line per noteworthy event of an execution
//! (retry scheduled, success after retries, gave up, rejected by the circuit
//! breaker) under the `resilience::retry` target. The level of each kind of
//! event is configurable.
//!
//! # Example
//!
//! ```
//! use resilience_rs::runtime::{AttemptLogger, LogLevel, LoggingConfig};
//! use std::time::Duration;
//!
//! let logger = AttemptLogger::with_config(
//!     LoggingConfig::new()
//!         .with_retry_level(LogLevel::Info)
//!         .with_failure_level(LogLevel::Warn),
//! );
//! logger.retry_scheduled("completion-api", 0, 3, Duration::from_millis(1800), "429: Too Many Requests");
//! assert_eq!(logger.counters().retries(), 1);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

const TARGET: &str = "resilience::retry";

/// Log level for attempt events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level - only errors.
    Error,
    /// Disabled - no logging.
    Off,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            LogLevel::Trace => trace!(target: TARGET, $($arg)+),
            LogLevel::Debug => debug!(target: TARGET, $($arg)+),
            LogLevel::Info => info!(target: TARGET, $($arg)+),
            LogLevel::Warn => warn!(target: TARGET, $($arg)+),
            LogLevel::Error => error!(target: TARGET, $($arg)+),
            LogLevel::Off => {}
        }
    };
}

/// Configuration for the attempt logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level for successful executions.
    pub success_level: LogLevel,
    /// Level for scheduled retries.
    pub retry_level: LogLevel,
    /// Level for executions that gave up or were rejected.
    pub failure_level: LogLevel,
    /// Also log executions that succeeded on the first attempt.
    pub log_first_attempt: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            success_level: LogLevel::Info,
            retry_level: LogLevel::Warn,
            failure_level: LogLevel::Error,
            log_first_attempt: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the success log level.
    #[must_use]
    pub fn with_success_level(mut self, level: LogLevel) -> Self {
        self.success_level = level;
        self
    }

    /// Set the retry log level.
    #[must_use]
    pub fn with_retry_level(mut self, level: LogLevel) -> Self {
        self.retry_level = level;
        self
    }

    /// Set the failure log level.
    #[must_use]
    pub fn with_failure_level(mut self, level: LogLevel) -> Self {
        self.failure_level = level;
        self
    }

    /// Enable or disable logging of first-attempt successes.
    #[must_use]
    pub fn with_first_attempt(mut self, enabled: bool) -> Self {
        self.log_first_attempt = enabled;
        self
    }

    /// Create a verbose configuration for debugging.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            success_level: LogLevel::Debug,
            retry_level: LogLevel::Info,
            failure_level: LogLevel::Error,
            log_first_attempt: true,
        }
    }

    /// Create a quiet configuration for production.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            success_level: LogLevel::Off,
            retry_level: LogLevel::Off,
            failure_level: LogLevel::Warn,
            log_first_attempt: false,
        }
    }
}

/// Counts of the events passed to an [`AttemptLogger`], logged or not.
#[derive(Debug, Default)]
pub struct LogCounters {
    successes: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl LogCounters {
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.successes.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
    }
}

/// Level-configurable logger for execution events.
#[derive(Debug, Default)]
pub struct AttemptLogger {
    config: LoggingConfig,
    counters: LogCounters,
}

impl AttemptLogger {
    /// Create a new attempt logger with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an attempt logger with custom configuration.
    #[must_use]
    pub fn with_config(config: LoggingConfig) -> Self {
        Self {
            config,
            counters: LogCounters::default(),
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Get the event counters.
    #[must_use]
    pub fn counters(&self) -> &LogCounters {
        &self.counters
    }

    /// An attempt succeeded.
    pub fn succeeded(&self, operation: &str, attempt: u32, duration: Duration) {
        self.counters.successes.fetch_add(1, Ordering::Relaxed);

        if attempt == 0 && !self.config.log_first_attempt {
            return;
        }
        log_at!(
            self.config.success_level,
            operation = %operation,
            attempt,
            duration_ms = duration.as_millis() as u64,
            "{} succeeded after {} retry(ies)",
            operation,
            attempt
        );
    }

    /// An attempt failed and another one follows after `delay`.
    pub fn retry_scheduled(
        &self,
        operation: &str,
        attempt: u32,
        max_retries: u32,
        delay: Duration,
        error: &str,
    ) {
        self.counters.retries.fetch_add(1, Ordering::Relaxed);
        log_at!(
            self.config.retry_level,
            operation = %operation,
            attempt,
            max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "{} failed (attempt {}/{}), retrying in {}ms",
            operation,
            attempt + 1,
            max_retries + 1,
            delay.as_millis()
        );
    }

    /// The execution failed for good.
    pub fn gave_up(&self, operation: &str, attempts: u32, error: &str) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        log_at!(
            self.config.failure_level,
            operation = %operation,
            attempts,
            error = %error,
            "{} failed after {} attempt(s): {}",
            operation,
            attempts,
            error
        );
    }

    /// The circuit breaker refused the call.
    pub fn rejected(&self, operation: &str, retry_in: Duration) {
        self.counters.rejections.fetch_add(1, Ordering::Relaxed);
        log_at!(
            self.config.failure_level,
            operation = %operation,
            retry_in_ms = retry_in.as_millis() as u64,
            "{} rejected: circuit breaker open",
            operation
        );
    }
}
