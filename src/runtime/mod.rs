// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime utilities for resilience and observability.
//!
//! This module provides the retry executor and the pieces it is built from:
//! the retry policy engine, per-operation circuit breakers, attempt metrics,
//! structured logging and tracing spans.

mod circuit_breaker;
mod executor;
mod logging;
pub mod metrics;
mod policy;
pub mod tracing;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitBreakerStats, CircuitState, Clock, SystemClock,
};
pub use executor::{
    execute_with_retry, execute_with_retry_and_sink, RetryContext, RetryExecutor,
};
pub use logging::{AttemptLogger, LogCounters, LogLevel, LoggingConfig};
pub use metrics::{AggregatedMetrics, AttemptEvents, MetricsCollector, MetricsSink, RetryMetrics};
pub use policy::{
    calculate_delay, describe_retry_policy, error_message, matches_error_pattern, should_retry,
};
pub use self::tracing::AttemptSpan;
