// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry executor combining policy, circuit breaker and metrics.
//!
//! A [`RetryContext`] owns the shared state (breaker registry, metrics
//! collector and attempt event channel). A [`RetryExecutor`] binds one
//! operation name and configuration to a context and runs operations through
//! the retry loop.
//!
//! # Example
//!
//! ```no_run
//! use resilience_rs::config::RetryConfig;
//! use resilience_rs::error::Failure;
//! use resilience_rs::runtime::{RetryContext, RetryExecutor};
//!
//! # async fn example() -> resilience_rs::error::Result<()> {
//! let ctx = RetryContext::new();
//! let executor = RetryExecutor::new("completion-api", &RetryConfig::completion_api(), &ctx)?;
//!
//! let answer = executor
//!     .execute(|| async { Ok::<_, Failure>("42".to_string()) })
//!     .await?;
//! println!("{answer}");
//! println!("{}", ctx.status_report());
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState, Clock, SystemClock};
use super::logging::{AttemptLogger, LoggingConfig};
use super::metrics::{AttemptEvents, MetricsCollector, MetricsSink, RetryMetrics, MAX_STORED_METRICS};
use super::policy::{calculate_delay, error_message, should_retry};
use super::tracing::AttemptSpan;
use crate::config::{Preset, RetryConfig};
use crate::error::{Failure, FailureKind, ResilienceError, Result, RetryExhaustedError};

static GLOBAL_CONTEXT: Lazy<RetryContext> = Lazy::new(RetryContext::new);

/// Shared state for executors: breakers, metrics and attempt events.
///
/// Cloning is cheap and clones share state.
#[derive(Debug, Clone)]
pub struct RetryContext {
    registry: Arc<CircuitBreakerRegistry>,
    collector: Arc<MetricsCollector>,
    events: AttemptEvents,
}

impl RetryContext {
    /// Create an isolated context using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an isolated context whose breakers read time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let registry = Arc::new(CircuitBreakerRegistry::with_clock(clock));
        let collector = Arc::new(MetricsCollector::with_registry(Arc::clone(&registry)));
        Self {
            registry,
            collector,
            events: AttemptEvents::default(),
        }
    }

    /// The process-wide default context, created on first use.
    #[must_use]
    pub fn global() -> &'static RetryContext {
        &GLOBAL_CONTEXT
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn collector(&self) -> &Arc<MetricsCollector> {
        &self.collector
    }

    #[must_use]
    pub fn events(&self) -> &AttemptEvents {
        &self.events
    }

    /// Subscribe to every attempt record produced through this context.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RetryMetrics> {
        self.events.subscribe()
    }

    /// Build an executor for `operation_name` and run `operation` once
    /// through it.
    ///
    /// # Errors
    ///
    /// See [`RetryExecutor::new`] and [`RetryExecutor::execute`].
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation_name: &str,
        config: &RetryConfig,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<Failure>,
    {
        RetryExecutor::new(operation_name, config, self)?
            .execute(operation)
            .await
    }

    /// One status line per breaker, sorted by operation name.
    #[must_use]
    pub fn all_circuit_breaker_status(&self) -> Vec<String> {
        self.registry.all_status()
    }

    /// The metrics collector's report.
    #[must_use]
    pub fn status_report(&self) -> String {
        self.collector.status_report()
    }

    /// Close every breaker and drop all metrics and alerts.
    pub fn reset(&self) {
        self.registry.reset_all();
        self.collector.reset();
    }
}

impl Default for RetryContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs operations for one named dependency with retries and a circuit
/// breaker.
pub struct RetryExecutor {
    operation_name: String,
    config: RetryConfig,
    breaker: Arc<CircuitBreaker>,
    sinks: Vec<Arc<dyn MetricsSink>>,
    logger: AttemptLogger,
    history: Mutex<VecDeque<RetryMetrics>>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("operation_name", &self.operation_name)
            .field("config", &self.config)
            .field("breaker", &self.breaker.state())
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl RetryExecutor {
    /// Create an executor bound to `ctx`.
    ///
    /// The breaker for `operation_name` is taken from the context's registry,
    /// or created with `config.breaker` on first use.
    ///
    /// # Errors
    ///
    /// Returns `ResilienceError::Config` if `config` is invalid.
    pub fn new(
        operation_name: impl Into<String>,
        config: &RetryConfig,
        ctx: &RetryContext,
    ) -> Result<Self> {
        config.validate()?;

        let operation_name = operation_name.into();
        let breaker = ctx.registry.get_or_create(&operation_name, &config.breaker);
        let collector: Arc<dyn MetricsSink> = Arc::clone(&ctx.collector) as Arc<dyn MetricsSink>;
        let events: Arc<dyn MetricsSink> = Arc::new(ctx.events.clone());

        Ok(Self {
            operation_name,
            config: config.clone(),
            breaker,
            sinks: vec![collector, events],
            logger: AttemptLogger::new(),
            history: Mutex::new(VecDeque::new()),
        })
    }

    /// Add a receiver for this executor's attempt records.
    #[must_use]
    pub fn with_sink(mut self, sink: impl MetricsSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Replace the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logger = AttemptLogger::with_config(config);
        self
    }

    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    #[must_use]
    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    #[must_use]
    pub fn circuit_breaker_status(&self) -> String {
        self.breaker.status()
    }

    #[must_use]
    pub fn logger(&self) -> &AttemptLogger {
        &self.logger
    }

    /// Attempt records produced by this executor, oldest first.
    #[must_use]
    pub fn metrics(&self) -> Vec<RetryMetrics> {
        self.history.lock().iter().cloned().collect()
    }

    /// Drop this executor's records and reset its breaker.
    pub fn reset(&self) {
        self.history.lock().clear();
        self.breaker.reset();
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of retries.
    ///
    /// Each attempt is bounded by the configured timeout. A timed out attempt
    /// is dropped, which cancels it at its next suspension point; tasks it
    /// spawned onto the runtime keep running.
    ///
    /// # Errors
    ///
    /// - `ResilienceError::CircuitOpen` if the breaker refuses the call, or
    ///   the operation itself failed with a circuit-open failure
    /// - `ResilienceError::RetryExhausted` with the last failure otherwise
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<Failure>,
    {
        let name = self.operation_name.as_str();
        let policy = &self.config.policy;
        let max_retries = policy.max_retries;
        let mut attempt = 0;

        loop {
            let span = AttemptSpan::new(name, attempt, max_retries);

            if let Err(open) = self.breaker.check_state() {
                span.record_rejected();
                self.logger.rejected(name, open.retry_in);
                self.emit(
                    RetryMetrics::new(name, attempt, max_retries, false, CircuitState::Open)
                        .with_error(open.to_string()),
                );
                return Err(open.into());
            }

            let started = Instant::now();
            let outcome = span
                .instrument(tokio::time::timeout(policy.timeout, operation()))
                .await;
            let duration = started.elapsed();

            let failure: Failure = match outcome {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    span.record_success(duration);
                    self.logger.succeeded(name, attempt, duration);
                    self.emit(
                        RetryMetrics::new(name, attempt, max_retries, true, self.breaker.state())
                            .with_duration(duration),
                    );
                    return Ok(value);
                }
                Ok(Err(err)) => err.into(),
                Err(_) => Failure::timeout(format!(
                    "Operation timeout after {}ms",
                    policy.timeout.as_millis()
                )),
            };
            let message = error_message(&failure);

            if let FailureKind::CircuitOpen(open) = failure.kind() {
                span.record_failure(&message, duration);
                self.emit(
                    RetryMetrics::new(name, attempt, max_retries, false, self.breaker.state())
                        .with_error(message)
                        .with_duration(duration),
                );
                return Err(ResilienceError::CircuitOpen(open.clone()));
            }

            if !should_retry(&failure, attempt, policy) {
                self.breaker.record_failure();
                span.record_failure(&message, duration);
                self.logger.gave_up(name, attempt + 1, &message);
                self.emit(
                    RetryMetrics::new(name, attempt, max_retries, false, self.breaker.state())
                        .with_error(message)
                        .with_duration(duration),
                );
                return Err(RetryExhaustedError {
                    operation: self.operation_name.clone(),
                    attempts: attempt + 1,
                    max_retries,
                    cause: failure,
                }
                .into());
            }

            let delay = calculate_delay(
                policy.strategy,
                attempt,
                policy.base_delay,
                policy.max_delay,
                policy.jitter,
            );
            span.record_retry(&message, delay, duration);
            self.logger
                .retry_scheduled(name, attempt, max_retries, delay, &message);
            self.emit(
                RetryMetrics::new(name, attempt, max_retries, false, self.breaker.state())
                    .with_error(message)
                    .with_delay(delay)
                    .with_duration(duration),
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn emit(&self, metric: RetryMetrics) {
        for sink in &self.sinks {
            sink.record(&metric);
        }

        let mut history = self.history.lock();
        history.push_back(metric);
        if history.len() > MAX_STORED_METRICS {
            history.pop_front();
        }
    }
}

/// Run `operation` through the global context.
///
/// # Errors
///
/// See [`RetryExecutor::new`] and [`RetryExecutor::execute`].
pub async fn execute_with_retry<T, E, F, Fut>(
    operation_name: &str,
    config: &RetryConfig,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<Failure>,
{
    RetryContext::global()
        .execute(operation_name, config, operation)
        .await
}

/// Run `operation` through the global context, also reporting every attempt
/// record to `sink`.
///
/// Equivalent to building a [`RetryExecutor`] on [`RetryContext::global`] and
/// adding `sink` with [`RetryExecutor::with_sink`].
///
/// # Errors
///
/// See [`RetryExecutor::new`] and [`RetryExecutor::execute`].
pub async fn execute_with_retry_and_sink<T, E, F, Fut>(
    operation_name: &str,
    config: &RetryConfig,
    sink: impl MetricsSink + 'static,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<Failure>,
{
    RetryExecutor::new(operation_name, config, RetryContext::global())?
        .with_sink(sink)
        .execute(operation)
        .await
}

impl Preset {
    /// Run `operation` under this preset's configuration and operation name.
    ///
    /// # Errors
    ///
    /// See [`RetryExecutor::execute`].
    pub async fn execute<T, E, F, Fut>(self, ctx: &RetryContext, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<Failure>,
    {
        ctx.execute(self.operation_name(), &self.config(), operation)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ErrorPattern, RetryStrategy};
    use crate::testkit::{MockClock, ScriptedOperation};
    use http::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::default()
            .with_strategy(RetryStrategy::Fixed)
            .with_delays(Duration::from_millis(1), Duration::from_millis(1))
            .with_max_retries(max_retries)
            .with_jitter(false)
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let ctx = RetryContext::new();
        let executor = RetryExecutor::new("op", &fast_config(3), &ctx).unwrap();

        let value = executor
            .execute(|| async { Ok::<_, Failure>(42) })
            .await
            .unwrap();

        assert_eq!(value, 42);
        let records = executor.metrics();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].attempt, 0);
        assert_eq!(records[0].delay, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let ctx = RetryContext::new();
        let config = fast_config(3);
        let executor = RetryExecutor::new("op", &config, &ctx).unwrap();
        let op = ScriptedOperation::new()
            .fail_times(2, "service unavailable")
            .succeed("done");

        let value = executor.execute(|| op.call()).await.unwrap();

        assert_eq!(value, "done");
        assert_eq!(op.calls(), 3);
        let records = executor.metrics();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].delay, Duration::from_millis(1));
        assert!(records[2].success);
        assert_eq!(executor.circuit_breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let ctx = RetryContext::new();
        let executor = RetryExecutor::new("op", &fast_config(2), &ctx).unwrap();
        let op = ScriptedOperation::<()>::new().fail("socket hang up");

        let err = executor.execute(|| op.call()).await.unwrap_err();

        assert_eq!(op.calls(), 3);
        match err {
            ResilienceError::RetryExhausted(e) => {
                assert_eq!(e.attempts, 3);
                assert_eq!(e.max_retries, 2);
                assert_eq!(e.cause.message(), "socket hang up");
            }
            other => panic!("unexpected error: {other}"),
        }
        // Only the final failure counts against the breaker.
        assert_eq!(executor.circuit_breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_never_retry_pattern_stops_immediately() {
        let ctx = RetryContext::new();
        let config = fast_config(3).with_no_retry_pattern(ErrorPattern::substring("invalid input"));
        let executor = RetryExecutor::new("op", &config, &ctx).unwrap();
        let op = ScriptedOperation::<()>::new().fail("Invalid input: missing prompt");

        let err = executor.execute(|| op.call()).await.unwrap_err();

        assert_eq!(op.calls(), 1);
        assert_eq!(
            err.to_string(),
            "op failed after 1 attempt(s): Invalid input: missing prompt"
        );
    }

    #[tokio::test]
    async fn test_http_status_classification() {
        let ctx = RetryContext::new();
        let config = RetryConfig::payments_api()
            .with_delays(Duration::from_millis(1), Duration::from_millis(1));
        let executor = RetryExecutor::new("payments", &config, &ctx).unwrap();
        let op = ScriptedOperation::<()>::new().fail(StatusCode::PAYMENT_REQUIRED);

        let err = executor.execute(|| op.call()).await.unwrap_err();

        assert_eq!(op.calls(), 1);
        assert_eq!(err.cause().and_then(Failure::status), Some(StatusCode::PAYMENT_REQUIRED));
        assert!(err.to_string().ends_with("402: Payment Required"));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let ctx = RetryContext::new();
        let config = fast_config(1).with_timeout(Duration::from_millis(20));
        let executor = RetryExecutor::new("slow", &config, &ctx).unwrap();
        let op = ScriptedOperation::new().hang().succeed(5);

        let value = executor.execute(|| op.call()).await.unwrap();

        assert_eq!(value, 5);
        assert_eq!(op.calls(), 2);
        let records = executor.metrics();
        assert_eq!(
            records[0].error.as_deref(),
            Some("Operation timeout after 20ms")
        );
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_calling() {
        let ctx = RetryContext::new();
        let config = fast_config(0).with_failure_threshold(2);
        let executor = RetryExecutor::new("flaky", &config, &ctx).unwrap();
        let op = ScriptedOperation::<()>::new().fail("boom");

        for _ in 0..2 {
            let err = executor.execute(|| op.call()).await.unwrap_err();
            assert!(err.is_retry_exhausted());
        }
        assert_eq!(executor.circuit_breaker().state(), CircuitState::Open);

        let err = executor.execute(|| op.call()).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(op.calls(), 2);

        let last = executor.metrics().pop().unwrap();
        assert_eq!(last.circuit_state, CircuitState::Open);
        assert!(!last.success);
    }

    #[tokio::test]
    async fn test_half_open_trial_closes_circuit() {
        let clock = MockClock::new();
        let ctx = RetryContext::with_clock(Arc::new(clock.clone()));
        let config = fast_config(0)
            .with_failure_threshold(1)
            .with_success_threshold(1)
            .with_reset_timeout(Duration::from_secs(30));
        let executor = RetryExecutor::new("trial", &config, &ctx).unwrap();

        let failing = ScriptedOperation::<u8>::new().fail("boom");
        assert!(executor.execute(|| failing.call()).await.is_err());
        assert!(executor
            .execute(|| async { Ok::<_, Failure>(1u8) })
            .await
            .unwrap_err()
            .is_circuit_open());

        clock.advance(Duration::from_secs(30));
        let value = executor
            .execute(|| async { Ok::<_, Failure>(2u8) })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(executor.circuit_breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_nested_circuit_open_is_not_retried() {
        let ctx = RetryContext::new();
        let inner_config = fast_config(0).with_failure_threshold(1);
        let inner = RetryExecutor::new("inner", &inner_config, &ctx).unwrap();
        let outer = RetryExecutor::new("outer", &fast_config(3), &ctx).unwrap();

        let _ = inner
            .execute(|| async { Err::<(), _>(Failure::other("down")) })
            .await;

        let calls = AtomicU32::new(0);
        let err = outer
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                inner.execute(|| async { Ok::<_, Failure>(()) })
            })
            .await
            .unwrap_err();

        assert!(err.is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outer.circuit_breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let ctx = RetryContext::new();
        let config = RetryConfig::default()
            .with_delays(Duration::from_secs(10), Duration::from_secs(1));

        let err = RetryExecutor::new("bad", &config, &ctx).unwrap_err();
        assert!(matches!(err, ResilienceError::Config(_)));
    }

    #[tokio::test]
    async fn test_sinks_and_events_receive_records() {
        let ctx = RetryContext::new();
        let mut events = ctx.subscribe();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);

        let executor = RetryExecutor::new("op", &fast_config(2), &ctx)
            .unwrap()
            .with_sink(move |_: &RetryMetrics| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let op = ScriptedOperation::new().fail("flaky").succeed(1);

        executor.execute(|| op.call()).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(!events.recv().await.unwrap().success);
        assert!(events.recv().await.unwrap().success);

        let agg = ctx.collector().aggregated_metrics("op").unwrap();
        assert_eq!(agg.total_attempts, 2);
        assert_eq!(agg.success_rate, 50.0);
        assert_eq!(agg.last_error.as_deref(), Some("flaky"));
    }

    #[tokio::test]
    async fn test_executors_share_breaker_by_name() {
        let ctx = RetryContext::new();
        let first = RetryExecutor::new("shared", &fast_config(0), &ctx).unwrap();
        let second = RetryExecutor::new("shared", &fast_config(0), &ctx).unwrap();

        assert!(Arc::ptr_eq(first.circuit_breaker(), second.circuit_breaker()));
        assert_eq!(ctx.all_circuit_breaker_status().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_history_and_breaker() {
        let ctx = RetryContext::new();
        let config = fast_config(0).with_failure_threshold(1);
        let executor = RetryExecutor::new("op", &config, &ctx).unwrap();

        let _ = executor
            .execute(|| async { Err::<(), _>(Failure::other("boom")) })
            .await;
        assert_eq!(executor.circuit_breaker().state(), CircuitState::Open);

        executor.reset();
        assert!(executor.metrics().is_empty());
        assert_eq!(executor.circuit_breaker().state(), CircuitState::Closed);
        assert_eq!(
            executor.circuit_breaker_status(),
            "op: CLOSED (failures: 0/1, rate: 100.0%)"
        );
    }

    #[tokio::test]
    async fn test_history_keeps_newest_records() {
        let ctx = RetryContext::new();
        let executor = RetryExecutor::new("op", &fast_config(0), &ctx).unwrap();

        let _ = executor
            .execute(|| async { Err::<(), _>(Failure::other("oldest")) })
            .await;
        for _ in 0..MAX_STORED_METRICS {
            executor
                .execute(|| async { Ok::<_, Failure>(()) })
                .await
                .unwrap();
        }

        let records = executor.metrics();
        assert_eq!(records.len(), MAX_STORED_METRICS);
        assert!(records.iter().all(|m| m.success && m.error.is_none()));
    }

    #[tokio::test]
    async fn test_global_entry_point_with_sink() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let op = ScriptedOperation::new().fail("flaky").succeed(5);

        let value = execute_with_retry_and_sink(
            "global-with-sink",
            &fast_config(1),
            move |_: &RetryMetrics| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            || op.call(),
        )
        .await
        .unwrap();

        assert_eq!(value, 5);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(RetryContext::global()
            .collector()
            .aggregated_metrics("global-with-sink")
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preset_execute_uses_operation_name() {
        let ctx = RetryContext::new();
        let op = ScriptedOperation::new()
            .fail(StatusCode::SERVICE_UNAVAILABLE)
            .succeed("ok");

        let value = Preset::DocumentStore
            .execute(&ctx, || op.call())
            .await
            .unwrap();

        assert_eq!(value, "ok");
        assert!(ctx.registry().get("document-store").is_some());
    }

    #[tokio::test]
    async fn test_logger_counts_events() {
        let ctx = RetryContext::new();
        let executor = RetryExecutor::new("op", &fast_config(1), &ctx)
            .unwrap()
            .with_logging(LoggingConfig::quiet());
        let op = ScriptedOperation::<()>::new().fail("nope");

        let _ = executor.execute(|| op.call()).await;

        let counters = executor.logger().counters();
        assert_eq!(counters.retries(), 1);
        assert_eq!(counters.failures(), 1);
    }
}
