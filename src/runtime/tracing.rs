// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-attempt tracing spans.
//!
//! Each attempt made by the executor runs inside an [`AttemptSpan`], so the
//! operation's own events nest under it and the span carries the outcome.
//!
//! # Example
//!
//! ```rust
//! use resilience_rs::runtime::AttemptSpan;
//! use std::time::Duration;
//!
//! let span = AttemptSpan::new("document-store", 1, 4);
//! span.record_retry(
//!     "14 UNAVAILABLE",
//!     Duration::from_millis(2000),
//!     Duration::from_millis(35),
//! );
//! ```
//!
//! # Fields
//!
//! | Field | Description |
//! |-------|-------------|
//! | `operation` | Operation name |
//! | `attempt` | Attempt index, 0-based |
//! | `max_retries` | Configured retries |
//! | `outcome` | `success`, `retry`, `failed` or `rejected` |
//! | `delay_ms` | Delay before the next attempt |
//! | `duration_ms` | Time spent in the attempt |
//! | `error.message` | Normalized failure message |
//!
//! Exporting the spans (OpenTelemetry or otherwise) is left to the
//! application's subscriber.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::instrument::Instrumented;
use tracing::{field, info_span, Instrument, Span};

/// A span for one attempt of an operation.
#[derive(Debug)]
pub struct AttemptSpan {
    span: Span,
    start: Instant,
    operation: String,
    attempt: u32,
}

impl AttemptSpan {
    /// Create a new span for an attempt.
    pub fn new(operation: &str, attempt: u32, max_retries: u32) -> Self {
        let span = info_span!(
            "resilience.attempt",
            operation = %operation,
            attempt,
            max_retries,
            outcome = field::Empty,
            delay_ms = field::Empty,
            duration_ms = field::Empty,
            error.message = field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            operation: operation.to_string(),
            attempt,
        }
    }

    /// Get the underlying `tracing::Span`.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Get elapsed time since span creation.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Run `future` inside this span.
    pub fn instrument<F: Future>(&self, future: F) -> Instrumented<F> {
        future.instrument(self.span.clone())
    }

    /// Record a successful attempt.
    pub fn record_success(&self, duration: Duration) {
        self.span.record("outcome", "success");
        self.span.record("duration_ms", duration.as_millis() as u64);
    }

    /// Record a failed attempt that will be retried after `delay`.
    pub fn record_retry(&self, error: &str, delay: Duration, duration: Duration) {
        self.span.record("outcome", "retry");
        self.span.record("error.message", error);
        self.span.record("delay_ms", delay.as_millis() as u64);
        self.span.record("duration_ms", duration.as_millis() as u64);
    }

    /// Record a failed attempt that ends the execution.
    pub fn record_failure(&self, error: &str, duration: Duration) {
        self.span.record("outcome", "failed");
        self.span.record("error.message", error);
        self.span.record("duration_ms", duration.as_millis() as u64);
    }

    /// Record an attempt refused by the circuit breaker.
    pub fn record_rejected(&self) {
        self.span.record("outcome", "rejected");
        self.span.record("duration_ms", 0u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_subscriber::fmt::format::FmtSpan;

    #[test]
    fn test_attempt_span_new() {
        let span = AttemptSpan::new("completion-api", 2, 3);
        assert_eq!(span.operation(), "completion-api");
        assert_eq!(span.attempt(), 2);
    }

    #[test]
    fn test_attempt_span_records() {
        let span = AttemptSpan::new("completion-api", 0, 3);
        span.record_success(Duration::from_millis(42));

        let span = AttemptSpan::new("completion-api", 0, 3);
        span.record_retry(
            "429: Too Many Requests",
            Duration::from_millis(1500),
            Duration::from_millis(12),
        );

        let span = AttemptSpan::new("completion-api", 3, 3);
        span.record_failure("429: Too Many Requests", Duration::from_millis(12));

        let span = AttemptSpan::new("completion-api", 0, 3);
        span.record_rejected();
        // Span should not panic
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_duration_is_the_measured_attempt_time() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = AttemptSpan::new("document-store", 0, 4);
            std::thread::sleep(Duration::from_millis(20));
            span.record_retry("busy", Duration::from_millis(100), Duration::from_millis(7));
            drop(span);

            let span = AttemptSpan::new("document-store", 1, 4);
            std::thread::sleep(Duration::from_millis(20));
            span.record_failure("busy", Duration::from_millis(8));
        });

        let output = String::from_utf8_lossy(&captured.0.lock()).into_owned();
        assert!(output.contains("duration_ms=7"), "{output}");
        assert!(output.contains("duration_ms=8"), "{output}");
    }

    #[test]
    fn test_attempt_span_elapsed() {
        let span = AttemptSpan::new("document-store", 0, 4);
        std::thread::sleep(Duration::from_millis(10));
        assert!(span.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_attempt_span_instrument() {
        let span = AttemptSpan::new("document-store", 0, 4);
        let value = AttemptSpan::instrument(&span, async { 7 }).await;
        assert_eq!(value, 7);
    }

    #[test]
    fn test_attempt_span_under_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = AttemptSpan::new("payments-api", 1, 3);
            let _guard = span.span().enter();
            span.record_failure("402: Payment Required", Duration::from_millis(90));
        });
    }
}
