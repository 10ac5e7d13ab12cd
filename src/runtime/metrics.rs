// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-attempt retry metrics, aggregation and alerting.
//!
//! Every attempt made by a [`RetryExecutor`](super::RetryExecutor) produces one
//! [`RetryMetrics`] record, which is handed to each registered [`MetricsSink`]:
//!
//! - [`MetricsCollector`] keeps a bounded history per operation and derives
//!   alerts and aggregates from it
//! - [`AttemptEvents`] broadcasts records to any number of async subscribers
//! - any `Fn(&RetryMetrics) + Send + Sync` closure
//!
//! # Example
//!
//! ```rust
//! use resilience_rs::runtime::{CircuitState, MetricsCollector, RetryMetrics};
//! use std::time::Duration;
//!
//! let collector = MetricsCollector::new();
//! collector.record_metric(RetryMetrics::new("completion-api", 0, 3, true, CircuitState::Closed));
//!
//! let agg = collector.aggregated_metrics("completion-api").unwrap();
//! assert_eq!(agg.success_rate, 100.0);
//! println!("{}", collector.status_report());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

use super::circuit_breaker::{CircuitBreakerRegistry, CircuitState};

/// Records kept per operation.
pub const MAX_STORED_METRICS: usize = 1000;
/// Alerts kept per operation.
pub const MAX_STORED_ALERTS: usize = 100;

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryMetrics {
    pub operation_name: String,
    pub timestamp: DateTime<Utc>,
    /// Attempt index, 0-based.
    pub attempt: u32,
    /// Configured maximum number of retries.
    pub max_retries: u32,
    pub success: bool,
    /// Normalized failure message.
    pub error: Option<String>,
    /// Delay scheduled after this attempt.
    pub delay: Duration,
    /// Time spent running the operation.
    pub duration: Duration,
    /// Breaker state observed when the record was made.
    pub circuit_state: CircuitState,
}

impl RetryMetrics {
    /// A record stamped with the current time and no error, delay or duration.
    #[must_use]
    pub fn new(
        operation_name: impl Into<String>,
        attempt: u32,
        max_retries: u32,
        success: bool,
        circuit_state: CircuitState,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            timestamp: Utc::now(),
            attempt,
            max_retries,
            success,
            error: None,
            delay: Duration::ZERO,
            duration: Duration::ZERO,
            circuit_state,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary over the stored history of one operation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedMetrics {
    pub operation_name: String,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    /// Mean attempt index over failed records.
    pub average_retries_per_failure: f64,
    pub circuit_state: CircuitState,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

/// Receiver of attempt records.
pub trait MetricsSink: Send + Sync {
    /// Called once per attempt. Must not block.
    fn record(&self, metric: &RetryMetrics);
}

impl<F> MetricsSink for F
where
    F: Fn(&RetryMetrics) + Send + Sync,
{
    fn record(&self, metric: &RetryMetrics) {
        self(metric)
    }
}

/// Thread-safe store of attempt records and alerts.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    registry: Option<Arc<CircuitBreakerRegistry>>,
    metrics: RwLock<BTreeMap<String, VecDeque<RetryMetrics>>>,
    alerts: RwLock<BTreeMap<String, VecDeque<(u64, String)>>>,
    alert_seq: AtomicU64,
}

impl MetricsCollector {
    /// Create a collector without a breaker registry. Aggregates then report
    /// every breaker as closed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector that reads live breaker state from `registry`.
    #[must_use]
    pub fn with_registry(registry: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            registry: Some(registry),
            ..Self::default()
        }
    }

    /// Append a record and raise any alerts it triggers.
    pub fn record_metric(&self, metric: RetryMetrics) {
        self.check_alerts(&metric);

        let mut metrics = self.metrics.write();
        let history = metrics.entry(metric.operation_name.clone()).or_default();
        history.push_back(metric);
        if history.len() > MAX_STORED_METRICS {
            history.pop_front();
        }
    }

    fn check_alerts(&self, metric: &RetryMetrics) {
        let mut raised = Vec::new();

        if metric.circuit_state == CircuitState::Open {
            raised.push(format!(
                "Circuit breaker OPEN for {} at {}",
                metric.operation_name,
                metric.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
        }
        if metric.attempt >= metric.max_retries {
            raised.push(format!(
                "Exhausted all retries for {} after {} attempts",
                metric.operation_name,
                metric.attempt + 1
            ));
        }

        let mut alerts = self.alerts.write();
        let stored = alerts.entry(metric.operation_name.clone()).or_default();
        for alert in raised {
            let seq = self.alert_seq.fetch_add(1, Ordering::Relaxed);
            stored.push_back((seq, alert));
            if stored.len() > MAX_STORED_ALERTS {
                stored.pop_front();
            }
        }
    }

    /// Aggregate the stored history of `operation_name`.
    ///
    /// Returns `None` if nothing was recorded for it.
    #[must_use]
    pub fn aggregated_metrics(&self, operation_name: &str) -> Option<AggregatedMetrics> {
        let metrics = self.metrics.read();
        let history = metrics.get(operation_name).filter(|h| !h.is_empty())?;

        let total = history.len() as u64;
        let successful = history.iter().filter(|m| m.success).count() as u64;
        let failed = total - successful;

        let average_retries_per_failure = if failed > 0 {
            let sum: u64 = history
                .iter()
                .filter(|m| !m.success)
                .map(|m| u64::from(m.attempt))
                .sum();
            sum as f64 / failed as f64
        } else {
            0.0
        };

        let last_failure = history.iter().rev().find(|m| m.error.is_some());

        Some(AggregatedMetrics {
            operation_name: operation_name.to_string(),
            total_attempts: total,
            successful_attempts: successful,
            failed_attempts: failed,
            success_rate: successful as f64 / total as f64 * 100.0,
            average_retries_per_failure,
            circuit_state: self.live_state(operation_name),
            last_error: last_failure.and_then(|m| m.error.clone()),
            last_error_time: last_failure.map(|m| m.timestamp),
        })
    }

    fn live_state(&self, operation_name: &str) -> CircuitState {
        self.registry
            .as_ref()
            .and_then(|r| r.get(operation_name))
            .map(|b| b.tick())
            .unwrap_or(CircuitState::Closed)
    }

    /// Aggregates for every recorded operation, sorted by name.
    #[must_use]
    pub fn all_aggregated_metrics(&self) -> Vec<AggregatedMetrics> {
        let names: Vec<String> = self.metrics.read().keys().cloned().collect();
        names
            .iter()
            .filter_map(|name| self.aggregated_metrics(name))
            .collect()
    }

    /// The last `limit` records of an operation, oldest first.
    #[must_use]
    pub fn recent_metrics(&self, operation_name: &str, limit: usize) -> Vec<RetryMetrics> {
        self.metrics
            .read()
            .get(operation_name)
            .map(|history| {
                let skip = history.len().saturating_sub(limit);
                history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Alerts for one operation, or for all operations when `None`.
    ///
    /// Oldest first. Alerts of different operations keep the order they
    /// were raised in.
    #[must_use]
    pub fn alerts(&self, operation_name: Option<&str>) -> Vec<String> {
        let alerts = self.alerts.read();
        match operation_name {
            Some(name) => alerts
                .get(name)
                .map(|a| a.iter().map(|(_, alert)| alert.clone()).collect())
                .unwrap_or_default(),
            None => {
                let mut merged: Vec<&(u64, String)> = alerts.values().flatten().collect();
                merged.sort_unstable_by_key(|(seq, _)| *seq);
                merged.into_iter().map(|(_, alert)| alert.clone()).collect()
            }
        }
    }

    /// Drop alerts for one operation, or all alerts when `None`.
    pub fn clear_alerts(&self, operation_name: Option<&str>) {
        let mut alerts = self.alerts.write();
        match operation_name {
            Some(name) => {
                alerts.remove(name);
            }
            None => alerts.clear(),
        }
    }

    /// Drop all records and alerts.
    pub fn reset(&self) {
        self.metrics.write().clear();
        self.alerts.write().clear();
    }

    /// Multi-line human-readable report.
    #[must_use]
    pub fn status_report(&self) -> String {
        let all = self.all_aggregated_metrics();

        let mut report = String::from("Retry Metrics Report\n");
        report.push_str(&"=".repeat(50));
        report.push_str("\n\n");

        if all.is_empty() {
            report.push_str("No metrics recorded yet.\n");
            return report;
        }

        for agg in &all {
            report.push_str(&format!("{}\n", agg.operation_name));
            report.push_str(&format!(
                "   Success Rate: {:.1}% ({}/{})\n",
                agg.success_rate, agg.successful_attempts, agg.total_attempts
            ));
            report.push_str(&format!(
                "   Avg Retries/Failure: {:.2}\n",
                agg.average_retries_per_failure
            ));
            report.push_str(&format!(
                "   Circuit Breaker: {}\n",
                agg.circuit_state.as_str().to_uppercase()
            ));
            if let Some(error) = &agg.last_error {
                report.push_str(&format!("   Last Error: {error}\n"));
                if let Some(at) = agg.last_error_time {
                    report.push_str(&format!(
                        "   At: {}\n",
                        at.to_rfc3339_opts(SecondsFormat::Millis, true)
                    ));
                }
            }
            report.push('\n');
        }

        let alerts = self.alerts(None);
        if !alerts.is_empty() {
            report.push_str("Alerts\n");
            report.push_str(&"-".repeat(50));
            report.push('\n');
            let skip = alerts.len().saturating_sub(10);
            for alert in alerts.iter().skip(skip) {
                report.push_str(alert);
                report.push('\n');
            }
        }

        report
    }

    /// Emit [`status_report`](Self::status_report) at info level.
    pub fn log_status_report(&self) {
        info!(target: "resilience::metrics", "\n{}", self.status_report());
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, metric: &RetryMetrics) {
        self.record_metric(metric.clone());
    }
}

/// Broadcast channel of attempt records.
///
/// Slow subscribers lag and skip records rather than slowing the executor.
#[derive(Debug, Clone)]
pub struct AttemptEvents {
    sender: broadcast::Sender<RetryMetrics>,
}

impl AttemptEvents {
    /// Default number of buffered records per subscriber.
    pub const DEFAULT_CAPACITY: usize = 256;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// A new receiver seeing every record sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RetryMetrics> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AttemptEvents {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl MetricsSink for AttemptEvents {
    fn record(&self, metric: &RetryMetrics) {
        // No subscribers is fine.
        let _ = self.sender.send(metric.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn success(name: &str, attempt: u32) -> RetryMetrics {
        RetryMetrics::new(name, attempt, 3, true, CircuitState::Closed)
    }

    fn failure(name: &str, attempt: u32, error: &str) -> RetryMetrics {
        RetryMetrics::new(name, attempt, 3, false, CircuitState::Closed).with_error(error)
    }

    #[test]
    fn test_aggregated_none_when_empty() {
        let collector = MetricsCollector::new();
        assert!(collector.aggregated_metrics("nothing").is_none());
        assert!(collector.all_aggregated_metrics().is_empty());
    }

    #[test]
    fn test_success_rate_and_last_error() {
        let collector = MetricsCollector::new();
        collector.record_metric(success("op", 0));
        collector.record_metric(failure("op", 0, "connection reset"));

        let agg = collector.aggregated_metrics("op").unwrap();
        assert_eq!(agg.total_attempts, 2);
        assert_eq!(agg.successful_attempts, 1);
        assert_eq!(agg.failed_attempts, 1);
        assert_eq!(agg.success_rate, 50.0);
        assert_eq!(agg.last_error.as_deref(), Some("connection reset"));
        assert!(agg.last_error_time.is_some());
        assert_eq!(agg.circuit_state, CircuitState::Closed);
    }

    #[test]
    fn test_average_retries_per_failure() {
        let collector = MetricsCollector::new();
        collector.record_metric(failure("op", 0, "Error"));
        collector.record_metric(failure("op", 2, "Error"));
        collector.record_metric(success("op", 3));

        let agg = collector.aggregated_metrics("op").unwrap();
        assert!((agg.average_retries_per_failure - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_last_error_is_most_recent() {
        let collector = MetricsCollector::new();
        collector.record_metric(failure("op", 0, "first"));
        collector.record_metric(failure("op", 1, "Last error message"));
        collector.record_metric(success("op", 2));

        let agg = collector.aggregated_metrics("op").unwrap();
        assert_eq!(agg.last_error.as_deref(), Some("Last error message"));
    }

    #[test]
    fn test_history_is_capped() {
        let collector = MetricsCollector::new();
        for i in 0..(MAX_STORED_METRICS + 10) {
            collector.record_metric(success("op", (i % 3) as u32));
        }

        let agg = collector.aggregated_metrics("op").unwrap();
        assert_eq!(agg.total_attempts, MAX_STORED_METRICS as u64);
    }

    #[test]
    fn test_recent_metrics() {
        let collector = MetricsCollector::new();
        for attempt in 0..5 {
            collector.record_metric(failure("op", attempt, "boom"));
        }

        let recent = collector.recent_metrics("op", 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].attempt, 3);
        assert_eq!(recent[1].attempt, 4);
        assert!(collector.recent_metrics("missing", 10).is_empty());
        assert_eq!(collector.recent_metrics("op", 50).len(), 5);
    }

    #[test]
    fn test_alerts_on_open_circuit_and_exhaustion() {
        let collector = MetricsCollector::new();
        collector.record_metric(
            RetryMetrics::new("op", 0, 3, false, CircuitState::Open).with_error("open"),
        );
        collector.record_metric(failure("op", 3, "gave up"));
        collector.record_metric(success("quiet", 0));

        let alerts = collector.alerts(Some("op"));
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].starts_with("Circuit breaker OPEN for op at "));
        assert_eq!(alerts[1], "Exhausted all retries for op after 4 attempts");
        assert!(collector.alerts(Some("quiet")).is_empty());
        assert_eq!(collector.alerts(None).len(), 2);
    }

    #[test]
    fn test_report_shows_newest_alerts_across_operations() {
        let collector = MetricsCollector::new();
        for _ in 0..12 {
            collector.record_metric(failure("zeta", 3, "gave up"));
        }
        collector.record_metric(failure("alpha", 9, "gave up"));

        let alerts = collector.alerts(None);
        assert_eq!(alerts.len(), 13);
        assert_eq!(
            alerts.last().map(String::as_str),
            Some("Exhausted all retries for alpha after 10 attempts")
        );

        let report = collector.status_report();
        assert!(report.contains("Exhausted all retries for alpha after 10 attempts"));
        let listed = report
            .lines()
            .filter(|l| l.starts_with("Exhausted all retries"))
            .count();
        assert_eq!(listed, 10);
    }

    #[test]
    fn test_alerts_are_capped() {
        let collector = MetricsCollector::new();
        for _ in 0..(MAX_STORED_ALERTS + 5) {
            collector.record_metric(failure("op", 3, "gave up"));
        }
        assert_eq!(collector.alerts(Some("op")).len(), MAX_STORED_ALERTS);
    }

    #[test]
    fn test_clear_alerts_and_reset() {
        let collector = MetricsCollector::new();
        collector.record_metric(failure("a", 3, "x"));
        collector.record_metric(failure("b", 3, "y"));

        collector.clear_alerts(Some("a"));
        assert!(collector.alerts(Some("a")).is_empty());
        assert_eq!(collector.alerts(None).len(), 1);

        collector.clear_alerts(None);
        assert!(collector.alerts(None).is_empty());

        collector.reset();
        assert!(collector.aggregated_metrics("a").is_none());
    }

    #[test]
    fn test_live_state_from_registry() {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let collector = MetricsCollector::with_registry(Arc::clone(&registry));

        registry
            .get_or_create("op", &CircuitBreakerConfig::new().with_failure_threshold(1))
            .record_failure();
        collector.record_metric(failure("op", 0, "boom"));

        let agg = collector.aggregated_metrics("op").unwrap();
        assert_eq!(agg.circuit_state, CircuitState::Open);
    }

    #[test]
    fn test_status_report() {
        let collector = MetricsCollector::new();
        assert!(collector.status_report().contains("No metrics recorded yet."));

        collector.record_metric(success("completion-api", 0));
        collector.record_metric(failure("completion-api", 3, "503: Service Unavailable"));

        let report = collector.status_report();
        assert!(report.starts_with("Retry Metrics Report\n"));
        assert!(report.contains("completion-api\n"));
        assert!(report.contains("   Success Rate: 50.0% (1/2)\n"));
        assert!(report.contains("   Avg Retries/Failure: 3.00\n"));
        assert!(report.contains("   Circuit Breaker: CLOSED\n"));
        assert!(report.contains("   Last Error: 503: Service Unavailable\n"));
        assert!(report.contains("Exhausted all retries for completion-api after 4 attempts"));
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let sink = move |_: &RetryMetrics| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        sink.record(&success("op", 0));
        sink.record(&success("op", 1));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_events_broadcast() {
        let events = AttemptEvents::new(8);
        // Sending without subscribers is not an error.
        events.record(&success("op", 0));

        let mut first = events.subscribe();
        let mut second = events.subscribe();
        assert_eq!(events.subscriber_count(), 2);

        events.record(&failure("op", 1, "boom"));

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.attempt, 1);
        assert_eq!(b.error.as_deref(), Some("boom"));
    }
}
