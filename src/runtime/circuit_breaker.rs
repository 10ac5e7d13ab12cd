// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker pattern implementation for resilient calls.
//!
//! The circuit breaker prevents cascading failures by temporarily stopping
//! calls to a failing dependency and allowing it to recover.
//!
//! # States
//!
//! - **Closed**: Normal operation, calls pass through
//! - **Open**: Calls are rejected without being attempted
//! - **Half-Open**: Probing whether the dependency has recovered
//!
//! The open to half-open transition is time based but never happens behind
//! the caller's back: [`CircuitBreaker::tick`] (or [`CircuitBreaker::check_state`],
//! which calls it) performs the check, and [`CircuitBreaker::state`] only reads
//! the last computed state.
//!
//! # Example
//!
//! ```
//! use resilience_rs::config::CircuitBreakerConfig;
//! use resilience_rs::runtime::{CircuitBreakerRegistry, CircuitState};
//! use std::time::Duration;
//!
//! let registry = CircuitBreakerRegistry::new();
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(2)
//!     .with_reset_timeout(Duration::from_secs(30));
//!
//! let breaker = registry.get_or_create("document-store", &config);
//! breaker.record_failure();
//! breaker.record_failure();
//!
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(breaker.check_state().is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;
use crate::error::CircuitOpenError;

/// Source of monotonic time for breakers.
pub trait Clock: Send + Sync + fmt::Debug + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally.
    Closed,
    /// Circuit is open, calls fail immediately.
    Open,
    /// Circuit is half-open, testing if the dependency has recovered.
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time counters of a breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Consecutive failures.
    pub failure_count: u32,
    /// Consecutive successes while half-open.
    pub success_count: u32,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
    total_requests: u64,
    total_failures: u64,
    total_rejections: u64,
}

/// Circuit breaker for one named operation.
///
/// All counters sit behind a single lock, so a transition and the counter
/// updates that trigger it are observed together by concurrent callers.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker using the system clock.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a new circuit breaker reading time from `clock`.
    #[must_use]
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
                last_success: None,
                total_requests: 0,
                total_failures: 0,
                total_rejections: 0,
            }),
        }
    }

    /// The operation name this breaker protects.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the circuit breaker configuration.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// The last computed state. Does not check the reset timeout.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Apply the time-based open to half-open transition and return the
    /// resulting state.
    pub fn tick(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        self.tick_locked(&mut inner, now);
        inner.state
    }

    fn tick_locked(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .last_failure
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(Duration::MAX);
        if elapsed >= self.config.reset_timeout {
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            info!(
                target: "resilience::circuit_breaker",
                operation = %self.name,
                "circuit breaker transitioning to HALF-OPEN"
            );
        }
    }

    fn remaining(&self, inner: &BreakerInner, now: Instant) -> Duration {
        let elapsed = inner
            .last_failure
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(Duration::MAX);
        self.config.reset_timeout.saturating_sub(elapsed)
    }

    /// Check whether a call may proceed.
    ///
    /// # Errors
    ///
    /// Returns `CircuitOpenError` if the circuit is (still) open after the
    /// time check. The rejection is counted.
    pub fn check_state(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        self.tick_locked(&mut inner, now);

        if inner.state == CircuitState::Open {
            inner.total_rejections += 1;
            return Err(CircuitOpenError {
                operation: self.name.clone(),
                failure_count: inner.failure_count,
                retry_in: self.remaining(&inner, now),
            });
        }
        Ok(())
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.last_success = Some(self.clock.now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    info!(
                        target: "resilience::circuit_breaker",
                        operation = %self.name,
                        "circuit breaker transitioning to CLOSED"
                    );
                }
            }
            CircuitState::Open => {
                // Calls are rejected before running while open.
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.total_failures += 1;
        inner.last_failure = Some(self.clock.now());

        if inner.state == CircuitState::HalfOpen {
            // One strike while probing.
            inner.state = CircuitState::Open;
            inner.failure_count = self.config.failure_threshold;
            warn!(
                target: "resilience::circuit_breaker",
                operation = %self.name,
                "circuit breaker transitioning back to OPEN (half-open trial call failed)"
            );
            return;
        }

        inner.failure_count += 1;
        if inner.state == CircuitState::Closed
            && inner.failure_count >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            warn!(
                target: "resilience::circuit_breaker",
                operation = %self.name,
                failures = inner.failure_count,
                "circuit breaker transitioning to OPEN"
            );
        }
    }

    /// Manually reset the circuit breaker to closed state.
    ///
    /// Lifetime totals are kept.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
        inner.last_success = None;
        info!(
            target: "resilience::circuit_breaker",
            operation = %self.name,
            "circuit breaker manually reset to CLOSED"
        );
    }

    /// Get the time until the circuit allows a trial call (if open).
    #[must_use]
    pub fn time_until_retry(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return None;
        }
        Some(self.remaining(&inner, self.clock.now()))
    }

    /// Get the current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Get the current half-open success count.
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.inner.lock().success_count
    }

    /// Snapshot of all counters.
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure: inner.last_failure,
            last_success: inner.last_success,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
        }
    }

    /// Get failure rate (0.0 to 1.0).
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.total_requests == 0 {
            return 0.0;
        }
        inner.total_failures as f64 / inner.total_requests as f64
    }

    /// One-line status, after applying the time check.
    ///
    /// `"<name>: <STATE> (failures: <n>/<threshold>, rate: <x.x>%)"`
    #[must_use]
    pub fn status(&self) -> String {
        let state = self.tick();
        let stats = self.stats();
        let rate = if stats.total_requests > 0 {
            stats.total_failures as f64 / stats.total_requests as f64 * 100.0
        } else {
            0.0
        };
        format!(
            "{}: {} (failures: {}/{}, rate: {:.1}%)",
            self.name,
            state.as_str().to_uppercase(),
            stats.failure_count,
            self.config.failure_threshold,
            rate
        )
    }
}

/// Breakers keyed by operation name.
///
/// At most one breaker exists per name; the configuration passed on first use
/// wins.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<BTreeMap<String, Arc<CircuitBreaker>>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry whose breakers read time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Return the breaker for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::with_clock(
                name,
                config.clone(),
                Arc::clone(&self.clock),
            ))
        }))
    }

    /// Look up an existing breaker.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// Registered operation names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.breakers.read().keys().cloned().collect()
    }

    /// All registered breakers, sorted by name.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Reset every breaker to closed.
    pub fn reset_all(&self) {
        for breaker in self.all() {
            breaker.reset();
        }
        info!(target: "resilience::circuit_breaker", "all circuit breakers reset");
    }

    /// One status line per breaker, sorted by name.
    #[must_use]
    pub fn all_status(&self) -> Vec<String> {
        self.all().iter().map(|b| b.status()).collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
