// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for testing code built on the resilience layer.
//!
//! - [`MockClock`]: a manually advanced clock for circuit breakers
//! - [`ScriptedOperation`]: an operation that plays back a fixed sequence of
//!   outcomes and counts its calls

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::Failure;
use crate::runtime::Clock;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct MockClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl MockClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Time advanced since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

#[derive(Debug, Clone)]
enum Step<T> {
    Succeed(T),
    Fail(Failure),
    Hang,
}

/// An operation returning scripted outcomes, one per call.
///
/// The last step repeats once the script runs out. Clones share the script
/// and the call counter.
///
/// ```
/// use resilience_rs::testkit::ScriptedOperation;
///
/// # tokio_test::block_on(async {
/// let op = ScriptedOperation::new().fail("busy").succeed(7);
/// assert!(op.call().await.is_err());
/// assert_eq!(op.call().await.unwrap(), 7);
/// assert_eq!(op.call().await.unwrap(), 7);
/// assert_eq!(op.calls(), 3);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedOperation<T> {
    steps: Arc<Mutex<VecDeque<Step<T>>>>,
    calls: Arc<AtomicU32>,
}

impl<T> ScriptedOperation<T>
where
    T: Clone + Send + 'static,
{
    /// An empty script. Calling it before adding steps fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    fn push(self, step: Step<T>) -> Self {
        self.steps.lock().push_back(step);
        self
    }

    /// Resolve with `value`.
    #[must_use]
    pub fn succeed(self, value: T) -> Self {
        self.push(Step::Succeed(value))
    }

    /// Fail with `failure`.
    #[must_use]
    pub fn fail(self, failure: impl Into<Failure>) -> Self {
        self.push(Step::Fail(failure.into()))
    }

    /// Fail `times` times in a row with `failure`.
    #[must_use]
    pub fn fail_times(mut self, times: usize, failure: impl Into<Failure>) -> Self {
        let failure = failure.into();
        for _ in 0..times {
            self = self.push(Step::Fail(failure.clone()));
        }
        self
    }

    /// Never resolve.
    #[must_use]
    pub fn hang(self) -> Self {
        self.push(Step::Hang)
    }

    /// Number of calls so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Option<Step<T>> {
        let mut steps = self.steps.lock();
        if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        }
    }

    /// Run the next step.
    pub fn call(&self) -> impl Future<Output = Result<T, Failure>> + Send + 'static {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();

        async move {
            match step {
                Some(Step::Succeed(value)) => Ok(value),
                Some(Step::Fail(failure)) => Err(failure),
                Some(Step::Hang) => std::future::pending().await,
                None => Err(Failure::other("script is empty")),
            }
        }
    }
}

impl<T> Default for ScriptedOperation<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
