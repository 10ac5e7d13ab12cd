// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the resilience layer.
//!
//! Two kinds of failure ever leave [`RetryExecutor::execute`](crate::runtime::RetryExecutor::execute):
//! [`RetryExhaustedError`] and [`CircuitOpenError`]. Operation errors are adapted
//! into a [`Failure`] before the policy engine sees them, so classification never
//! depends on the shape of a foreign error type.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error(transparent)]
    RetryExhausted(#[from] RetryExhaustedError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResilienceError {
    /// Returns `true` if the breaker rejected the call without running it.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }

    /// Returns `true` if the call ran out of retries or hit a non-retryable error.
    #[must_use]
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetryExhausted(_))
    }

    /// The last failure observed before giving up, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&Failure> {
        match self {
            ResilienceError::RetryExhausted(e) => Some(&e.cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResilienceError>;

/// Raised when no further attempts are permitted.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed after {attempts} attempt(s): {cause}")]
pub struct RetryExhaustedError {
    /// Name of the protected operation.
    pub operation: String,
    /// Number of attempts actually made.
    pub attempts: u32,
    /// Configured maximum number of retries.
    pub max_retries: u32,
    /// The last failure observed.
    #[source]
    pub cause: Failure,
}

/// Raised instead of attempting the operation while its breaker is open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circuit breaker open for {operation}. Reset in {}ms", .retry_in.as_millis())]
pub struct CircuitOpenError {
    /// Name of the protected operation.
    pub operation: String,
    /// Consecutive failures recorded by the breaker.
    pub failure_count: u32,
    /// Time left until the breaker allows a half-open trial call.
    pub retry_in: Duration,
}

/// Classification of an operation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt did not settle in time.
    Timeout,
    /// The dependency answered with an HTTP error status.
    Http(StatusCode),
    /// A nested executor rejected the call because its breaker is open.
    CircuitOpen(CircuitOpenError),
    /// Anything else.
    Other,
}

/// A failure reported by a protected operation.
///
/// Callers convert their own error types into this tagged union (through the
/// provided `From` impls or the constructors) before handing them to the
/// executor. The original error can be kept as the [`source`](std::error::Error::source).
#[derive(Clone)]
pub struct Failure {
    kind: FailureKind,
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Failure {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// A timed-out attempt.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// An HTTP error response. An empty message falls back to the status reason.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Http(status), message)
    }

    /// An unclassified failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    /// Attach the original error.
    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    /// The raw message, without status prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self.kind {
            FailureKind::Http(status) => Some(status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }

    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self.kind, FailureKind::CircuitOpen(_))
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::runtime::error_message(self))
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::other(message)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::other(message)
    }
}

impl From<StatusCode> for Failure {
    fn from(status: StatusCode) -> Self {
        Failure::http(status, status.canonical_reason().unwrap_or_default())
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut => FailureKind::Timeout,
            _ => FailureKind::Other,
        };
        Failure::new(kind, err.to_string()).with_source(err)
    }
}

impl From<tokio::time::error::Elapsed> for Failure {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Failure::timeout(err.to_string()).with_source(err)
    }
}

impl From<CircuitOpenError> for Failure {
    fn from(err: CircuitOpenError) -> Self {
        let message = err.to_string();
        Failure::new(FailureKind::CircuitOpen(err), message)
    }
}

// Lets one executor wrap another: an inner circuit-open passes through as-is,
// an inner exhaustion is reclassified by its last cause.
impl From<ResilienceError> for Failure {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::CircuitOpen(open) => open.into(),
            ResilienceError::RetryExhausted(exhausted) => exhausted.cause,
            ResilienceError::Config(message) => Failure::other(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_failure_from_str() {
        let failure = Failure::from("connection reset");
        assert_eq!(failure.kind(), &FailureKind::Other);
        assert_eq!(failure.message(), "connection reset");
        assert!(failure.source().is_none());
    }

    #[test]
    fn test_failure_from_status_code() {
        let failure = Failure::from(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(failure.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(failure.to_string(), "503: Service Unavailable");
    }

    #[test]
    fn test_failure_from_io_timeout() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let failure = Failure::from(err);
        assert!(failure.is_timeout());
        assert!(failure.source().is_some());
    }

    #[test]
    fn test_circuit_open_message() {
        let err = CircuitOpenError {
            operation: "payments-api".to_string(),
            failure_count: 5,
            retry_in: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "Circuit breaker open for payments-api. Reset in 1500ms"
        );

        let failure = Failure::from(ResilienceError::CircuitOpen(err.clone()));
        assert_eq!(failure.kind(), &FailureKind::CircuitOpen(err));
    }

    #[test]
    fn test_retry_exhausted_message_and_source() {
        let err = ResilienceError::from(RetryExhaustedError {
            operation: "completion-api".to_string(),
            attempts: 4,
            max_retries: 3,
            cause: Failure::other("Service unavailable"),
        });

        assert!(err.is_retry_exhausted());
        assert!(!err.is_circuit_open());
        assert_eq!(
            err.to_string(),
            "completion-api failed after 4 attempt(s): Service unavailable"
        );
        assert_eq!(err.cause().map(Failure::message), Some("Service unavailable"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_display() {
        let err = ResilienceError::Config("max_delay must be >= base_delay".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: max_delay must be >= base_delay"
        );
        assert!(err.cause().is_none());
    }
}
