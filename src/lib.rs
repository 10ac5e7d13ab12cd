// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policies, per-operation circuit breakers and retry metrics for calls
//! to flaky external services.
//!
//! ```no_run
//! use resilience_rs::{execute_with_retry, Failure, RetryConfig};
//!
//! # async fn example() -> resilience_rs::Result<()> {
//! let reply = execute_with_retry("completion-api", &RetryConfig::completion_api(), || async {
//!     Ok::<_, Failure>("hello".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod runtime;
pub mod testkit;

pub use config::{CircuitBreakerConfig, Preset, ResilienceConfig, RetryConfig, RetryStrategy};
pub use error::{CircuitOpenError, Failure, FailureKind, ResilienceError, Result, RetryExhaustedError};
pub use runtime::{
    execute_with_retry, execute_with_retry_and_sink, CircuitState, RetryContext, RetryExecutor,
};
