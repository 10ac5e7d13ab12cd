// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for retry policies and circuit breakers
//!
//! Configurations are immutable values built once at startup, either from the
//! named presets, with the `with_*` builders, or from a YAML file.
//!
//! # Environment Variables
//!
//! - `RESILIENCE_CONFIG` - Path to the config file (default:
//!   `<config dir>/resilience/config.yaml`)
//!
//! # Example
//!
//! ```no_run
//! use resilience_rs::config::{Preset, ResilienceConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = ResilienceConfig::load_with_env()?;
//! let config = file
//!     .config_for("completion-api")
//!     .unwrap_or_else(|| Preset::CompletionApi.config());
//! println!("{}", config.policy);
//! # Ok(())
//! # }
//! ```

mod presets;
mod resilienceconfig;
mod retry;

pub use presets::Preset;
pub use resilienceconfig::{OperationConfig, ResilienceConfig, ENV_RESILIENCE_CONFIG};
pub use retry::{
    CircuitBreakerConfig, ErrorPattern, RetryConfig, RetryPolicyConfig, RetryStrategy,
};
