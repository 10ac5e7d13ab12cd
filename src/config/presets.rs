// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named configurations for the external dependencies the layer protects.
//!
//! All presets use exponential backoff with jitter. Text patterns are
//! case-insensitive; the bare status-code patterns (`4\d{2}`, `5\d{2}`) match
//! anywhere in the normalized message.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::retry::{
    CircuitBreakerConfig, ErrorPattern, RetryConfig, RetryPolicyConfig, RetryStrategy,
};
use crate::error::ResilienceError;

/// A dependency with a predefined retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// LLM completion API.
    CompletionApi,
    /// Text-to-speech API.
    SpeechSynthesisApi,
    /// Document database.
    DocumentStore,
    /// Payments API.
    PaymentsApi,
}

impl Preset {
    /// Every preset.
    pub const ALL: [Preset; 4] = [
        Preset::CompletionApi,
        Preset::SpeechSynthesisApi,
        Preset::DocumentStore,
        Preset::PaymentsApi,
    ];

    /// The operation name calls through this preset are registered under.
    #[must_use]
    pub fn operation_name(self) -> &'static str {
        match self {
            Preset::CompletionApi => "completion-api",
            Preset::SpeechSynthesisApi => "speech-synthesis-api",
            Preset::DocumentStore => "document-store",
            Preset::PaymentsApi => "payments-api",
        }
    }

    /// Look up a preset by its operation name.
    #[must_use]
    pub fn from_operation_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.operation_name() == name)
    }

    /// The preset configuration.
    #[must_use]
    pub fn config(self) -> RetryConfig {
        match self {
            Preset::CompletionApi => COMPLETION_API.clone(),
            Preset::SpeechSynthesisApi => SPEECH_SYNTHESIS_API.clone(),
            Preset::DocumentStore => DOCUMENT_STORE.clone(),
            Preset::PaymentsApi => PAYMENTS_API.clone(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation_name())
    }
}

impl FromStr for Preset {
    type Err = ResilienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_operation_name(s)
            .ok_or_else(|| ResilienceError::Config(format!("unknown preset: {s}")))
    }
}

impl RetryConfig {
    /// Preset for the LLM completion API.
    #[must_use]
    pub fn completion_api() -> Self {
        Preset::CompletionApi.config()
    }

    /// Preset for the text-to-speech API.
    #[must_use]
    pub fn speech_synthesis_api() -> Self {
        Preset::SpeechSynthesisApi.config()
    }

    /// Preset for the document database.
    #[must_use]
    pub fn document_store() -> Self {
        Preset::DocumentStore.config()
    }

    /// Preset for the payments API.
    #[must_use]
    pub fn payments_api() -> Self {
        Preset::PaymentsApi.config()
    }
}

fn patterns(sources: &[&str]) -> Vec<ErrorPattern> {
    sources
        .iter()
        .map(|source| {
            ErrorPattern::regex(source).expect("preset patterns should compile - this is a bug")
        })
        .collect()
}

fn preset(
    base_ms: u64,
    max_ms: u64,
    max_retries: u32,
    timeout_ms: u64,
    no_retry: &[&str],
    always_retry: &[&str],
    breaker: (u32, u64, u32),
) -> RetryConfig {
    let (failure_threshold, reset_ms, success_threshold) = breaker;
    RetryConfig {
        policy: RetryPolicyConfig {
            strategy: RetryStrategy::ExponentialBackoff,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            max_retries,
            jitter: true,
            no_retry_patterns: patterns(no_retry),
            always_retry_patterns: patterns(always_retry),
            timeout: Duration::from_millis(timeout_ms),
        },
        breaker: CircuitBreakerConfig {
            failure_threshold,
            reset_timeout: Duration::from_millis(reset_ms),
            success_threshold,
        },
    }
}

const HTTP_ALWAYS_RETRY: &[&str] = &[
    r"(?i)rate.*limit",
    r"(?i)timeout",
    r"(?i)temporarily unavailable",
    r"(?i)service.*unavailable",
    r"5\d{2}",
];

static COMPLETION_API: Lazy<RetryConfig> = Lazy::new(|| {
    preset(
        2000,
        30000,
        3,
        60000,
        &[
            r"(?i)invalid.*request",
            r"(?i)authentication.*failed",
            r"(?i)api.*key",
            r"(?i)invalid.*api.*key",
            r"(?i)unauthorized",
            r"(?i)forbidden",
            r"(?i)not found",
            r"4\d{2}",
        ],
        HTTP_ALWAYS_RETRY,
        (5, 60000, 2),
    )
});

static SPEECH_SYNTHESIS_API: Lazy<RetryConfig> = Lazy::new(|| {
    preset(
        2000,
        30000,
        3,
        120000,
        &[
            r"(?i)invalid.*request",
            r"(?i)authentication.*failed",
            r"(?i)api.*key",
            r"(?i)unauthorized",
            r"(?i)forbidden",
            r"(?i)not found",
            r"(?i)invalid.*voice",
            r"4\d{2}",
        ],
        HTTP_ALWAYS_RETRY,
        (5, 60000, 2),
    )
});

static DOCUMENT_STORE: Lazy<RetryConfig> = Lazy::new(|| {
    preset(
        1000,
        15000,
        4,
        30000,
        &[
            r"(?i)permission denied",
            r"(?i)authentication failed",
            r"(?i)invalid.*argument",
            r"(?i)not found",
        ],
        &[
            r"(?i)unavailable",
            r"(?i)deadline exceeded",
            r"(?i)resource exhausted",
            r"5\d{2}",
            r"(?i)timeout",
        ],
        (4, 45000, 1),
    )
});

static PAYMENTS_API: Lazy<RetryConfig> = Lazy::new(|| {
    preset(
        2000,
        30000,
        3,
        45000,
        &[
            r"(?i)authentication.*failed",
            r"(?i)invalid.*api.*key",
            r"(?i)unauthorized",
            r"(?i)forbidden",
            r"(?i)not found",
            r"(?i)invalid.*request.*id",
            r"(?i)invalid.*charge",
            r"4\d{2}",
        ],
        HTTP_ALWAYS_RETRY,
        (5, 60000, 2),
    )
});
