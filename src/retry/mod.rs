//! Error classification and exponential backoff for tool calls.

use std::time::Duration;

use crate::error::ToolError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Phrases that mark a failure as permanent. Checked before
/// [`RETRYABLE_PATTERNS`], so "invalid input after connection reset" stays permanent.
/// Matched against the lowercased message with `-` and `_` read as spaces.
const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "validation",
    "invalid input",
    "invalid parameter",
    "invalid argument",
    "unauthorized",
    "unauthenticated",
    "authentication",
    "forbidden",
    "authorization",
    "permission denied",
    "not found",
];

const RETRYABLE_PATTERNS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection",
    "econnreset",
    "econnrefused",
    "server error",
    "internal error",
    "service unavailable",
    "unavailable",
    "bad gateway",
    "rate limit",
    "too many requests",
];

/// HTTP status codes, only matched as whole tokens.
const NON_RETRYABLE_STATUS_CODES: &[&str] = &["401", "403", "404"];

const RETRYABLE_STATUS_CODES: &[&str] = &["429", "500", "502", "503", "504"];

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            multiplier: DEFAULT_MULTIPLIER,
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Total attempts a retryable step may consume.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn is_retryable(&self, error: &ToolError) -> bool {
        match error {
            ToolError::Retryable(_) | ToolError::Timeout(_) => true,
            ToolError::NonRetryable(_) | ToolError::NotFound(_) | ToolError::Cancelled => false,
            ToolError::Failed(message) => classify_message(message),
        }
    }

    /// Backoff after the given 1-based failed attempt:
    /// `min(max_delay, base_delay * multiplier^(attempt-1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let cap = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= cap {
            self.max_delay
        } else {
            Duration::from_millis(millis.round() as u64)
        }
    }

    /// Delay before retrying after `attempt` failed with `error`, or `None`
    /// when the step is out of budget or the error is permanent.
    pub fn next_delay(&self, attempt: u32, error: &ToolError) -> Option<Duration> {
        if attempt > self.max_retries || !self.is_retryable(error) {
            return None;
        }
        Some(self.delay_for(attempt))
    }
}

/// Text-based classification for errors without an explicit kind.
/// Unrecognized messages are treated as permanent.
pub fn classify_message(message: &str) -> bool {
    let normalized = message.to_lowercase().replace(['-', '_'], " ");
    let tokens: Vec<&str> = normalized
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();
    let matches = |phrases: &[&str], status_codes: &[&str]| {
        phrases.iter().any(|phrase| normalized.contains(phrase))
            || tokens.iter().any(|token| status_codes.contains(token))
    };

    if matches(NON_RETRYABLE_PATTERNS, NON_RETRYABLE_STATUS_CODES) {
        return false;
    }
    matches(RETRYABLE_PATTERNS, RETRYABLE_STATUS_CODES)
}
