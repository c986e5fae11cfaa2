use super::constants::{DEFAULT_MAX_ARCHIVED_RUNS, DEFAULT_RETENTION_SECS};
use super::types::{AuditSettings, ExecutorSettings, RetentionSettings, RetrySettings};
use crate::executor::{DEFAULT_MAX_CONCURRENCY, DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_STEP_TIMEOUT_SECS};
use crate::retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_MULTIPLIER,
};

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: None,
        }
    }
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            max_archived_runs: DEFAULT_MAX_ARCHIVED_RUNS,
        }
    }
}
