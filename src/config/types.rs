use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::executor::ExecutorOptions;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub executor: ExecutorSettings,
    pub retry: RetrySettings,
    pub audit: AuditSettings,
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutorSettings {
    pub max_concurrency: usize,
    pub step_timeout_secs: u64,
    pub run_timeout_secs: u64,
}

impl ExecutorSettings {
    pub fn options(&self) -> ExecutorOptions {
        ExecutorOptions {
            max_concurrency: self.max_concurrency,
            step_timeout: Duration::from_secs(self.step_timeout_secs),
            run_timeout: Duration::from_secs(self.run_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSettings {
    /// Emit audit events through `tracing`.
    pub enabled: bool,
    /// Also append JSON lines to this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionSettings {
    pub retention_secs: u64,
    pub max_archived_runs: usize,
}

impl RetentionSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

// File configuration types
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct FileConfig {
    pub executor: Option<FileExecutorSettings>,
    pub retry: Option<FileRetrySettings>,
    pub audit: Option<FileAuditSettings>,
    pub retention: Option<FileRetentionSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct FileExecutorSettings {
    pub max_concurrency: Option<usize>,
    pub step_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct FileRetrySettings {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct FileAuditSettings {
    pub enabled: Option<bool>,
    pub log_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct FileRetentionSettings {
    pub retention_secs: Option<u64>,
    pub max_archived_runs: Option<usize>,
}

// Serialization helpers
#[derive(Serialize)]
pub(super) struct PersistedConfig<'a> {
    pub executor: &'a ExecutorSettings,
    pub retry: &'a RetrySettings,
    pub audit: &'a AuditSettings,
    pub retention: &'a RetentionSettings,
}

impl<'a> From<&'a Config> for PersistedConfig<'a> {
    fn from(config: &'a Config) -> Self {
        PersistedConfig {
            executor: &config.executor,
            retry: &config.retry,
            audit: &config.audit,
            retention: &config.retention,
        }
    }
}
