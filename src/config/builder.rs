use anyhow::Result;

use super::types::{AuditSettings, Config, ExecutorSettings, RetentionSettings, RetrySettings};

#[derive(Debug)]
pub struct ConfigBuilder {
    pub(super) executor: ExecutorSettings,
    pub(super) retry: RetrySettings,
    pub(super) audit: AuditSettings,
    pub(super) retention: RetentionSettings,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            executor: ExecutorSettings::default(),
            retry: RetrySettings::default(),
            audit: AuditSettings::default(),
            retention: RetentionSettings::default(),
        }
    }

    pub fn with_executor<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut ExecutorSettings),
    {
        update(&mut self.executor);
        self
    }

    pub fn with_retry<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut RetrySettings),
    {
        update(&mut self.retry);
        self
    }

    pub fn with_audit<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut AuditSettings),
    {
        update(&mut self.audit);
        self
    }

    pub fn with_retention<F>(mut self, update: F) -> Self
    where
        F: FnOnce(&mut RetentionSettings),
    {
        update(&mut self.retention);
        self
    }

    pub fn build(self) -> Result<Config> {
        Ok(Config {
            executor: self.executor,
            retry: self.retry,
            audit: self.audit,
            retention: self.retention,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
