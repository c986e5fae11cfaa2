use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::PathBuf;

use super::builder::ConfigBuilder;

pub fn apply_env_overrides(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Some(concurrency) = env_usize("FAXBRIDGE_MAX_CONCURRENCY")? {
        builder = builder.with_executor(|executor| executor.max_concurrency = concurrency);
    }

    if let Some(timeout) = env_u64("FAXBRIDGE_STEP_TIMEOUT_SECS")? {
        builder = builder.with_executor(|executor| executor.step_timeout_secs = timeout);
    }

    if let Some(timeout) = env_u64("FAXBRIDGE_RUN_TIMEOUT_SECS")? {
        builder = builder.with_executor(|executor| executor.run_timeout_secs = timeout);
    }

    if let Some(max_retries) = env_u32("FAXBRIDGE_MAX_RETRIES")? {
        builder = builder.with_retry(|retry| retry.max_retries = max_retries);
    }

    if let Some(base_delay) = env_u64("FAXBRIDGE_RETRY_BASE_DELAY_MS")? {
        builder = builder.with_retry(|retry| retry.base_delay_ms = base_delay);
    }

    if let Some(max_delay) = env_u64("FAXBRIDGE_RETRY_MAX_DELAY_MS")? {
        builder = builder.with_retry(|retry| retry.max_delay_ms = max_delay);
    }

    if let Some(multiplier) = env_f64("FAXBRIDGE_RETRY_MULTIPLIER")? {
        builder = builder.with_retry(|retry| retry.multiplier = multiplier);
    }

    if let Some(log_path) = env_string("FAXBRIDGE_AUDIT_LOG")? {
        builder = builder.with_audit(|audit| {
            audit.log_path = (!log_path.trim().is_empty()).then(|| PathBuf::from(log_path));
        });
    }

    if let Some(retention) = env_u64("FAXBRIDGE_RETENTION_SECS")? {
        builder = builder.with_retention(|settings| settings.retention_secs = retention);
    }

    Ok(builder)
}

pub fn env_string(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(val) => Ok(Some(val)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(anyhow!("{key} contains invalid UTF-8")),
    }
}

pub fn env_u64(key: &str) -> Result<Option<u64>> {
    if let Some(value) = env_string(key)? {
        let parsed = value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {key} as u64"))?;
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}

pub fn env_u32(key: &str) -> Result<Option<u32>> {
    if let Some(value) = env_string(key)? {
        let parsed = value
            .trim()
            .parse::<u32>()
            .with_context(|| format!("Failed to parse {key} as u32"))?;
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}

pub fn env_usize(key: &str) -> Result<Option<usize>> {
    if let Some(value) = env_string(key)? {
        let parsed = value
            .trim()
            .parse::<usize>()
            .with_context(|| format!("Failed to parse {key} as an unsigned integer"))?;
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}

pub fn env_f64(key: &str) -> Result<Option<f64>> {
    if let Some(value) = env_string(key)? {
        let parsed = value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("Failed to parse {key} as a number"))?;
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}
