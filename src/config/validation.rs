use anyhow::{Result, bail};

use super::types::Config;

pub fn validate(config: &Config) -> Result<()> {
    if config.executor.max_concurrency == 0 {
        bail!("executor.max_concurrency must be at least 1");
    }
    if config.executor.step_timeout_secs == 0 {
        bail!("executor.step_timeout_secs must be greater than zero");
    }
    if config.executor.run_timeout_secs == 0 {
        bail!("executor.run_timeout_secs must be greater than zero");
    }
    if !config.retry.multiplier.is_finite() || config.retry.multiplier < 1.0 {
        bail!(
            "retry.multiplier must be a finite number >= 1, got {}",
            config.retry.multiplier
        );
    }
    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        bail!(
            "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
            config.retry.base_delay_ms,
            config.retry.max_delay_ms
        );
    }
    if config.retention.max_archived_runs == 0 {
        bail!("retention.max_archived_runs must be at least 1");
    }
    Ok(())
}
