use anyhow::{Context, Result};
use dirs::home_dir;
use std::fs;
use std::path::{Path, PathBuf};

use super::builder::ConfigBuilder;
use super::constants::{CONFIG_PATH_ENV, CONFIG_RELATIVE_PATH};
use super::environment::{apply_env_overrides, env_string};
use super::types::{FileConfig, PersistedConfig};
use super::validation::validate;
use super::Config;

impl Config {
    /// `FAXBRIDGE_CONFIG` when set, otherwise `~/.faxbridge/config`.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = env_string(CONFIG_PATH_ENV)? {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let mut path = home_dir().context("Could not determine home directory")?;
        path.push(CONFIG_RELATIVE_PATH);
        Ok(path)
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads with an explicit file path; a missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::new();

        if path.exists() {
            builder = Self::apply_file(builder, path)?;
        }

        builder = apply_env_overrides(builder)?;

        let config = builder.build()?;
        validate(&config)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Unable to create config directory {}", parent.display())
            })?;
        }

        let payload = PersistedConfig::from(self);
        let json = serde_json::to_string_pretty(&payload)
            .context("Failed to serialize configuration to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate(self)
    }

    fn apply_file(builder: ConfigBuilder, path: &Path) -> Result<ConfigBuilder> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed reading config at {}", path.display()))?;

        if contents.trim().is_empty() {
            return Ok(builder);
        }

        let file: FileConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed parsing JSON config at {}", path.display()))?;

        Ok(file.apply(builder))
    }
}

impl FileConfig {
    pub fn apply(self, builder: ConfigBuilder) -> ConfigBuilder {
        let FileConfig {
            executor,
            retry,
            audit,
            retention,
        } = self;

        let builder = builder.with_executor(|settings| {
            let Some(file) = executor else { return };
            if let Some(concurrency) = file.max_concurrency {
                settings.max_concurrency = concurrency;
            }
            if let Some(timeout) = file.step_timeout_secs {
                settings.step_timeout_secs = timeout;
            }
            if let Some(timeout) = file.run_timeout_secs {
                settings.run_timeout_secs = timeout;
            }
        });

        let builder = builder.with_retry(|settings| {
            let Some(file) = retry else { return };
            if let Some(max_retries) = file.max_retries {
                settings.max_retries = max_retries;
            }
            if let Some(base_delay) = file.base_delay_ms {
                settings.base_delay_ms = base_delay;
            }
            if let Some(max_delay) = file.max_delay_ms {
                settings.max_delay_ms = max_delay;
            }
            if let Some(multiplier) = file.multiplier {
                settings.multiplier = multiplier;
            }
        });

        let builder = builder.with_audit(|settings| {
            let Some(file) = audit else { return };
            if let Some(enabled) = file.enabled {
                settings.enabled = enabled;
            }
            if file.log_path.is_some() {
                settings.log_path = file.log_path;
            }
        });

        builder.with_retention(|settings| {
            let Some(file) = retention else { return };
            if let Some(retention_secs) = file.retention_secs {
                settings.retention_secs = retention_secs;
            }
            if let Some(max_runs) = file.max_archived_runs {
                settings.max_archived_runs = max_runs;
            }
        })
    }
}
