//! Configuration management for the faxbridge engine.
//!
//! Settings are layered in a fixed order:
//! - Built-in defaults
//! - JSON file (`~/.faxbridge/config`, or `FAXBRIDGE_CONFIG` / `--config`)
//! - Environment variable overrides
//! - Validation

mod builder;
mod constants;
mod defaults;
mod environment;
mod loader;
mod types;
mod validation;

pub use builder::ConfigBuilder;
pub use constants::{CONFIG_PATH_ENV, DEFAULT_MAX_ARCHIVED_RUNS, DEFAULT_RETENTION_SECS};
pub use types::{AuditSettings, Config, ExecutorSettings, RetentionSettings, RetrySettings};
