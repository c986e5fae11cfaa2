pub const CONFIG_PATH_ENV: &str = "FAXBRIDGE_CONFIG";
pub const CONFIG_RELATIVE_PATH: &str = ".faxbridge/config";
pub const DEFAULT_RETENTION_SECS: u64 = 3_600;
pub const DEFAULT_MAX_ARCHIVED_RUNS: usize = 256;
