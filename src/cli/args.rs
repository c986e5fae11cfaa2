use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use super::commands;

/// Entry point for the `faxbridge` command-line interface.
#[derive(Debug, Parser)]
#[command(
    name = "faxbridge",
    about = "Validate and run multi-step tool plans",
    version,
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (RUST_LOG takes precedence when set)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of ~/.faxbridge/config
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and validate a plan without running it.
    Validate(ValidateArgs),
    /// Execute a plan against scripted tool handlers.
    Run(RunArgs),
    /// Print the effective configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Plan file (JSON, planner chatter around it is tolerated).
    pub plan: PathBuf,

    /// Tool script whose names restrict which tools the plan may use.
    #[arg(long)]
    pub tools: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Plan file (JSON, planner chatter around it is tolerated).
    pub plan: PathBuf,

    /// Tool script describing the canned behavior of each tool.
    #[arg(long)]
    pub tools: PathBuf,

    /// Print the full workflow result as JSON.
    #[arg(long)]
    pub json: bool,

    /// Override the maximum number of concurrent tool calls.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the overall run budget in seconds.
    #[arg(long = "run-timeout", value_name = "SECS")]
    pub run_timeout: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Persist the effective configuration to the config file.
    #[arg(long)]
    pub save: bool,
}

impl Cli {
    pub async fn run(self) -> Result<std::process::ExitCode> {
        commands::run(self).await
    }
}
