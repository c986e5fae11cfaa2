use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use faxbridge::config::Config;
use faxbridge::executor::PlanExecutor;
use faxbridge::plan::{RawPlan, parse_plan_text};
use faxbridge::tools::{ToolRegistry, load_tool_script};
use faxbridge::validator::PlanValidator;

use super::args::{Cli, Command, ConfigArgs, RunArgs, ValidateArgs};
use super::render;

pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Validate(args) => handle_validate(args),
        Command::Run(args) => handle_run(args, config).await,
        Command::Config(args) => handle_config(args, &config, cli.config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

fn read_plan(path: &Path) -> Result<RawPlan> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    parse_plan_text(&contents).with_context(|| format!("Invalid plan in {}", path.display()))
}

fn load_registry(path: &Path) -> Result<ToolRegistry> {
    Ok(load_tool_script(path, ToolRegistry::builder())?.build())
}

fn handle_validate(args: ValidateArgs) -> Result<ExitCode> {
    let raw = read_plan(&args.plan)?;
    let validator = match &args.tools {
        Some(tools) => PlanValidator::new().with_known_tools(load_registry(tools)?.names()),
        None => PlanValidator::new(),
    };

    match validator.validate_raw(raw) {
        Ok(validated) => {
            render::print_validated(&validated);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{} {}", "✗ Plan rejected:".red().bold(), err);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn handle_run(args: RunArgs, mut config: Config) -> Result<ExitCode> {
    if let Some(concurrency) = args.concurrency {
        config.executor.max_concurrency = concurrency;
    }
    if let Some(run_timeout) = args.run_timeout {
        config.executor.run_timeout_secs = run_timeout;
    }
    config.validate()?;

    let raw = read_plan(&args.plan)?;
    let registry = Arc::new(load_registry(&args.tools)?);
    let executor = PlanExecutor::from_config(registry, &config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let outcome = executor.execute_raw(raw, cancel).await;
    watcher.abort();

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{} {}", "✗ Plan rejected:".red().bold(), err);
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize workflow result")?;
        println!("{json}");
    } else {
        render::print_workflow(&result);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn handle_config(args: ConfigArgs, config: &Config, explicit: Option<&Path>) -> Result<ExitCode> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };

    if args.save {
        config.save_to(&path)?;
        println!("✅ Configuration saved to {}", path.display());
    } else {
        println!("📋 Configuration ({})", path.display());
    }
    render::print_config(config);
    Ok(ExitCode::SUCCESS)
}
