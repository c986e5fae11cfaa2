use colored::Colorize;

use faxbridge::config::Config;
use faxbridge::executor::WorkflowResult;
use faxbridge::validator::ValidatedPlan;

pub(crate) fn print_validated(validated: &ValidatedPlan) {
    let plan = validated.plan();
    println!(
        "{} {} step(s) accepted",
        "✓ Plan is valid:".green().bold(),
        plan.len()
    );
    if let Some(summary) = &plan.summary {
        println!("   {}", summary.italic());
    }
    for step in &plan.steps {
        let mut line = format!("   {} {}", step.id.bold(), step.tool.cyan());
        if !step.depends_on.is_empty() {
            line.push_str(&format!(" after [{}]", step.depends_on.join(", ")));
        }
        if let Some(condition) = &step.condition {
            line.push_str(&format!(" if {} {}", condition.step, condition.check));
            if let Some(value) = &condition.value {
                line.push_str(&format!(" '{value}'"));
            }
        }
        if let Some(key) = &step.output_key {
            line.push_str(&format!(" -> {{{key}}}"));
        }
        println!("{line}");
    }
    for dropped in validated.dropped() {
        println!("   {} dropped {}", "⚠".yellow(), dropped);
    }
}

pub(crate) fn print_workflow(result: &WorkflowResult) {
    let headline = if result.success {
        format!("✓ Run {} completed", result.execution_id).green().bold()
    } else {
        format!("✗ Run {} {}", result.execution_id, result.status).red().bold()
    };
    println!("{headline}");
    println!("{}", result.human_readable_summary);
    for dropped in &result.dropped_steps {
        println!("{} dropped {}", "⚠".yellow(), dropped);
    }
    println!(
        "{}",
        format!(
            "{} attempt(s), {} retr{}, {}ms",
            result.steps.iter().filter(|step| !step.was_skipped()).count(),
            result.total_retries,
            if result.total_retries == 1 { "y" } else { "ies" },
            result.duration_ms
        )
        .dimmed()
    );
}

pub(crate) fn print_config(config: &Config) {
    println!("   Max concurrency: {}", config.executor.max_concurrency);
    println!("   Step timeout: {}s", config.executor.step_timeout_secs);
    println!("   Run timeout: {}s", config.executor.run_timeout_secs);
    println!(
        "   Retries: {} (base {}ms, x{}, max {}ms)",
        config.retry.max_retries,
        config.retry.base_delay_ms,
        config.retry.multiplier,
        config.retry.max_delay_ms
    );
    let audit = match (&config.audit.log_path, config.audit.enabled) {
        (_, false) => "disabled".to_string(),
        (Some(path), true) => path.display().to_string(),
        (None, true) => "tracing".to_string(),
    };
    println!("   Audit: {audit}");
    println!(
        "   Retention: {}s, up to {} run(s)",
        config.retention.retention_secs, config.retention.max_archived_runs
    );
}
