//! Human-readable narrative of a finished run.
//!
//! Presentational only; nothing here feeds back into scheduling.

use std::fmt;

use serde::Serialize;

use crate::plan::ExecutionPlan;
use crate::state::{ExecutionState, StepResult};
use crate::tools::ToolRegistry;

/// Produces the one-line description of a step result.
pub trait StepDescriber {
    fn describe(&self, result: &StepResult) -> String;
}

impl StepDescriber for ToolRegistry {
    fn describe(&self, result: &StepResult) -> String {
        ToolRegistry::describe(self, result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAction {
    pub step_id: String,
    pub description: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedStep {
    pub step_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunNarrative {
    pub summary: Option<String>,
    pub succeeded: usize,
    pub total: usize,
    pub successes: Vec<String>,
    pub failures: Vec<FailedAction>,
    pub skipped: Vec<SkippedStep>,
    pub run_errors: Vec<String>,
}

impl RunNarrative {
    /// Builds the narrative from the latest result of each step, in plan order.
    pub fn build<D>(plan: &ExecutionPlan, state: &ExecutionState, describer: &D) -> Self
    where
        D: StepDescriber + ?Sized,
    {
        let mut narrative = RunNarrative {
            summary: plan.summary.clone(),
            succeeded: 0,
            total: plan.len(),
            successes: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            run_errors: Vec::new(),
        };

        for step in &plan.steps {
            let Some(result) = state.latest_result(&step.id) else {
                continue;
            };
            if let Some(reason) = &result.skipped {
                narrative.skipped.push(SkippedStep {
                    step_id: step.id.clone(),
                    reason: reason.to_string(),
                });
            } else if result.success {
                narrative.succeeded += 1;
                narrative.successes.push(describer.describe(result));
            } else {
                narrative.failures.push(FailedAction {
                    step_id: step.id.clone(),
                    description: describer.describe(result),
                    error: result
                        .error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }

        narrative
    }

    /// Attaches run-level failures (timeout, cancellation) that no single
    /// step accounts for.
    pub fn with_run_errors<I>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.run_errors.extend(errors);
        self
    }
}

impl fmt::Display for RunNarrative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(summary) = &self.summary {
            writeln!(f, "{summary}")?;
        }
        write!(f, "Completed {} of {} steps.", self.succeeded, self.total)?;
        if !self.successes.is_empty() {
            write!(f, "\nSuccessful actions:")?;
            for action in &self.successes {
                write!(f, "\n- {action}")?;
            }
        }
        if !self.failures.is_empty() {
            write!(f, "\nFailed actions:")?;
            for failure in &self.failures {
                write!(f, "\n- {}: {}", failure.description, failure.error)?;
            }
        }
        if !self.skipped.is_empty() {
            write!(f, "\nSkipped steps:")?;
            for skipped in &self.skipped {
                write!(f, "\n- {} ({})", skipped.step_id, skipped.reason)?;
            }
        }
        for error in &self.run_errors {
            write!(f, "\n{error}")?;
        }
        Ok(())
    }
}

/// Renders the narrative text for a finished run.
pub fn generate<D>(plan: &ExecutionPlan, state: &ExecutionState, describer: &D) -> String
where
    D: StepDescriber + ?Sized,
{
    RunNarrative::build(plan, state, describer).to_string()
}
