use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::state::{RunStatus, StepResult};

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

/// Scheduling limits for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Upper bound on concurrent tool calls across independent branches.
    pub max_concurrency: usize,
    /// Deadline for one tool call unless the step sets `timeoutMs`.
    pub step_timeout: Duration,
    /// Wall-clock budget of the whole run.
    pub run_timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
        }
    }
}

/// What a caller gets back from a run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub execution_id: String,
    pub success: bool,
    pub status: RunStatus,
    /// Every attempt and skip, in the order they were recorded.
    pub steps: Vec<StepResult>,
    /// Raw output of the last step, in plan order, that succeeded.
    pub final_output: Option<Value>,
    pub outputs: HashMap<String, String>,
    pub human_readable_summary: String,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_steps: Vec<String>,
    pub total_retries: u32,
    pub duration_ms: u64,
}

impl WorkflowResult {
    /// Latest entry recorded for `step_id`.
    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.steps.iter().rev().find(|result| result.step_id == step_id)
    }

    /// Number of attempts made for `step_id`; skips do not count.
    pub fn attempts(&self, step_id: &str) -> usize {
        self.steps
            .iter()
            .filter(|result| result.step_id == step_id && !result.was_skipped())
            .count()
    }
}
