//! Per-run execution state.
//!
//! An `ExecutionState` is created when a run starts and is mutated only by
//! the executor that owns it. Terminal states can be handed to a
//! [`StateArchive`] and are read-only from then on.

mod archive;
mod types;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::template::TemplateSource;
use crate::value::{lookup_path, response_text, value_to_text};

pub use archive::StateArchive;
pub use types::{RunStatus, SkipReason, StepResult, StepStatus};

#[derive(Debug, Clone)]
pub struct ExecutionState {
    execution_id: String,
    results: Vec<StepResult>,
    outputs: HashMap<String, String>,
    output_sources: HashMap<String, String>,
    raw_results: HashMap<String, Value>,
    step_status: HashMap<String, StepStatus>,
    last_attempt_at: HashMap<String, DateTime<Utc>>,
    errors: Vec<String>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    total_retries: u32,
}

impl ExecutionState {
    pub fn new<I, S>(step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_id(uuid::Uuid::new_v4().to_string(), step_ids)
    }

    pub fn with_id<I, S>(execution_id: impl Into<String>, step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            execution_id: execution_id.into(),
            results: Vec::new(),
            outputs: HashMap::new(),
            output_sources: HashMap::new(),
            raw_results: HashMap::new(),
            step_status: step_ids
                .into_iter()
                .map(|id| (id.into(), StepStatus::Pending))
                .collect(),
            last_attempt_at: HashMap::new(),
            errors: Vec::new(),
            status: RunStatus::Initialized,
            started_at: Utc::now(),
            finished_at: None,
            total_retries: 0,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    pub fn raw_result(&self, step_id: &str) -> Option<&Value> {
        self.raw_results.get(step_id)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn total_retries(&self) -> u32 {
        self.total_retries
    }

    pub fn last_attempt_at(&self, step_id: &str) -> Option<DateTime<Utc>> {
        self.last_attempt_at.get(step_id).copied()
    }

    pub fn step_status(&self, step_id: &str) -> Option<&StepStatus> {
        self.step_status.get(step_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Most recent entry recorded for a step.
    pub fn latest_result(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().rev().find(|result| result.step_id == step_id)
    }

    /// Latest entry of every step, in the order steps first appear in the log.
    pub fn final_results(&self) -> Vec<&StepResult> {
        let mut order: Vec<&str> = Vec::new();
        for result in &self.results {
            if !order.contains(&result.step_id.as_str()) {
                order.push(result.step_id.as_str());
            }
        }
        order
            .into_iter()
            .filter_map(|id| self.latest_result(id))
            .collect()
    }

    pub fn count_status<F>(&self, predicate: F) -> usize
    where
        F: Fn(&StepStatus) -> bool,
    {
        self.step_status.values().filter(|status| predicate(status)).count()
    }

    /// Moves the run to `next` if the lifecycle allows it.
    pub fn transition(&mut self, next: RunStatus) -> bool {
        if self.status == next {
            return true;
        }
        if !self.status.can_transition_to(next) {
            warn!(
                execution_id = %self.execution_id,
                from = %self.status,
                to = %next,
                "ignoring invalid run status transition"
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn set_step_status(&mut self, step_id: &str, status: StepStatus) {
        self.step_status.insert(step_id.to_string(), status);
    }

    /// Appends an attempt entry; successful outputs become the step's raw result.
    pub fn record(&mut self, result: StepResult) {
        if result.attempt > 0 {
            self.last_attempt_at
                .insert(result.step_id.clone(), result.timestamp);
        }
        if let Some(output) = &result.output {
            self.raw_results.insert(result.step_id.clone(), output.clone());
        }
        self.results.push(result);
    }

    pub fn record_retry(&mut self) {
        self.total_retries += 1;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Binds a step's result under `key`. Bindings are write-once.
    pub fn bind_output(&mut self, key: &str, step_id: &str, value: &Value) -> bool {
        if self.outputs.contains_key(key) {
            warn!(key, step_id, "output key already bound; keeping first value");
            return false;
        }
        self.outputs.insert(key.to_string(), response_text(value));
        self.output_sources
            .insert(key.to_string(), step_id.to_string());
        true
    }
}

impl TemplateSource for ExecutionState {
    fn output(&self, key: &str) -> Option<String> {
        self.outputs.get(key).cloned()
    }

    fn field(&self, key: &str, path: &[&str]) -> Option<String> {
        let step_id = self
            .output_sources
            .get(key)
            .map(String::as_str)
            .unwrap_or(key);
        self.raw_results
            .get(step_id)
            .and_then(|value| lookup_path(value, path))
            .map(value_to_text)
    }
}

#[cfg(test)]
mod tests;
