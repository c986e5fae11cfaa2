use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::Params;

/// Lifecycle of one plan run.
///
/// `Error` is a transient marker: it is set while independent branches keep
/// running after a step failure and resolves to `Failed` at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Initialized,
    Running,
    Completed,
    Failed,
    Error,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Initialized, Running)
                | (Initialized, Failed)
                | (Running, Error)
                | (Running, Completed)
                | (Running, Failed)
                | (Error, Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Initialized => "initialized",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// Why a step was never invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    DependencyFailed { dependency: String },
    ConditionNotMet { step: String },
    Cancelled,
    RunTimedOut,
}

impl SkipReason {
    /// Whether dependents of a step skipped for this reason inherit the failure.
    pub fn propagates_failure(&self) -> bool {
        !matches!(self, SkipReason::ConditionNotMet { .. })
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency '{dependency}' did not succeed")
            }
            SkipReason::ConditionNotMet { step } => {
                write!(f, "condition on '{step}' was not met")
            }
            SkipReason::Cancelled => write!(f, "run was cancelled"),
            SkipReason::RunTimedOut => write!(f, "run timed out"),
        }
    }
}

/// Scheduling state of a single step within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped(_)
        )
    }

    /// Failed outright, or skipped because something upstream failed.
    pub fn is_failure(&self) -> bool {
        match self {
            StepStatus::Failed => true,
            StepStatus::Skipped(reason) => reason.propagates_failure(),
            _ => false,
        }
    }
}

/// One attempt (or skip) of one step. Entries are appended, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub tool: String,
    pub input: Params,
    pub output: Option<Value>,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// 1-based attempt number; 0 for steps that were skipped.
    pub attempt: u32,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl StepResult {
    pub fn skipped(
        step_id: impl Into<String>,
        tool: impl Into<String>,
        input: Params,
        reason: SkipReason,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            input,
            output: None,
            success: false,
            error: None,
            timestamp: Utc::now(),
            attempt: 0,
            duration_ms: 0,
            skipped: Some(reason),
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}
