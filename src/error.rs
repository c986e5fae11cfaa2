//! Error taxonomy for plan execution.
//!
//! Validation errors stop a plan before any step runs. Tool errors are
//! classified by the retry policy. Condition errors never escape the
//! scheduler; they degrade to `false`. Run errors end up in
//! `WorkflowResult::errors` rather than being returned to the caller.

use std::time::Duration;

use thiserror::Error;

use crate::plan::ConditionCheck;

/// Reasons a plan is rejected before execution starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Plan is not valid JSON: {0}")]
    Malformed(String),

    #[error("Plan contains no steps")]
    EmptyPlan,

    #[error("Plan has no executable steps ({dropped} step(s) dropped for missing id, tool or params)")]
    NoExecutableSteps { dropped: usize },

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Output key '{key}' is bound by both '{first}' and '{second}'")]
    DuplicateOutputKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("Step '{step}' depends on undefined step '{dependency}'")]
    MissingDependency { step: String, dependency: String },

    #[error("Step '{step}' has a condition on undefined step '{target}'")]
    UnknownConditionStep { step: String, target: String },

    #[error("Step '{step}' uses unregistered tool '{tool}'")]
    UnknownTool { step: String, tool: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}

/// Failure reported by a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    NonRetryable(String),

    #[error("Tool call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Tool '{0}' not found")]
    NotFound(String),

    /// Unclassified failure; the retry policy inspects the message.
    #[error("{0}")]
    Failed(String),

    #[error("Tool call cancelled")]
    Cancelled,
}

impl ToolError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::NonRetryable(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Problems evaluating a step condition. Always treated as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("Check '{0}' requires a comparison value")]
    MissingValue(ConditionCheck),

    #[error("Field '{field}' not present in result of step '{step}'")]
    FieldNotFound { step: String, field: String },
}

/// Run-level failures recorded in the workflow result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("Run exceeded its overall budget of {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("Run cancelled by caller")]
    Cancelled,

    #[error("Schedule stalled with {} step(s) never ready: {}", .0.len(), .0.join(", "))]
    Stalled(Vec<String>),

    #[error("Step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },
}
