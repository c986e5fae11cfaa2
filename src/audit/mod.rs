//! Structured audit trail of a run.
//!
//! Sinks receive events by shared reference and must not block for long;
//! the executor calls them inline between scheduling decisions.

mod sinks;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{RunStatus, SkipReason, StepResult};

pub use sinks::{JsonLinesAuditSink, MemoryAuditSink, NoopAuditSink, TracingAuditSink};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AuditEvent {
    RunStarted {
        execution_id: String,
        steps: usize,
        timestamp: DateTime<Utc>,
    },
    StepAttempt {
        execution_id: String,
        step_id: String,
        tool: String,
        attempt: u32,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skipped: Option<SkipReason>,
        /// Formatter description of the attempt.
        description: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        execution_id: String,
        status: RunStatus,
        success: bool,
        total_steps: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        total_retries: u32,
        errors: Vec<String>,
        duration_ms: u64,
        summary: String,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    pub fn step_attempt(execution_id: &str, result: &StepResult, description: String) -> Self {
        AuditEvent::StepAttempt {
            execution_id: execution_id.to_string(),
            step_id: result.step_id.clone(),
            tool: result.tool.clone(),
            attempt: result.attempt,
            success: result.success,
            error: result.error.clone(),
            skipped: result.skipped.clone(),
            description,
            duration_ms: result.duration_ms,
            timestamp: result.timestamp,
        }
    }

    pub fn execution_id(&self) -> &str {
        match self {
            AuditEvent::RunStarted { execution_id, .. }
            | AuditEvent::StepAttempt { execution_id, .. }
            | AuditEvent::RunCompleted { execution_id, .. } => execution_id,
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

#[cfg(test)]
mod tests;
