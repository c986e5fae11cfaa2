use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::plan::Params;
use crate::state::{RunStatus, SkipReason, StepResult};

fn failed_attempt() -> StepResult {
    StepResult {
        step_id: "send".to_string(),
        tool: "send_fax".to_string(),
        input: Params::new(),
        output: None,
        success: false,
        error: Some("503 service unavailable".to_string()),
        timestamp: Utc::now(),
        attempt: 2,
        duration_ms: 15,
        skipped: None,
    }
}

#[test]
fn step_attempt_serializes_with_event_tag() {
    let event = AuditEvent::step_attempt("run-1", &failed_attempt(), "fax.send_fax".to_string());
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["event"], "step_attempt");
    assert_eq!(value["executionId"], "run-1");
    assert_eq!(value["stepId"], "send");
    assert_eq!(value["attempt"], 2);
    assert_eq!(value["error"], "503 service unavailable");
    assert!(value.get("skipped").is_none());
}

#[test]
fn skip_reason_is_carried() {
    let skipped = StepResult::skipped(
        "notify",
        "send_email",
        Params::new(),
        SkipReason::DependencyFailed {
            dependency: "send".to_string(),
        },
    );
    let event = AuditEvent::step_attempt("run-1", &skipped, "email.send_email".to_string());
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(
        value["skipped"],
        json!({"kind": "dependency_failed", "dependency": "send"})
    );
    assert_eq!(value["attempt"], 0);
}

#[test]
fn memory_sink_collects_events_in_order() {
    let sink = MemoryAuditSink::new();
    assert!(sink.is_empty());
    sink.record(&AuditEvent::RunStarted {
        execution_id: "run-1".to_string(),
        steps: 2,
        timestamp: Utc::now(),
    });
    sink.record(&AuditEvent::step_attempt("run-1", &failed_attempt(), String::new()));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], AuditEvent::RunStarted { steps: 2, .. }));
    assert!(events.iter().all(|event| event.execution_id() == "run-1"));
}

#[test]
fn json_lines_sink_appends_one_line_per_event() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("audit.jsonl");
    let sink = JsonLinesAuditSink::open(&path).unwrap();

    sink.record(&AuditEvent::step_attempt("run-1", &failed_attempt(), String::new()));
    sink.record(&AuditEvent::RunCompleted {
        execution_id: "run-1".to_string(),
        status: RunStatus::Failed,
        success: false,
        total_steps: 2,
        succeeded: 0,
        failed: 1,
        skipped: 0,
        total_retries: 1,
        errors: vec!["Step 'send' failed: 503".to_string()],
        duration_ms: 20,
        summary: "Completed 0 of 2 steps.".to_string(),
        timestamp: Utc::now(),
    });

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    let raw: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(raw["totalSteps"], 2);
    assert_eq!(raw["summary"], "Completed 0 of 2 steps.");
    let completed: AuditEvent = serde_json::from_str(lines[1]).unwrap();
    assert!(matches!(
        completed,
        AuditEvent::RunCompleted {
            status: RunStatus::Failed,
            total_retries: 1,
            ..
        }
    ));
}

#[test]
fn tracing_and_noop_sinks_accept_every_event() {
    let event = AuditEvent::step_attempt("run-1", &failed_attempt(), String::new());
    TracingAuditSink.record(&event);
    NoopAuditSink.record(&event);
}
