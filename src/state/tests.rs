use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use crate::plan::Params;
use crate::template::TemplateSource;

use super::{ExecutionState, RunStatus, SkipReason, StateArchive, StepResult, StepStatus};

fn attempt(step_id: &str, attempt: u32, output: Option<serde_json::Value>, success: bool) -> StepResult {
    StepResult {
        step_id: step_id.to_string(),
        tool: "lookup".to_string(),
        input: Params::new(),
        output,
        success,
        error: (!success).then(|| "boom".to_string()),
        timestamp: Utc::now(),
        attempt,
        duration_ms: 5,
        skipped: None,
    }
}

fn finished_state(id: &str) -> ExecutionState {
    let mut state = ExecutionState::with_id(id, ["s1"]);
    assert!(state.transition(RunStatus::Running));
    assert!(state.transition(RunStatus::Completed));
    state
}

#[test]
fn lifecycle_transitions_are_enforced() {
    let mut state = ExecutionState::new(["s1"]);
    assert_eq!(state.status(), RunStatus::Initialized);
    assert!(!state.transition(RunStatus::Completed));
    assert!(state.transition(RunStatus::Running));
    assert!(state.transition(RunStatus::Error));
    assert!(!state.transition(RunStatus::Completed));
    assert!(state.transition(RunStatus::Failed));
    assert!(state.finished_at().is_some());
    assert!(!state.transition(RunStatus::Running));
}

#[test]
fn retries_append_new_entries() {
    let mut state = ExecutionState::new(["s1"]);
    state.record(attempt("s1", 1, None, false));
    state.record_retry();
    state.record(attempt("s1", 2, Some(json!({"email": "a@b.com"})), true));

    assert_eq!(state.results().len(), 2);
    assert!(!state.results()[0].success);
    assert_eq!(state.latest_result("s1").map(|r| r.attempt), Some(2));
    assert_eq!(state.final_results().len(), 1);
    assert_eq!(state.total_retries(), 1);
    assert!(state.last_attempt_at("s1").is_some());
}

#[test]
fn output_bindings_are_write_once() {
    let mut state = ExecutionState::new(["s1", "s2"]);
    assert!(state.bind_output("c", "s1", &json!({"response": "first"})));
    assert!(!state.bind_output("c", "s2", &json!({"response": "second"})));
    assert_eq!(state.output("c").as_deref(), Some("first"));
}

#[test]
fn field_lookup_follows_output_key_then_step_id() {
    let mut state = ExecutionState::new(["s1", "s2"]);
    let result = json!({"response": "hello", "count": 3});
    state.record(attempt("s1", 1, Some(result.clone()), true));
    state.bind_output("k", "s1", &result);
    state.record(attempt("s2", 1, Some(json!({"id": 42})), true));

    assert_eq!(state.output("k").as_deref(), Some("hello"));
    assert_eq!(state.field("k", &["count"]).as_deref(), Some("3"));
    assert_eq!(state.field("s2", &["id"]).as_deref(), Some("42"));
    assert!(state.field("missing", &["id"]).is_none());
}

#[test]
fn skip_reasons_classify_failure_propagation() {
    assert!(StepStatus::Failed.is_failure());
    assert!(StepStatus::Skipped(SkipReason::DependencyFailed { dependency: "a".into() }).is_failure());
    assert!(!StepStatus::Skipped(SkipReason::ConditionNotMet { step: "a".into() }).is_failure());
    assert!(!StepStatus::Pending.is_terminal());
}

#[test]
fn archive_refuses_running_states() {
    let archive = StateArchive::new(Duration::from_secs(60), 4);
    let mut state = ExecutionState::new(["s1"]);
    state.transition(RunStatus::Running);
    assert!(archive.archive(state).is_none());
    assert!(archive.is_empty());
}

#[test]
fn archive_evicts_oldest_when_full() {
    let archive = StateArchive::new(Duration::from_secs(60), 2);
    archive.archive(finished_state("r1"));
    archive.archive(finished_state("r2"));
    archive.archive(finished_state("r3"));

    assert_eq!(archive.len(), 2);
    assert!(archive.get("r1").is_none());
    assert!(archive.get("r3").is_some());
}

#[test]
fn archive_purges_after_retention() {
    let archive = StateArchive::new(Duration::from_secs(60), 8);
    archive.archive(finished_state("r1"));

    assert_eq!(archive.purge_expired(Utc::now()), 0);
    let later = Utc::now() + chrono::Duration::seconds(120);
    assert_eq!(archive.purge_expired(later), 1);
    assert!(archive.is_empty());
}
