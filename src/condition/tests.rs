use chrono::Utc;
use serde_json::{Value, json};

use crate::error::ConditionError;
use crate::plan::{ConditionCheck, Params, StepCondition};
use crate::state::{SkipReason, StepResult};

use super::{evaluate, should_run};

fn result(output: Option<Value>, success: bool) -> StepResult {
    StepResult {
        step_id: "s1".to_string(),
        tool: "lookup".to_string(),
        input: Params::new(),
        output,
        success,
        error: None,
        timestamp: Utc::now(),
        attempt: 1,
        duration_ms: 1,
        skipped: None,
    }
}

fn check(check: ConditionCheck) -> StepCondition {
    StepCondition::new("s1", check)
}

#[test]
fn contains_is_case_insensitive() {
    let target = result(Some(json!({"response": "Order SHIPPED today"})), true);
    let condition = check(ConditionCheck::Contains).with_value("shipped");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(true));

    let condition = check(ConditionCheck::NotContains).with_value("shipped");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(false));
}

#[test]
fn equals_is_exact() {
    let target = result(Some(json!({"status": "Open"})), true);
    let condition = check(ConditionCheck::Equals).with_field("status").with_value("Open");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(true));

    let condition = check(ConditionCheck::Equals).with_field("status").with_value("open");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(false));

    let condition = check(ConditionCheck::NotEquals).with_field("status").with_value("open");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(true));
}

#[test]
fn truthy_uses_success_flag_without_field() {
    let ok = result(Some(json!("done")), true);
    let failed = result(None, false);
    assert_eq!(evaluate(&check(ConditionCheck::Truthy), Some(&ok)), Ok(true));
    assert_eq!(evaluate(&check(ConditionCheck::Truthy), Some(&failed)), Ok(false));
    assert_eq!(evaluate(&check(ConditionCheck::Falsy), Some(&failed)), Ok(true));
}

#[test]
fn truthy_reads_boolean_fields() {
    let target = result(Some(json!({"in_stock": false, "count": 2})), true);
    let condition = check(ConditionCheck::Truthy).with_field("in_stock");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(false));
    let condition = check(ConditionCheck::Falsy).with_field("in_stock");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(true));
    let condition = check(ConditionCheck::Truthy).with_field("count");
    assert_eq!(evaluate(&condition, Some(&target)), Ok(true));
}

#[test]
fn steps_that_never_ran_fail_every_check() {
    assert_eq!(evaluate(&check(ConditionCheck::Truthy), None), Ok(false));
    assert_eq!(evaluate(&check(ConditionCheck::Falsy), None), Ok(false));

    let skipped = StepResult::skipped(
        "s1",
        "lookup",
        Params::new(),
        SkipReason::ConditionNotMet { step: "s0".to_string() },
    );
    let condition = check(ConditionCheck::NotContains).with_value("x");
    assert_eq!(evaluate(&condition, Some(&skipped)), Ok(false));
}

#[test]
fn failed_results_are_still_inspected() {
    let partial = result(Some(json!({"response": "rate limit exceeded"})), false);
    let condition = check(ConditionCheck::Contains).with_value("RATE LIMIT");
    assert!(should_run(&condition, Some(&partial)));
}

#[test]
fn evaluation_errors_read_as_false() {
    let target = result(Some(json!({"status": "ok"})), true);

    let missing_value = check(ConditionCheck::Equals);
    assert_eq!(
        evaluate(&missing_value, Some(&target)),
        Err(ConditionError::MissingValue(ConditionCheck::Equals))
    );
    assert!(!should_run(&missing_value, Some(&target)));

    let missing_field = check(ConditionCheck::Truthy).with_field("tracking.number");
    assert!(matches!(
        evaluate(&missing_field, Some(&target)),
        Err(ConditionError::FieldNotFound { field, .. }) if field == "tracking.number"
    ));
    assert!(!should_run(&missing_field, Some(&target)));
}
