//! Closed-set evaluation of step conditions.
//!
//! A condition inspects the latest result of one earlier step. Steps that
//! never ran (or were skipped) fail every check, so the gated step is skipped.

use tracing::warn;

use crate::error::ConditionError;
use crate::plan::{ConditionCheck, StepCondition};
use crate::state::StepResult;
use crate::value::{is_truthy, lookup_path, response_text, value_to_text};

/// Evaluates `condition` against the referenced step's latest result.
pub fn evaluate(
    condition: &StepCondition,
    target: Option<&StepResult>,
) -> Result<bool, ConditionError> {
    if condition.check.requires_value() && condition.value.is_none() {
        return Err(ConditionError::MissingValue(condition.check));
    }

    let Some(result) = target.filter(|result| !result.was_skipped()) else {
        return Ok(false);
    };

    let path: Vec<&str> = condition
        .field
        .as_deref()
        .map(|field| field.split('.').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let selected = if path.is_empty() {
        None
    } else {
        let found = result
            .output
            .as_ref()
            .and_then(|output| lookup_path(output, &path));
        match found {
            Some(value) => Some(value),
            None => {
                return Err(ConditionError::FieldNotFound {
                    step: result.step_id.clone(),
                    field: path.join("."),
                });
            }
        }
    };

    let expected = condition.value.as_deref().unwrap_or_default();
    let actual = || match selected {
        Some(value) => value_to_text(value),
        None => result.output.as_ref().map(response_text).unwrap_or_default(),
    };
    let outcome = match condition.check {
        ConditionCheck::Truthy => selected.map_or(result.success, is_truthy),
        ConditionCheck::Falsy => !selected.map_or(result.success, is_truthy),
        ConditionCheck::Contains => contains_ignore_case(&actual(), expected),
        ConditionCheck::NotContains => !contains_ignore_case(&actual(), expected),
        ConditionCheck::Equals => actual() == expected,
        ConditionCheck::NotEquals => actual() != expected,
    };
    Ok(outcome)
}

/// Like [`evaluate`], but evaluation errors are logged and read as `false`.
pub fn should_run(condition: &StepCondition, target: Option<&StepResult>) -> bool {
    match evaluate(condition, target) {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(step = %condition.step, check = %condition.check, %error, "condition evaluation failed; treating as false");
            false
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests;
