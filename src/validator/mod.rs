//! Validation of planner output before anything runs.
//!
//! Raw steps missing `id`, `tool` or `params` are dropped and reported. The
//! remaining steps must then form a well-formed DAG: unique ids, unique output
//! keys, resolvable dependencies and condition targets, known tools, no cycles.

mod types;

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

use crate::error::ValidationError;
use crate::plan::{ConditionCheck, ExecutionPlan, Params, RawPlan, Step, StepCondition};
use crate::value::value_to_text;

pub use types::{DroppedStep, ValidatedPlan};

#[derive(Debug, Clone, Default)]
pub struct PlanValidator {
    known_tools: Option<HashSet<String>>,
}

impl PlanValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts plans to the given tool names.
    pub fn with_known_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Validates loose planner output, dropping steps that lack required fields.
    pub fn validate_raw(&self, raw: RawPlan) -> Result<ValidatedPlan, ValidationError> {
        if raw.steps.is_empty() {
            return Err(ValidationError::EmptyPlan);
        }

        let mut steps = Vec::with_capacity(raw.steps.len());
        let mut dropped = Vec::new();
        for (index, value) in raw.steps.iter().enumerate() {
            match step_from_value(index, value) {
                Ok(step) => steps.push(step),
                Err(step) => {
                    warn!(index, id = ?step.id, reason = %step.reason, "dropping malformed plan step");
                    dropped.push(step);
                }
            }
        }

        if steps.is_empty() {
            return Err(ValidationError::NoExecutableSteps {
                dropped: dropped.len(),
            });
        }

        let plan = ExecutionPlan {
            steps,
            summary: raw.summary,
        };
        self.check_structure(&plan)?;
        Ok(ValidatedPlan::new(plan, dropped))
    }

    /// Validates an already-typed plan.
    pub fn validate(&self, plan: ExecutionPlan) -> Result<ValidatedPlan, ValidationError> {
        if plan.is_empty() {
            return Err(ValidationError::EmptyPlan);
        }

        let total = plan.steps.len();
        let ExecutionPlan { steps, summary } = plan;
        let mut kept = Vec::with_capacity(total);
        let mut dropped = Vec::new();
        for (index, mut step) in steps.into_iter().enumerate() {
            let mut missing = Vec::new();
            if step.id.trim().is_empty() {
                missing.push("id");
            }
            if step.tool.trim().is_empty() {
                missing.push("tool");
            }
            if missing.is_empty() {
                dedupe(&mut step.depends_on);
                kept.push(step);
            } else {
                let entry = DroppedStep {
                    index,
                    id: Some(step.id).filter(|id| !id.trim().is_empty()),
                    reason: format!("missing {}", missing.join(", ")),
                };
                warn!(index, reason = %entry.reason, "dropping malformed plan step");
                dropped.push(entry);
            }
        }

        if kept.is_empty() {
            return Err(ValidationError::NoExecutableSteps {
                dropped: dropped.len(),
            });
        }

        let plan = ExecutionPlan {
            steps: kept,
            summary,
        };
        self.check_structure(&plan)?;
        Ok(ValidatedPlan::new(plan, dropped))
    }

    fn check_structure(&self, plan: &ExecutionPlan) -> Result<(), ValidationError> {
        let mut ids = HashSet::new();
        for step in &plan.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(ValidationError::DuplicateStepId(step.id.clone()));
            }
        }

        let mut output_keys: HashMap<&str, &str> = HashMap::new();
        for step in &plan.steps {
            if let Some(key) = step.output_key.as_deref() {
                if let Some(first) = output_keys.insert(key, step.id.as_str()) {
                    return Err(ValidationError::DuplicateOutputKey {
                        key: key.to_string(),
                        first: first.to_string(),
                        second: step.id.clone(),
                    });
                }
            }
        }

        if let Some(known) = &self.known_tools {
            if let Some(step) = plan.steps.iter().find(|step| !known.contains(&step.tool)) {
                return Err(ValidationError::UnknownTool {
                    step: step.id.clone(),
                    tool: step.tool.clone(),
                });
            }
        }

        for step in &plan.steps {
            if let Some(dependency) = step.depends_on.iter().find(|dep| !ids.contains(dep.as_str())) {
                return Err(ValidationError::MissingDependency {
                    step: step.id.clone(),
                    dependency: dependency.clone(),
                });
            }
            if let Some(condition) = &step.condition {
                if !ids.contains(condition.step.as_str()) {
                    return Err(ValidationError::UnknownConditionStep {
                        step: step.id.clone(),
                        target: condition.step.clone(),
                    });
                }
            }
        }

        match find_cycle(plan) {
            Some(cycle) => Err(ValidationError::DependencyCycle(cycle)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search over step prerequisites; returns the first cycle found
/// as a closed path (`a -> b -> a`).
fn find_cycle(plan: &ExecutionPlan) -> Option<Vec<String>> {
    let edges: HashMap<&str, Vec<&str>> = plan
        .steps
        .iter()
        .map(|step| (step.id.as_str(), step.prerequisites()))
        .collect();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(node) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|id| *id == node).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|id| id.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(node, Mark::Visiting);
        stack.push(node);
        for next in edges.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(*next, edges, marks, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    plan.steps
        .iter()
        .find_map(|step| visit(step.id.as_str(), &edges, &mut marks, &mut stack))
}

fn dedupe(ids: &mut Vec<String>) {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
}

fn step_from_value(index: usize, value: &Value) -> Result<Step, DroppedStep> {
    let Some(map) = value.as_object() else {
        return Err(DroppedStep {
            index,
            id: None,
            reason: "step is not an object".to_string(),
        });
    };

    let id = map.get("id").and_then(scalar_text).filter(|id| !id.trim().is_empty());
    let tool = map
        .get("tool")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|tool| !tool.is_empty())
        .map(str::to_string);
    let params = map.get("params").and_then(Value::as_object).cloned();

    let mut missing = Vec::new();
    if id.is_none() {
        missing.push("id");
    }
    if tool.is_none() {
        missing.push("tool");
    }
    if params.is_none() {
        missing.push("params");
    }
    let (Some(id), Some(tool), Some(params)) = (id.clone(), tool, params) else {
        return Err(DroppedStep {
            index,
            id,
            reason: format!("missing {}", missing.join(", ")),
        });
    };

    let condition = match field(map, "condition", "condition") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(condition_from_value(raw).map_err(|reason| DroppedStep {
            index,
            id: Some(id.clone()),
            reason,
        })?),
    };

    let mut depends_on = match field(map, "dependsOn", "depends_on") {
        Some(Value::String(single)) => vec![single.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        _ => Vec::new(),
    };
    dedupe(&mut depends_on);

    Ok(Step {
        id,
        tool,
        params,
        description: map
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        depends_on,
        condition,
        output_key: field(map, "outputKey", "output_key")
            .and_then(Value::as_str)
            .filter(|key| !key.trim().is_empty())
            .map(str::to_string),
        timeout_ms: field(map, "timeoutMs", "timeout_ms").and_then(Value::as_u64),
    })
}

fn condition_from_value(value: &Value) -> Result<StepCondition, String> {
    let map = value
        .as_object()
        .ok_or_else(|| "condition is not an object".to_string())?;
    let step = map
        .get("step")
        .and_then(scalar_text)
        .ok_or_else(|| "condition is missing 'step'".to_string())?;
    let check = map
        .get("check")
        .and_then(Value::as_str)
        .ok_or_else(|| "condition is missing 'check'".to_string())?
        .parse::<ConditionCheck>()?;

    Ok(StepCondition {
        step,
        check,
        value: map.get("value").filter(|v| !v.is_null()).map(value_to_text),
        field: map
            .get("field")
            .and_then(Value::as_str)
            .filter(|field| !field.trim().is_empty())
            .map(str::to_string),
    })
}

fn field<'a>(map: &'a Params, camel: &str, snake: &str) -> Option<&'a Value> {
    map.get(camel).or_else(|| map.get(snake))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
