use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed step parameters. String values may carry `{key}` placeholders.
pub type Params = Map<String, Value>;

/// An ordered, immutable list of steps produced by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One named tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub tool: String,
    pub params: Params,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "depends_on")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<StepCondition>,
    #[serde(default, alias = "output_key", skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
    /// Overrides the configured per-call timeout.
    #[serde(default, alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Step {
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            params: Params::new(),
            description: String::new(),
            depends_on: Vec::new(),
            condition: None,
            output_key: None,
            timeout_ms: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Steps that must be terminal before this one is considered: the
    /// declared dependencies plus the condition target, without duplicates.
    pub fn prerequisites(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(self.depends_on.len() + 1);
        let condition_target = self.condition.as_ref().map(|c| c.step.as_str());
        for id in self.depends_on.iter().map(String::as_str).chain(condition_target) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Whether the step's condition explicitly inspects `step_id`.
    pub fn conditions_on(&self, step_id: &str) -> bool {
        self.condition
            .as_ref()
            .is_some_and(|condition| condition.step == step_id)
    }
}

/// Gate evaluated against an earlier step's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCondition {
    pub step: String,
    pub check: ConditionCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl StepCondition {
    pub fn new(step: impl Into<String>, check: ConditionCheck) -> Self {
        Self {
            step: step.into(),
            check,
            value: None,
            field: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCheck {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    Truthy,
    Falsy,
}

impl ConditionCheck {
    pub fn requires_value(self) -> bool {
        !matches!(self, ConditionCheck::Truthy | ConditionCheck::Falsy)
    }
}

impl fmt::Display for ConditionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConditionCheck::Contains => "contains",
            ConditionCheck::NotContains => "not_contains",
            ConditionCheck::Equals => "equals",
            ConditionCheck::NotEquals => "not_equals",
            ConditionCheck::Truthy => "truthy",
            ConditionCheck::Falsy => "falsy",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for ConditionCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "contains" => Ok(ConditionCheck::Contains),
            "not_contains" => Ok(ConditionCheck::NotContains),
            "equals" => Ok(ConditionCheck::Equals),
            "not_equals" => Ok(ConditionCheck::NotEquals),
            "truthy" => Ok(ConditionCheck::Truthy),
            "falsy" => Ok(ConditionCheck::Falsy),
            other => Err(format!("Unknown condition check '{other}'")),
        }
    }
}
