use std::fmt;

use crate::plan::ExecutionPlan;

/// A plan that passed validation, plus the steps that were discarded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    plan: ExecutionPlan,
    dropped: Vec<DroppedStep>,
}

impl ValidatedPlan {
    pub(super) fn new(plan: ExecutionPlan, dropped: Vec<DroppedStep>) -> Self {
        Self { plan, dropped }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn dropped(&self) -> &[DroppedStep] {
        &self.dropped
    }

    pub fn into_plan(self) -> ExecutionPlan {
        self.plan
    }
}

/// Information about a raw step that failed the field-presence checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedStep {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

impl fmt::Display for DroppedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "step #{} ('{}'): {}", self.index + 1, id, self.reason),
            None => write!(f, "step #{}: {}", self.index + 1, self.reason),
        }
    }
}
