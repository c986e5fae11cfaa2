//! Declarative plan model and raw planner-output parsing.

mod parsing;
mod types;

pub use parsing::{RawPlan, extract_json_object, parse_plan_text};
pub use types::{ConditionCheck, ExecutionPlan, Params, Step, StepCondition};
