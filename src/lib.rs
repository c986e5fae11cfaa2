//! Execution engine for planner-produced, multi-step tool plans.
//!
//! A plan is a DAG of tool calls. [`PlanExecutor`] validates it, runs
//! independent branches concurrently under a bounded worker budget, retries
//! transient failures with exponential backoff, and always returns a
//! [`WorkflowResult`] describing what succeeded, failed or was skipped.

pub mod audit;
pub mod condition;
pub mod config;
pub mod error;
pub mod executor;
pub mod plan;
pub mod retry;
pub mod state;
pub mod summary;
pub mod template;
pub mod tools;
pub mod validator;
pub mod value;

pub use error::{ConditionError, RunError, ToolError, ValidationError};
pub use executor::{ExecutorOptions, PlanExecutor, WorkflowResult};
pub use plan::{ConditionCheck, ExecutionPlan, Step, StepCondition};
pub use retry::RetryPolicy;
pub use tools::{ToolHandler, ToolInvoker, ToolRegistry};
