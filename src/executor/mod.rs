//! Runs validated plans against the tool registry.
//!
//! One [`PlanExecutor`] can drive many runs concurrently; each run owns its
//! own [`ExecutionState`](crate::state::ExecutionState) and nothing else is
//! mutated while it executes.

mod scheduler;
mod types;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::audit::{AuditSink, JsonLinesAuditSink, NoopAuditSink, TracingAuditSink};
use crate::config::Config;
use crate::error::ValidationError;
use crate::plan::{ExecutionPlan, RawPlan};
use crate::retry::RetryPolicy;
use crate::state::StateArchive;
use crate::tools::ToolRegistry;
use crate::validator::{PlanValidator, ValidatedPlan};

use scheduler::Run;

pub use types::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_STEP_TIMEOUT_SECS, ExecutorOptions,
    WorkflowResult,
};

pub struct PlanExecutor {
    registry: Arc<ToolRegistry>,
    validator: PlanValidator,
    retry: RetryPolicy,
    options: ExecutorOptions,
    audit: Arc<dyn AuditSink>,
    archive: Option<Arc<StateArchive>>,
}

impl PlanExecutor {
    /// Executor with default limits that only accepts tools present in `registry`.
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        let validator = PlanValidator::new().with_known_tools(registry.names());
        Self {
            registry,
            validator,
            retry: RetryPolicy::default(),
            options: ExecutorOptions::default(),
            audit: Arc::new(TracingAuditSink),
            archive: None,
        }
    }

    /// Wires limits, retry policy, audit sink and retention from `config`.
    pub fn from_config(registry: Arc<ToolRegistry>, config: &Config) -> Result<Self> {
        let audit: Arc<dyn AuditSink> = match (config.audit.enabled, &config.audit.log_path) {
            (false, _) => Arc::new(NoopAuditSink),
            (true, Some(path)) => Arc::new(JsonLinesAuditSink::open(path)?),
            (true, None) => Arc::new(TracingAuditSink),
        };
        let archive = StateArchive::new(
            config.retention.retention(),
            config.retention.max_archived_runs,
        );

        Ok(Self::new(registry)
            .with_options(config.executor.options())
            .with_retry_policy(config.retry.policy())
            .with_audit_sink(audit)
            .with_archive(Arc::new(archive)))
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_archive(mut self, archive: Arc<StateArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_validator(mut self, validator: PlanValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn archive(&self) -> Option<&Arc<StateArchive>> {
        self.archive.as_ref()
    }

    pub async fn execute(&self, plan: ExecutionPlan) -> Result<WorkflowResult, ValidationError> {
        self.execute_with_cancellation(plan, CancellationToken::new())
            .await
    }

    /// Validates and runs `plan`. Cancelling `cancel` stops new steps from
    /// starting, abandons in-flight tool calls and still yields a result.
    pub async fn execute_with_cancellation(
        &self,
        plan: ExecutionPlan,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, ValidationError> {
        let validated = self.validator.validate(plan)?;
        Ok(self.run(validated, cancel).await)
    }

    /// Like [`execute_with_cancellation`](Self::execute_with_cancellation) for
    /// loose planner output; malformed steps are dropped rather than fatal.
    pub async fn execute_raw(
        &self,
        raw: RawPlan,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, ValidationError> {
        let validated = self.validator.validate_raw(raw)?;
        Ok(self.run(validated, cancel).await)
    }

    #[instrument(skip_all, fields(steps = validated.plan().len()))]
    async fn run(&self, validated: ValidatedPlan, cancel: CancellationToken) -> WorkflowResult {
        let dropped: Vec<String> = validated
            .dropped()
            .iter()
            .map(ToString::to_string)
            .collect();
        let plan = validated.into_plan();
        let run = Run::new(self, &plan);
        info!(execution_id = %run.execution_id(), "starting plan run");

        let (mut result, state) = run.drive(cancel).await;
        result.dropped_steps = dropped;

        if let Some(archive) = &self.archive {
            archive.archive(state);
        }
        result
    }
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("registry", &self.registry)
            .field("retry", &self.retry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
