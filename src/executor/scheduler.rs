//! The per-run scheduling loop.
//!
//! Ready steps are launched as boxed futures into a `FuturesUnordered`.
//! Completions are folded back into the run state one at a time, so the
//! state is only ever touched from the task driving the run.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PlanExecutor, WorkflowResult};
use crate::audit::AuditEvent;
use crate::condition;
use crate::error::{RunError, ToolError};
use crate::plan::{ExecutionPlan, Params, Step};
use crate::state::{ExecutionState, RunStatus, SkipReason, StepResult, StepStatus};
use crate::summary::RunNarrative;
use crate::template::resolve_params;
use crate::tools::ToolInvoker;

/// Outcome of one tool call, reported back to the scheduler.
struct Attempt {
    step_id: String,
    tool: String,
    number: u32,
    input: Params,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    outcome: Result<Value, ToolError>,
}

type InFlight = FuturesUnordered<BoxFuture<'static, Attempt>>;

pub(super) struct Run<'a> {
    executor: &'a PlanExecutor,
    plan: &'a ExecutionPlan,
    state: ExecutionState,
    permits: Arc<Semaphore>,
    started: Instant,
}

impl<'a> Run<'a> {
    pub(super) fn new(executor: &'a PlanExecutor, plan: &'a ExecutionPlan) -> Self {
        let state = ExecutionState::new(plan.steps.iter().map(|step| step.id.clone()));
        let permits = Arc::new(Semaphore::new(executor.options.max_concurrency.max(1)));
        Self {
            executor,
            plan,
            state,
            permits,
            started: Instant::now(),
        }
    }

    pub(super) fn execution_id(&self) -> &str {
        self.state.execution_id()
    }

    pub(super) async fn drive(mut self, cancel: CancellationToken) -> (WorkflowResult, ExecutionState) {
        self.executor.audit.record(&AuditEvent::RunStarted {
            execution_id: self.state.execution_id().to_string(),
            steps: self.plan.len(),
            timestamp: self.state.started_at(),
        });

        let run_timeout = self.executor.options.run_timeout;
        // A budget too large to represent as an instant means the run has no deadline.
        let deadline_at = self.started.checked_add(run_timeout);
        let mut deadline = pin!(tokio::time::sleep_until(deadline_at.unwrap_or(self.started)));
        let mut in_flight = InFlight::new();

        let interruption = loop {
            if cancel.is_cancelled() {
                break Some(RunError::Cancelled);
            }
            self.schedule_ready(&mut in_flight);
            if in_flight.is_empty() {
                break None;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(RunError::Cancelled),
                _ = deadline.as_mut(), if deadline_at.is_some() => break Some(RunError::TimedOut(run_timeout)),
                Some(attempt) = in_flight.next() => self.handle_attempt(attempt, &mut in_flight),
            }
        };

        // Dropping unfinished attempts abandons their tool calls.
        drop(in_flight);
        self.finish(interruption)
    }

    /// Starts or skips every pending step whose prerequisites are terminal,
    /// repeating until a pass changes nothing.
    fn schedule_ready(&mut self, in_flight: &mut InFlight) {
        let plan = self.plan;
        loop {
            let mut progressed = false;
            for step in &plan.steps {
                if self.state.step_status(&step.id) != Some(&StepStatus::Pending) {
                    continue;
                }
                let ready = step
                    .prerequisites()
                    .into_iter()
                    .all(|id| self.state.step_status(id).is_some_and(StepStatus::is_terminal));
                if !ready {
                    continue;
                }

                progressed = true;
                match self.blocking_reason(step) {
                    Some(reason) => self.skip(step, reason),
                    None => self.start(step, in_flight),
                }
            }
            if !progressed {
                break;
            }
        }
    }

    /// A failed dependency blocks the step unless the step's condition
    /// inspects that dependency itself.
    fn blocking_reason(&self, step: &Step) -> Option<SkipReason> {
        for dependency in &step.depends_on {
            let failed = self
                .state
                .step_status(dependency)
                .is_some_and(StepStatus::is_failure);
            if failed && !step.conditions_on(dependency) {
                return Some(SkipReason::DependencyFailed {
                    dependency: dependency.clone(),
                });
            }
        }

        let condition = step.condition.as_ref()?;
        if condition::should_run(condition, self.state.latest_result(&condition.step)) {
            None
        } else {
            Some(SkipReason::ConditionNotMet {
                step: condition.step.clone(),
            })
        }
    }

    fn start(&mut self, step: &Step, in_flight: &mut InFlight) {
        let resolution = resolve_params(&step.params, &self.state);
        if self.state.status() == RunStatus::Initialized {
            self.state.transition(RunStatus::Running);
        }
        self.state.set_step_status(&step.id, StepStatus::Running);
        debug!(
            step_id = %step.id,
            tool = %step.tool,
            unresolved = resolution.unresolved.len(),
            "starting step"
        );
        in_flight.push(self.launch(step, resolution.params, 1, Duration::ZERO));
    }

    fn skip(&mut self, step: &Step, reason: SkipReason) {
        info!(step_id = %step.id, reason = %reason, "skipping step");
        self.record(StepResult::skipped(
            step.id.clone(),
            step.tool.clone(),
            step.params.clone(),
            reason.clone(),
        ));
        self.state.set_step_status(&step.id, StepStatus::Skipped(reason));
    }

    /// Builds the future for one attempt: optional backoff, then a
    /// concurrency permit held only for the duration of the call.
    fn launch(&self, step: &Step, input: Params, number: u32, delay: Duration) -> BoxFuture<'static, Attempt> {
        let registry = Arc::clone(&self.executor.registry);
        let permits = Arc::clone(&self.permits);
        let timeout = step
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.executor.options.step_timeout);
        let step_id = step.id.clone();
        let tool = step.tool.clone();

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let (outcome, started_at, elapsed) = match permits.acquire_owned().await {
                Ok(_permit) => {
                    let started_at = Utc::now();
                    let clock = Instant::now();
                    let outcome = registry.invoke(&tool, input.clone(), timeout).await;
                    (outcome, started_at, clock.elapsed())
                }
                Err(_) => (Err(ToolError::Cancelled), Utc::now(), Duration::ZERO),
            };
            Attempt {
                step_id,
                tool,
                number,
                input,
                started_at,
                duration_ms: elapsed.as_millis() as u64,
                outcome,
            }
        }
        .boxed()
    }

    fn handle_attempt(&mut self, attempt: Attempt, in_flight: &mut InFlight) {
        let plan = self.plan;
        let Some(step) = plan.step(&attempt.step_id) else {
            warn!(step_id = %attempt.step_id, "discarding attempt for unknown step");
            return;
        };
        let Attempt {
            step_id,
            tool,
            number,
            input,
            started_at,
            duration_ms,
            outcome,
        } = attempt;

        let mut result = StepResult {
            step_id,
            tool,
            input: input.clone(),
            output: None,
            success: false,
            error: None,
            timestamp: started_at,
            attempt: number,
            duration_ms,
            skipped: None,
        };

        match outcome {
            Ok(output) => {
                debug!(step_id = %step.id, attempt = number, duration_ms, "step succeeded");
                if let Some(key) = &step.output_key {
                    self.state.bind_output(key, &step.id, &output);
                }
                result.output = Some(output);
                result.success = true;
                self.record(result);
                self.state.set_step_status(&step.id, StepStatus::Succeeded);
            }
            Err(error) => {
                let message = error.to_string();
                result.error = Some(message.clone());
                self.record(result);

                match self.executor.retry.next_delay(number, &error) {
                    Some(delay) => {
                        warn!(
                            step_id = %step.id,
                            attempt = number,
                            delay_ms = delay.as_millis() as u64,
                            error = %message,
                            "retrying step"
                        );
                        self.state.record_retry();
                        in_flight.push(self.launch(step, input, number + 1, delay));
                    }
                    None => {
                        warn!(step_id = %step.id, attempt = number, error = %message, "step failed");
                        self.state.set_step_status(&step.id, StepStatus::Failed);
                        self.state.record_error(
                            RunError::StepFailed {
                                step: step.id.clone(),
                                message,
                            }
                            .to_string(),
                        );
                        self.state.transition(RunStatus::Error);
                    }
                }
            }
        }
    }

    fn record(&mut self, result: StepResult) {
        let description = self.executor.registry.describe(&result);
        self.executor.audit.record(&AuditEvent::step_attempt(
            self.state.execution_id(),
            &result,
            description,
        ));
        self.state.record(result);
    }

    fn finish(mut self, interruption: Option<RunError>) -> (WorkflowResult, ExecutionState) {
        let plan = self.plan;
        let mut run_errors = Vec::new();

        if let Some(error) = interruption {
            warn!(error = %error, "run interrupted");
            let reason = match error {
                RunError::Cancelled => SkipReason::Cancelled,
                _ => SkipReason::RunTimedOut,
            };
            for step in &plan.steps {
                let terminal = self
                    .state
                    .step_status(&step.id)
                    .is_some_and(StepStatus::is_terminal);
                if !terminal {
                    self.skip(step, reason.clone());
                }
            }
            run_errors.push(error);
        }

        let stalled: Vec<String> = plan
            .steps
            .iter()
            .filter(|step| self.state.step_status(&step.id) == Some(&StepStatus::Pending))
            .map(|step| step.id.clone())
            .collect();
        if !stalled.is_empty() {
            warn!(steps = ?stalled, "schedule stalled");
            for id in &stalled {
                self.state.set_step_status(id, StepStatus::Failed);
            }
            run_errors.push(RunError::Stalled(stalled));
        }

        for error in &run_errors {
            self.state.record_error(error.to_string());
        }

        let failed = !run_errors.is_empty() || self.state.count_status(StepStatus::is_failure) > 0;
        if failed {
            self.state.transition(RunStatus::Failed);
        } else {
            self.state.transition(RunStatus::Running);
            self.state.transition(RunStatus::Completed);
        }

        let final_output = plan.steps.iter().rev().find_map(|step| {
            let latest = self.state.latest_result(&step.id)?;
            if latest.success {
                latest.output.clone()
            } else {
                None
            }
        });

        let human_readable_summary =
            RunNarrative::build(plan, &self.state, self.executor.registry.as_ref())
                .with_run_errors(run_errors.iter().map(ToString::to_string))
                .to_string();

        let status = self.state.status();
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let succeeded = self
            .state
            .count_status(|status| matches!(status, StepStatus::Succeeded));
        let failed_steps = self
            .state
            .count_status(|status| matches!(status, StepStatus::Failed));
        let skipped = self
            .state
            .count_status(|status| matches!(status, StepStatus::Skipped(_)));

        self.executor.audit.record(&AuditEvent::RunCompleted {
            execution_id: self.state.execution_id().to_string(),
            status,
            success: status == RunStatus::Completed,
            total_steps: plan.len(),
            succeeded,
            failed: failed_steps,
            skipped,
            total_retries: self.state.total_retries(),
            errors: self.state.errors().to_vec(),
            duration_ms,
            summary: human_readable_summary.clone(),
            timestamp: Utc::now(),
        });
        info!(
            execution_id = %self.state.execution_id(),
            %status,
            succeeded,
            failed = failed_steps,
            skipped,
            duration_ms,
            "plan run finished"
        );

        let result = WorkflowResult {
            execution_id: self.state.execution_id().to_string(),
            success: status == RunStatus::Completed,
            status,
            steps: self.state.results().to_vec(),
            final_output,
            outputs: self.state.outputs().clone(),
            human_readable_summary,
            errors: self.state.errors().to_vec(),
            dropped_steps: Vec::new(),
            total_retries: self.state.total_retries(),
            duration_ms,
        };
        (result, self.state)
    }
}
