use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use faxbridge::plan::Params;
use faxbridge::state::{RunStatus, SkipReason};
use faxbridge::tools::{ToolRegistryBuilder, handler_fn};
use faxbridge::{
    ConditionCheck, ExecutionPlan, ExecutorOptions, PlanExecutor, RetryPolicy, Step, StepCondition,
    ToolError, ToolRegistry,
};

fn counting<F>(calls: &Arc<AtomicU32>, outcome: F) -> impl faxbridge::ToolHandler + 'static
where
    F: Fn(Params) -> Result<Value, ToolError> + Send + Sync + 'static,
{
    let calls = Arc::clone(calls);
    let outcome = Arc::new(outcome);
    handler_fn(move |params: Params| {
        let calls = Arc::clone(&calls);
        let outcome = Arc::clone(&outcome);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            outcome(params)
        }
    })
}

fn executor(builder: ToolRegistryBuilder) -> PlanExecutor {
    PlanExecutor::new(Arc::new(builder.build()))
}

#[tokio::test(start_paused = true)]
async fn retryable_failure_uses_whole_budget_with_backoff() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = executor(ToolRegistry::builder().register(
        "fax",
        "send_fax",
        counting(&calls, |_| Err(ToolError::failed("503 Service Unavailable"))),
    ));
    let policy = RetryPolicy::default();
    assert_eq!(executor.retry_policy(), &policy);

    let started = Instant::now();
    let result = executor
        .execute(ExecutionPlan::new(vec![Step::new("send", "send_fax")]))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
    assert_eq!(result.attempts("send"), 4);
    assert_eq!(result.total_retries, 3);
    let numbers: Vec<u32> = result.steps.iter().map(|step| step.attempt).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(result.status, RunStatus::Failed);
    assert!(!result.success);
    // 1s + 2s + 4s of backoff between the four attempts.
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test]
async fn non_retryable_failure_is_attempted_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = executor(ToolRegistry::builder().register(
        "crm",
        "update_contact",
        counting(&calls, |_| Err(ToolError::failed("validation error: email is required"))),
    ));

    let result = executor
        .execute(ExecutionPlan::new(vec![Step::new("update", "update_contact")]))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.attempts("update"), 1);
    assert_eq!(result.total_retries, 0);
    assert!(!result.success);
}

#[tokio::test]
async fn truthy_condition_on_failed_step_skips_without_invoking() {
    let a_calls = Arc::new(AtomicU32::new(0));
    let b_calls = Arc::new(AtomicU32::new(0));
    let executor = executor(
        ToolRegistry::builder()
            .register(
                "fax",
                "receive_fax",
                counting(&a_calls, |_| Err(ToolError::non_retryable("line busy"))),
            )
            .register("email", "send_email", counting(&b_calls, |_| Ok(json!({})))),
    );

    let plan = ExecutionPlan::new(vec![
        Step::new("A", "receive_fax"),
        Step::new("B", "send_email")
            .depends_on(["A"])
            .with_condition(StepCondition::new("A", ConditionCheck::Truthy)),
    ]);
    let result = executor.execute(plan).await.unwrap();

    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    let b = result.step("B").unwrap();
    assert!(b.was_skipped());
    assert_eq!(b.attempt, 0);
    assert_eq!(
        b.skipped,
        Some(SkipReason::ConditionNotMet {
            step: "A".to_string()
        })
    );
}

#[tokio::test]
async fn output_field_flows_into_dependent_params() {
    let calls = Arc::new(AtomicU32::new(0));
    let sent: Arc<Mutex<Option<Params>>> = Arc::new(Mutex::new(None));
    let capture = Arc::clone(&sent);
    let executor = executor(
        ToolRegistry::builder()
            .register(
                "crm",
                "lookup",
                counting(&calls, |_| Ok(json!({"email": "a@b.com"}))),
            )
            .register(
                "email",
                "send",
                counting(&calls, move |params| {
                    *capture.lock().unwrap() = Some(params);
                    Ok(json!({"status": "sent"}))
                }),
            ),
    );

    let plan = ExecutionPlan::new(vec![
        Step::new("s1", "lookup").with_output_key("c"),
        Step::new("s2", "send")
            .with_param("to", "{c.email}")
            .depends_on(["s1"]),
    ]);
    let result = executor.execute(plan).await.unwrap();

    assert!(result.success);
    let params = sent.lock().unwrap().clone().unwrap();
    assert_eq!(params["to"], "a@b.com");
    assert_eq!(result.step("s2").unwrap().input["to"], "a@b.com");
}

#[tokio::test]
async fn independent_branches_both_finish_when_one_fails() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = executor(
        ToolRegistry::builder()
            .register(
                "fax",
                "send_fax",
                counting(&calls, |_| Err(ToolError::non_retryable("invalid number"))),
            )
            .register(
                "storage",
                "archive",
                counting(&calls, |_| Ok(json!({"location": "s3://faxes/1.pdf"}))),
            ),
    );

    let plan = ExecutionPlan::new(vec![
        Step::new("store", "archive"),
        Step::new("send", "send_fax"),
    ]);
    let result = executor.execute(plan).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!result.success);
    assert!(result.step("store").unwrap().success);
    assert_eq!(
        result.final_output,
        Some(json!({"location": "s3://faxes/1.pdf"}))
    );
    assert!(result.human_readable_summary.contains("Failed actions:"));
}

#[tokio::test]
async fn steps_never_start_before_dependencies_finish() {
    let trace: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&trace);
    let handler = handler_fn(move |params: Params| {
        let log = Arc::clone(&log);
        async move {
            let id = params["id"].as_str().unwrap_or_default().to_string();
            log.lock().unwrap().push(format!("start:{id}"));
            let delay = params["delay"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            log.lock().unwrap().push(format!("end:{id}"));
            Ok(json!({"id": id}))
        }
    });
    let executor = executor(ToolRegistry::builder().register("util", "work", handler));

    let step = |id: &str, delay: u64| {
        Step::new(id, "work")
            .with_param("id", id)
            .with_param("delay", delay)
    };
    let plan = ExecutionPlan::new(vec![
        step("d", 1).depends_on(["b", "c"]),
        step("a", 20),
        step("b", 5).depends_on(["a"]),
        step("c", 15).depends_on(["a"]),
        step("e", 2),
    ]);
    let result = executor.execute(plan.clone()).await.unwrap();
    assert!(result.success);

    let trace = trace.lock().unwrap().clone();
    let position = |event: String| trace.iter().position(|entry| *entry == event).unwrap();
    for step in &plan.steps {
        let started = position(format!("start:{}", step.id));
        for dependency in &step.depends_on {
            assert!(
                position(format!("end:{dependency}")) < started,
                "{} started before {dependency} finished: {trace:?}",
                step.id
            );
        }
    }
}

#[tokio::test]
async fn concurrent_tool_calls_respect_the_bound() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (active_in, peak_in) = (Arc::clone(&active), Arc::clone(&peak));
    let handler = handler_fn(move |_params: Params| {
        let active = Arc::clone(&active_in);
        let peak = Arc::clone(&peak_in);
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({}))
        }
    });
    let executor = executor(ToolRegistry::builder().register("util", "work", handler))
        .with_options(ExecutorOptions {
            max_concurrency: 2,
            ..ExecutorOptions::default()
        });

    let plan = ExecutionPlan::new(
        (0..6)
            .map(|index| Step::new(format!("s{index}"), "work"))
            .collect(),
    );
    let result = executor.execute(plan).await.unwrap();

    assert!(result.success);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

/// Flags when a handler's future is dropped before completing.
struct AbandonFlag(Arc<AtomicBool>, bool);

impl Drop for AbandonFlag {
    fn drop(&mut self) {
        if !self.1 {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

fn registry_with_blocking_tool(abandoned: &Arc<AtomicBool>) -> ToolRegistryBuilder {
    let flag = Arc::clone(abandoned);
    ToolRegistry::builder()
        .register(
            "crm",
            "lookup",
            handler_fn(|_p: Params| async move { Ok(json!({"name": "Ada"})) }),
        )
        .register(
            "fax",
            "wait_for_fax",
            handler_fn(move |_p: Params| {
                let flag = Arc::clone(&flag);
                async move {
                    let mut guard = AbandonFlag(flag, false);
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    guard.1 = true;
                    Ok(json!({}))
                }
            }),
        )
}

fn blocking_plan() -> ExecutionPlan {
    ExecutionPlan::new(vec![
        Step::new("lookup", "lookup"),
        Step::new("wait", "wait_for_fax").depends_on(["lookup"]),
        Step::new("reply", "lookup").depends_on(["wait"]),
    ])
}

#[tokio::test(start_paused = true)]
async fn cancellation_preserves_completed_results() {
    let abandoned = Arc::new(AtomicBool::new(false));
    let executor = executor(registry_with_blocking_tool(&abandoned)).with_options(ExecutorOptions {
        step_timeout: Duration::from_secs(7_200),
        ..ExecutorOptions::default()
    });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let result = executor
        .execute_with_cancellation(blocking_plan(), cancel)
        .await
        .unwrap();

    assert!(abandoned.load(Ordering::SeqCst));
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.step("lookup").unwrap().success);
    assert_eq!(result.step("wait").unwrap().skipped, Some(SkipReason::Cancelled));
    assert_eq!(result.step("reply").unwrap().skipped, Some(SkipReason::Cancelled));
    assert_eq!(result.errors, vec!["Run cancelled by caller".to_string()]);
    assert!(result.human_readable_summary.ends_with("Run cancelled by caller"));
}

#[tokio::test(start_paused = true)]
async fn run_budget_forces_failure() {
    let abandoned = Arc::new(AtomicBool::new(false));
    let executor = executor(registry_with_blocking_tool(&abandoned)).with_options(ExecutorOptions {
        step_timeout: Duration::from_secs(7_200),
        run_timeout: Duration::from_secs(60),
        ..ExecutorOptions::default()
    });

    let started = Instant::now();
    let result = executor.execute(blocking_plan()).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(61));
    assert!(abandoned.load(Ordering::SeqCst));
    assert!(!result.success);
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.step("wait").unwrap().skipped, Some(SkipReason::RunTimedOut));
    assert_eq!(
        result.errors,
        vec!["Run exceeded its overall budget of 60000ms".to_string()]
    );
}
