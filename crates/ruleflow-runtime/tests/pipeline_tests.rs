//! Pipeline execution: ordering, policies, retries, timeouts and step semantics

mod common;

use common::{
    record, BrokenSink, FlakySource, OrderSink, ScriptedEvaluator, SlowSource, StrictSink,
};
use ruleflow_core::{
    AccumulativeConfig, Configuration, CoreError, ErrorHandling, ExecutionMode, GroupOperator,
    PipelineDefinition, PipelineStep, RetryPolicy, Rule, RuleChain, RuleGroup, StepType,
    TransformOperation, Value,
};
use ruleflow_runtime::{MemorySink, MemorySource, PipelineExecutor, RuntimeError, StepState};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

fn applicants() -> Vec<Value> {
    vec![
        record(&[("name", Value::from("ada")), ("adult", Value::Bool(true))]),
        record(&[("name", Value::from("bob")), ("adult", Value::Bool(false))]),
        record(&[("name", Value::from("cy")), ("adult", Value::Bool(true))]),
    ]
}

fn adult_config() -> Configuration {
    Configuration::new()
        .with_rule(Rule::new("is-adult", "Is adult", "adult"))
        .with_rule_group(RuleGroup::new("adults", "Adults", GroupOperator::And).add_rule("is-adult"))
}

fn executor(config: Configuration) -> PipelineExecutor {
    PipelineExecutor::new(Arc::new(config), ScriptedEvaluator::new().into_shared())
}

fn filter_adults() -> TransformOperation {
    TransformOperation::RuleGroup {
        group: "adults".to_string(),
        filter: true,
        result_field: "rule_result".to_string(),
    }
}

fn names(value: Option<&Value>) -> Vec<String> {
    value
        .map(Value::records)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

// =============================================================================
// Validation and ordering
// =============================================================================

#[tokio::test]
async fn test_unknown_dependency_fails_before_execution() {
    let source = Arc::new(FlakySource::new(0, applicants()));
    let pipeline = PipelineDefinition::new("broken")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::load("load", "out").depends_on("enrich"));

    let err = executor(Configuration::new())
        .with_source("people", source.clone())
        .with_sink("out", Arc::new(MemorySink::new()))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::Validation(CoreError::UnknownDependency { ref dependency, .. }) if dependency == "enrich"
    ));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_extract_filter_load() {
    let sink = Arc::new(MemorySink::new());
    let pipeline = PipelineDefinition::new("adults")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::transform("filter", filter_adults()).depends_on("extract"))
        .add_step(
            PipelineStep::load("load", "out")
                .with_operation("insert")
                .depends_on("filter"),
        );

    let result = executor(adult_config())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("out", sink.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(result.successful_steps, 3);
    assert_eq!(names(result.output("filter")), vec!["ada", "cy"]);
    assert_eq!(sink.len(), 2);
    assert_eq!(sink.operations(), vec!["insert", "insert"]);
    assert_eq!(result.step("filter").map(|s| s.step_type), Some(StepType::Transform));
}

#[tokio::test]
async fn test_execution_log_is_ordered() {
    let pipeline = PipelineDefinition::new("log")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::load("load", "out").depends_on("extract"));

    let result = executor(Configuration::new())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("out", Arc::new(MemorySink::new()))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    let transitions: Vec<(String, StepState)> = result
        .log
        .iter()
        .map(|entry| (entry.step.clone(), entry.state))
        .collect();
    assert_eq!(
        transitions,
        vec![
            ("extract".to_string(), StepState::Running),
            ("extract".to_string(), StepState::Succeeded),
            ("load".to_string(), StepState::Running),
            ("load".to_string(), StepState::Succeeded),
        ]
    );
    assert!(result.log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test(start_paused = true)]
async fn test_sequential_follows_declaration_order() {
    let sink = Arc::new(OrderSink::default());
    let pipeline = order_pipeline(ExecutionMode::Sequential);

    let result = order_executor(sink.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(sink.seen(), vec!["slow", "fast", "both"]);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_gates_on_dependencies() {
    let sink = Arc::new(OrderSink::default());
    let pipeline = order_pipeline(ExecutionMode::Parallel);

    let result = order_executor(sink.clone())
        .with_max_concurrency(4)
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    // The fast branch does not wait for the slow extract
    let seen = sink.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], "fast");

    // The join starts only once both extracts succeeded
    let position = |step: &str, state: StepState| {
        result
            .log
            .iter()
            .position(|e| e.step == step && e.state == state)
    };
    assert!(position("join", StepState::Running) > position("slow_extract", StepState::Succeeded));
    assert!(position("join", StepState::Running) > position("fast_extract", StepState::Succeeded));
}

fn order_pipeline(mode: ExecutionMode) -> PipelineDefinition {
    PipelineDefinition::new("order")
        .with_execution_mode(mode)
        .add_step(PipelineStep::extract("slow_extract", "slow"))
        .add_step(PipelineStep::extract("fast_extract", "fast"))
        .add_step(
            PipelineStep::load("slow_load", "order")
                .with_operation("slow")
                .depends_on("slow_extract"),
        )
        .add_step(
            PipelineStep::load("fast_load", "order")
                .with_operation("fast")
                .depends_on("fast_extract"),
        )
        .add_step(
            PipelineStep::load("join", "order")
                .with_operation("both")
                .depends_on("slow_extract")
                .depends_on("fast_extract"),
        )
}

fn order_executor(sink: Arc<OrderSink>) -> PipelineExecutor {
    let one = vec![record(&[("id", Value::Number(1.0))])];
    executor(Configuration::new())
        .with_source("slow", Arc::new(SlowSource::new(Duration::from_millis(200), one.clone())))
        .with_source("fast", Arc::new(SlowSource::new(Duration::from_millis(10), one)))
        .with_sink("order", sink)
}

// =============================================================================
// Error handling policies
// =============================================================================

#[tokio::test]
async fn test_stop_on_error_skips_unstarted_steps() {
    let pipeline = PipelineDefinition::new("stop")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::load("load", "broken").depends_on("extract"))
        .add_step(PipelineStep::transform("filter", filter_adults()).depends_on("extract"))
        .add_step(PipelineStep::load("archive", "out").depends_on("filter"));

    let result = executor(adult_config())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("broken", Arc::new(BrokenSink))
        .with_sink("out", Arc::new(MemorySink::new()))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(!result.overall_success);
    assert_eq!(result.state_of("extract"), Some(StepState::Succeeded));
    assert_eq!(result.state_of("load"), Some(StepState::Failed));
    assert_eq!(result.state_of("filter"), Some(StepState::Skipped));
    assert_eq!(result.state_of("archive"), Some(StepState::Skipped));
    assert_eq!(result.failed_steps, 1);
    assert_eq!(result.skipped_steps, 2);
    assert_eq!(result.total_steps, 4);
}

#[tokio::test]
async fn test_continue_on_error_skips_only_dependents() {
    let out = Arc::new(MemorySink::new());
    let pipeline = PipelineDefinition::new("continue")
        .with_error_handling(ErrorHandling::ContinueOnError)
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::load("load", "broken").depends_on("extract"))
        .add_step(PipelineStep::load("after_load", "out").depends_on("load"))
        .add_step(PipelineStep::transform("filter", filter_adults()).depends_on("extract"))
        .add_step(PipelineStep::load("archive", "out").depends_on("filter"));

    let result = executor(adult_config())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("broken", Arc::new(BrokenSink))
        .with_sink("out", out.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(!result.overall_success);
    assert_eq!(result.state_of("load"), Some(StepState::Failed));
    assert_eq!(result.state_of("after_load"), Some(StepState::Skipped));
    assert_eq!(result.state_of("filter"), Some(StepState::Succeeded));
    assert_eq!(result.state_of("archive"), Some(StepState::Succeeded));
    assert_eq!(out.len(), 2);
    assert!(result
        .step("after_load")
        .and_then(|s| s.error.as_deref())
        .is_some_and(|reason| reason.contains("'load' failed")));
}

#[tokio::test]
async fn test_optional_failure_keeps_pipeline_successful() {
    let out = Arc::new(MemorySink::new());
    let pipeline = PipelineDefinition::new("optional")
        .add_step(PipelineStep::extract("enrich", "flaky").optional())
        .add_step(PipelineStep::transform("filter", filter_adults()).depends_on("enrich"))
        .add_step(PipelineStep::load("load", "out").depends_on("filter"));

    let result = executor(adult_config())
        .with_source("flaky", Arc::new(FlakySource::new(usize::MAX, Vec::new())))
        .with_sink("out", out.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(result.state_of("enrich"), Some(StepState::Failed));
    assert_eq!(result.state_of("filter"), Some(StepState::Succeeded));
    assert_eq!(result.state_of("load"), Some(StepState::Succeeded));
    assert!(result.output("enrich").is_none());
    assert_eq!(result.output("filter"), Some(&Value::Array(Vec::new())));
    assert!(out.is_empty());
    assert!(result.warnings.iter().any(|w| w.contains("enrich")));
}

// =============================================================================
// Retries and timeouts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_until_success() {
    let source = Arc::new(FlakySource::new(2, applicants()));
    let pipeline = PipelineDefinition::new("retry")
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(50)))
        .add_step(PipelineStep::extract("extract", "flaky"))
        .add_step(PipelineStep::load("load", "out").depends_on("extract"));

    let result = executor(Configuration::new())
        .with_source("flaky", source.clone())
        .with_sink("out", Arc::new(MemorySink::new()))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(source.calls(), 3);
    assert_eq!(result.step("extract").map(|s| s.attempts), Some(3));

    let states: Vec<StepState> = result.log_for("extract").map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            StepState::Running,
            StepState::Failed,
            StepState::Running,
            StepState::Failed,
            StepState::Running,
            StepState::Succeeded,
        ]
    );
    // The dependent starts only after the retried step finished
    let first_load = result.log.iter().position(|e| e.step == "load");
    let extract_done = result
        .log
        .iter()
        .position(|e| e.step == "extract" && e.state == StepState::Succeeded);
    assert!(first_load > extract_done);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let source = Arc::new(FlakySource::new(5, applicants()));
    let pipeline = PipelineDefinition::new("retry")
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)))
        .add_step(PipelineStep::extract("extract", "flaky"));

    let result = executor(Configuration::new())
        .with_source("flaky", source.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(!result.overall_success);
    assert_eq!(source.calls(), 2);
    let step = result.step("extract").unwrap();
    assert_eq!(step.state, StepState::Failed);
    assert_eq!(step.attempts, 2);
    assert!(step.error.as_deref().is_some_and(|e| e.contains("attempt 2 refused")));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fails_running_and_keeps_outputs() {
    let one = vec![record(&[("id", Value::Number(1.0))])];
    let pipeline = PipelineDefinition::new("slow")
        .with_timeout(Duration::from_millis(100))
        .add_step(PipelineStep::extract("quick", "fast"))
        .add_step(PipelineStep::extract("stuck", "slow").depends_on("quick"))
        .add_step(PipelineStep::load("load", "out").depends_on("stuck"));

    let result = executor(Configuration::new())
        .with_source("fast", Arc::new(MemorySource::new().with_records(one.clone())))
        .with_source("slow", Arc::new(SlowSource::new(Duration::from_secs(10), one)))
        .with_sink("out", Arc::new(MemorySink::new()))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.timed_out);
    assert!(!result.overall_success);
    assert_eq!(result.state_of("quick"), Some(StepState::Succeeded));
    assert_eq!(result.state_of("stuck"), Some(StepState::Failed));
    assert_eq!(result.state_of("load"), Some(StepState::Skipped));
    assert!(result.output("quick").is_some());
    assert!(result
        .step("stuck")
        .and_then(|s| s.error.as_deref())
        .is_some_and(|e| e.starts_with("Timed out")));
}

#[tokio::test(start_paused = true)]
async fn test_step_finishing_at_deadline_keeps_output() {
    let one = vec![record(&[("id", Value::Number(1.0))])];
    let pipeline = PipelineDefinition::new("edge")
        .with_execution_mode(ExecutionMode::Parallel)
        .with_timeout(Duration::from_millis(100))
        .add_step(PipelineStep::extract("on_time", "edge"))
        .add_step(PipelineStep::extract("stuck", "slow"));

    let result = executor(Configuration::new())
        .with_source(
            "edge",
            Arc::new(SlowSource::new(Duration::from_millis(100), one.clone())),
        )
        .with_source("slow", Arc::new(SlowSource::new(Duration::from_secs(10), one)))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.state_of("on_time"), Some(StepState::Succeeded));
    assert!(result.output("on_time").is_some());
    assert_eq!(result.state_of("stuck"), Some(StepState::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_executor_default_timeout() {
    let pipeline = PipelineDefinition::new("slow")
        .add_step(PipelineStep::extract("stuck", "slow"));

    let result = executor(Configuration::new())
        .with_source("slow", Arc::new(SlowSource::new(Duration::from_secs(10), Vec::new())))
        .with_default_timeout(Duration::from_millis(500))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.failed_steps, 1);
}

// =============================================================================
// Step semantics
// =============================================================================

#[tokio::test]
async fn test_load_skips_rejected_records() {
    let sink = Arc::new(StrictSink::requiring("email"));
    let records = vec![
        record(&[("email", Value::from("a@example.com"))]),
        record(&[("email", Value::Null)]),
        record(&[("email", Value::from("c@example.com"))]),
    ];
    let pipeline = PipelineDefinition::new("load")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::load("load", "strict").depends_on("extract"));

    let result = executor(Configuration::new())
        .with_source("people", Arc::new(MemorySource::new().with_records(records)))
        .with_sink("strict", sink.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(sink.accepted().len(), 2);
    let summary = result.output("load").unwrap();
    assert_eq!(summary.get("written"), Some(&Value::Number(2.0)));
    assert_eq!(summary.get("skipped"), Some(&Value::Number(1.0)));
}

async fn run_failing_load_with_audit(
    pipeline: PipelineDefinition,
    audit: Arc<MemorySink>,
) -> ruleflow_runtime::PipelineExecutionResult {
    let pipeline = pipeline
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::load("load", "broken").depends_on("extract"))
        .add_step(PipelineStep::audit("audit", "audit").depends_on("extract"));

    executor(Configuration::new())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("broken", Arc::new(BrokenSink))
        .with_sink("audit", audit)
        .with_max_concurrency(4)
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_audit_runs_despite_failed_load_when_continuing() {
    let audit = Arc::new(MemorySink::new());
    let pipeline =
        PipelineDefinition::new("audited").with_error_handling(ErrorHandling::ContinueOnError);

    let result = run_failing_load_with_audit(pipeline, audit.clone()).await;

    assert!(!result.overall_success);
    assert_eq!(result.state_of("load"), Some(StepState::Failed));
    assert_eq!(result.state_of("audit"), Some(StepState::Succeeded));
    assert_eq!(audit.len(), 3);
}

#[tokio::test]
async fn test_audit_runs_despite_failed_load_in_parallel() {
    let audit = Arc::new(MemorySink::new());
    let pipeline = PipelineDefinition::new("audited").with_execution_mode(ExecutionMode::Parallel);

    let result = run_failing_load_with_audit(pipeline, audit.clone()).await;

    assert!(!result.overall_success);
    assert_eq!(result.state_of("audit"), Some(StepState::Succeeded));
    assert_eq!(audit.len(), 3);
}

#[tokio::test]
async fn test_audit_record_and_no_output() {
    let audit = Arc::new(MemorySink::new());
    let pipeline = PipelineDefinition::new("audited")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(
            PipelineStep::audit("audit", "audit")
                .with_operation("trail")
                .depends_on("extract"),
        );

    let result = executor(Configuration::new())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("audit", audit.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert!(result.output("audit").is_none());

    let entries = audit.records();
    assert_eq!(entries.len(), 3);
    let first = &entries[0];
    assert_eq!(first.get("pipeline_name"), Some(&Value::from("audited")));
    assert_eq!(first.get("step_name"), Some(&Value::from("audit")));
    assert_eq!(first.get("status"), Some(&Value::from("processed")));
    assert_eq!(
        first.get("original_data").and_then(|r| r.get("name")),
        Some(&Value::from("ada"))
    );
    assert!(first.get("timestamp").and_then(Value::as_str).is_some());
    assert_eq!(audit.operations()[0], "trail");
}

#[tokio::test]
async fn test_failed_audit_never_halts() {
    let out = Arc::new(MemorySink::new());
    let pipeline = PipelineDefinition::new("audited")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(PipelineStep::audit("audit", "broken").depends_on("extract"))
        .add_step(PipelineStep::load("load", "out").depends_on("extract"));

    let result = executor(Configuration::new())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .with_sink("broken", Arc::new(BrokenSink))
        .with_sink("out", out.clone())
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(result.state_of("audit"), Some(StepState::Failed));
    assert_eq!(result.state_of("load"), Some(StepState::Succeeded));
    assert_eq!(out.len(), 3);
    assert!(!result.warnings.is_empty());
}

#[tokio::test]
async fn test_chain_transform_annotates_records() {
    let config = Configuration::new()
        .with_rule(Rule::new("base", "Base", "base"))
        .with_rule_chain(RuleChain::accumulative(
            "score",
            "Score",
            AccumulativeConfig::new("total").add_rule("base", 2.0),
        ));
    let records = vec![
        record(&[("base", Value::Number(10.0))]),
        record(&[("base", Value::Number(4.0))]),
    ];
    let pipeline = PipelineDefinition::new("scoring")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(
            PipelineStep::transform(
                "score",
                TransformOperation::RuleChain {
                    chain: "score".to_string(),
                    result_field: "decision".to_string(),
                },
            )
            .depends_on("extract"),
        );

    let result = executor(config)
        .with_source("people", Arc::new(MemorySource::new().with_records(records)))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    let scored = result.output("score").unwrap().records();
    assert_eq!(scored.len(), 2);
    assert_eq!(
        scored[0].get("decision"),
        Some(&Value::from("ACCUMULATION_COMPLETED"))
    );
    assert_eq!(scored[1].get("base"), Some(&Value::Number(4.0)));
}

#[tokio::test]
async fn test_transform_without_upstream_uses_run_input() {
    let pipeline = PipelineDefinition::new("single").add_step(PipelineStep::transform(
        "check",
        TransformOperation::RuleGroup {
            group: "adults".to_string(),
            filter: false,
            result_field: "eligible".to_string(),
        },
    ));
    let input = HashMap::from([
        ("name".to_string(), Value::from("ada")),
        ("adult".to_string(), Value::Bool(true)),
    ]);

    let result = executor(adult_config())
        .execute(&pipeline, input)
        .await
        .unwrap();

    let checked = result.output("check").unwrap().records();
    assert_eq!(checked.len(), 1);
    assert_eq!(checked[0].get("eligible"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_field_mapping_transform() {
    let pipeline = PipelineDefinition::new("rename")
        .add_step(PipelineStep::extract("extract", "people"))
        .add_step(
            PipelineStep::transform(
                "rename",
                TransformOperation::FieldMapping {
                    mappings: BTreeMap::from([("full_name".to_string(), "name".to_string())]),
                    include_unmapped: true,
                },
            )
            .depends_on("extract"),
        );

    let result = executor(Configuration::new())
        .with_source("people", Arc::new(MemorySource::new().with_records(applicants())))
        .execute(&pipeline, HashMap::new())
        .await
        .unwrap();

    let renamed = result.output("rename").unwrap().records();
    assert_eq!(renamed[0].get("full_name"), Some(&Value::from("ada")));
    assert!(renamed[0].get("name").is_none());
    assert_eq!(renamed[0].get("adult"), Some(&Value::Bool(true)));
}
