//! Credit onboarding pipeline
//!
//! This demo:
//! - Loads `demos/config/onboarding.yaml` and the documents it references
//! - Runs the pipeline over in-memory applicants
//! - Prints the step outcomes and the stored decisions
//!
//! Run with `RUST_LOG=ruleflow_runtime=debug` to see every transition.

mod expression;

use ruleflow_sdk::{EngineBuilder, EngineConfig, MemorySink, MemorySource, Value};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let applicants: Vec<Value> = vec![
        json!({"name": "ada", "age": 36, "income": 5200, "income_points": 60, "history_points": 30, "employment_points": 10}),
        json!({"name": "bob", "age": 16, "income": 100, "income_points": 90, "history_points": 90, "employment_points": 90}),
        json!({"name": "cy", "age": 41, "income": 9100, "income_points": 90, "history_points": 80, "employment_points": 50}),
        json!({"name": "dee", "age": 29, "income": 800, "income_points": 10, "history_points": 20, "employment_points": 0}),
    ]
    .into_iter()
    .map(Value::from)
    .collect();

    let decisions = Arc::new(MemorySink::new());
    let audit = Arc::new(MemorySink::new());

    let engine = EngineBuilder::new()
        .with_config(EngineConfig::new().with_base_dir("demos/config"))
        .with_root_file("onboarding.yaml")
        .with_evaluator(expression::evaluate)
        .with_source("applicants", MemorySource::new().with_operation("pending", applicants))
        .with_shared_sink("decisions", decisions.clone())
        .with_shared_sink("audit", audit.clone())
        .build()?;

    println!("Loaded {} documents", engine.loaded_sources().len());

    let result = engine.run_pipeline(Default::default()).await?;

    println!("\nPipeline '{}' ({})", result.pipeline, result.execution_id);
    for step in &result.steps {
        println!(
            "  {:<8} {:<10} attempts={} {:?}",
            step.name,
            step.state.to_string(),
            step.attempts,
            step.duration
        );
    }
    println!(
        "  success={} succeeded={} failed={} skipped={}",
        result.overall_success, result.successful_steps, result.failed_steps, result.skipped_steps
    );

    println!("\nDecisions:");
    for record in decisions.records() {
        println!(
            "  {:<5} {}",
            record.get("name").map(Value::to_string).unwrap_or_default(),
            record.get("decision").map(Value::to_string).unwrap_or_default()
        );
    }
    println!("\nAudit entries: {}", audit.len());

    Ok(())
}
