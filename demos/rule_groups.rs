//! Rule group and rule chain evaluation without a pipeline
//!
//! Shows short-circuiting, debug traces and conditional chains on a
//! configuration built from inline YAML.

mod expression;

use ruleflow_sdk::{EngineBuilder, EvaluationContext, Value};

const CONFIG: &str = r#"
rules:
  - id: high-amount
    name: High amount
    condition: "amount > 1000"
    message: Amount above 1000
  - id: new-account
    name: New account
    condition: "account_age_days < 30"
    message: Account younger than 30 days
  - id: foreign
    name: Foreign card
    condition: foreign_card
    message: Card issued abroad
  - id: hold
    name: Hold payment
    condition: "true"
    message: Payment held for review
  - id: release
    name: Release payment
    condition: "true"
    message: Payment released

rule_groups:
  - id: risky
    name: Risky payment
    operator: OR
    rules:
      - rule_id: high-amount
      - rule_id: new-account
      - rule_id: foreign
  - id: risky-debug
    name: Risky payment (debug)
    operator: OR
    debug_mode: true
    rules:
      - rule_id: high-amount
      - rule_id: new-account
      - rule_id: foreign

rule_chains:
  - id: routing
    name: Payment routing
    pattern: conditional
    trigger_rule: high-amount
    on_trigger: [hold]
    on_no_trigger: [release]
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let engine = EngineBuilder::new()
        .with_root_content(CONFIG)
        .with_evaluator(expression::evaluate)
        .build()?;

    let payment: EvaluationContext = [
        ("amount", Value::Number(2500.0)),
        ("account_age_days", Value::Number(400.0)),
        ("foreign_card", Value::Bool(false)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    for group_id in ["risky", "risky-debug"] {
        let result = engine.evaluate_group(group_id, &payment).await?;
        println!(
            "{}: passed={} evaluated={}/3 message={:?}",
            group_id, result.passed, result.evaluated, result.message
        );
        for trace in &result.trace {
            println!("  trace {} -> {:?} in {:?}", trace.rule_id, trace.output, trace.duration);
        }
    }

    let routing = engine.evaluate_chain("routing", &payment)?;
    println!("\nrouting: branch={:?}", routing.branch());
    for rule in &routing.rule_results {
        println!("  {} triggered={} {}", rule.rule_id, rule.triggered, rule.message);
    }

    Ok(())
}
