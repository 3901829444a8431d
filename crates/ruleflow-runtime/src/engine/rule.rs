//! Single rule evaluation, shared by groups and chains

use crate::expression::{EvaluationContext, ExpressionError, ExpressionEvaluator};
use crate::result::{RuleResult, RuleTrace};
use ruleflow_core::{Rule, Severity, Value};
use std::time::{Duration, Instant};

/// Evaluate an expression, timing the call
pub(crate) fn timed_evaluate(
    evaluator: &dyn ExpressionEvaluator,
    expression: &str,
    context: &EvaluationContext,
) -> (Result<Value, ExpressionError>, Duration) {
    let start = Instant::now();
    let outcome = evaluator.evaluate(expression, context);
    (outcome, start.elapsed())
}

/// Evaluate a boolean rule. Errors and non-boolean values count as false;
/// null is plain false.
pub(crate) fn evaluate_condition(
    evaluator: &dyn ExpressionEvaluator,
    rule: &Rule,
    context: &EvaluationContext,
    with_trace: bool,
) -> (RuleResult, Option<RuleTrace>) {
    let (outcome, duration) = timed_evaluate(evaluator, &rule.condition, context);

    let (triggered, value, error) = match outcome {
        Ok(Value::Bool(b)) => (b, Some(Value::Bool(b)), None),
        Ok(Value::Null) => (false, Some(Value::Null), None),
        Ok(other) => {
            let error = format!("Condition returned {} instead of bool", other.type_name());
            tracing::warn!(rule = %rule.id, %error, "Rule returned a non-boolean value");
            (false, Some(other), Some(error))
        }
        Err(e) => {
            tracing::warn!(rule = %rule.id, error = %e, "Rule evaluation failed");
            (false, None, Some(e.to_string()))
        }
    };

    let trace = with_trace.then(|| RuleTrace {
        rule_id: rule.id.clone(),
        input: context.clone(),
        output: value.clone(),
        error: error.clone(),
        duration,
    });

    let result = RuleResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        triggered,
        message: rule.message.clone(),
        severity: rule.severity,
        duration,
        value,
        error,
    };
    (result, trace)
}

/// Result for a rule id with no definition
pub(crate) fn missing_rule(rule_id: &str) -> RuleResult {
    tracing::warn!(rule = %rule_id, "Rule is not defined");
    RuleResult {
        rule_id: rule_id.to_string(),
        rule_name: rule_id.to_string(),
        triggered: false,
        message: String::new(),
        severity: Severity::Error,
        duration: Duration::ZERO,
        value: None,
        error: Some(format!("Unknown rule: {}", rule_id)),
    }
}
