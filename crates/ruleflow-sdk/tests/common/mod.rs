//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use ruleflow_sdk::{EvaluationContext, ExpressionError, Value};
use std::collections::HashMap;

/// Minimal expression language for tests:
/// - literals: `true`, `false`, numbers, `'text'`
/// - variables, including `record.field` paths
/// - comparisons: `a >= b`, `a > b`, `a <= b`, `a < b`, `a == b`
/// - right-nested conditionals: `cond ? then : else`
pub fn evaluate(expression: &str, context: &EvaluationContext) -> Result<Value, ExpressionError> {
    let expression = expression.trim();

    if let Some((condition, branches)) = expression.split_once('?') {
        let (then, otherwise) = branches
            .split_once(':')
            .ok_or_else(|| ExpressionError::Syntax(expression.to_string()))?;
        return match evaluate(condition, context)? {
            Value::Bool(true) => evaluate(then, context),
            _ => evaluate(otherwise, context),
        };
    }

    for op in [">=", "<=", "==", ">", "<"] {
        if let Some((left, right)) = expression.split_once(op) {
            let left = evaluate(left, context)?;
            let right = evaluate(right, context)?;
            return compare(op, &left, &right);
        }
    }

    operand(expression, context)
}

fn operand(token: &str, context: &EvaluationContext) -> Result<Value, ExpressionError> {
    match token {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Ok(number) = token.parse::<f64>() {
        return Ok(Value::Number(number));
    }
    if let Some(text) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Value::from(text));
    }

    let mut parts = token.split('.');
    let head = parts.next().unwrap_or_default();
    let mut value = context
        .get(head)
        .ok_or_else(|| ExpressionError::UnknownVariable(token.to_string()))?;
    for field in parts {
        value = value
            .get(field)
            .ok_or_else(|| ExpressionError::UnknownVariable(token.to_string()))?;
    }
    Ok(value.clone())
}

fn compare(op: &str, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    if op == "==" {
        return Ok(Value::Bool(left == right));
    }
    let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
        return Err(ExpressionError::Evaluation(format!(
            "cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        )));
    };
    let result = match op {
        ">=" => l >= r,
        "<=" => l <= r,
        ">" => l > r,
        _ => l < r,
    };
    Ok(Value::Bool(result))
}

pub fn context(pairs: &[(&str, Value)]) -> EvaluationContext {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn record(pairs: &[(&str, Value)]) -> Value {
    Value::Object(context(pairs))
}

pub fn as_map(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    context(pairs)
}
