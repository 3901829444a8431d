//! Tiny expression language shared by the demos
//!
//! Supports literals, variables, comparisons and `cond ? a : b`. Real
//! deployments plug in their own evaluator.

use ruleflow_sdk::{EvaluationContext, ExpressionError, Value};

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

    for op in [">=", "<=", ">", "<"] {
        if let Some((left, right)) = expression.split_once(op) {
            let left = number(evaluate(left, context)?)?;
            let right = number(evaluate(right, context)?)?;
            let result = match op {
                ">=" => left >= right,
                "<=" => left <= right,
                ">" => left > right,
                _ => left < right,
            };
            return Ok(Value::Bool(result));
        }
    }

    match expression {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => {
            if let Ok(n) = expression.parse::<f64>() {
                return Ok(Value::Number(n));
            }
            if let Some(text) = expression.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
                return Ok(Value::from(text));
            }
            context
                .get(expression)
                .cloned()
                .ok_or_else(|| ExpressionError::UnknownVariable(expression.to_string()))
        }
    }
}

fn number(value: Value) -> Result<f64, ExpressionError> {
    value
        .as_f64()
        .ok_or_else(|| ExpressionError::Evaluation(format!("expected a number, got {}", value.type_name())))
}
