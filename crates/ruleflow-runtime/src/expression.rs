//! Expression evaluation capability
//!
//! The runtime does not interpret expressions itself. Callers inject an
//! [`ExpressionEvaluator`]; any closure with the right signature works.

use ruleflow_core::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Variables visible to an expression
pub type EvaluationContext = HashMap<String, Value>;

/// Error reported by an expression evaluator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

/// Synchronous expression evaluator
///
/// Implementations must be side-effect free; the same evaluator is shared
/// across worker threads.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, context: &EvaluationContext)
        -> Result<Value, ExpressionError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &EvaluationContext) -> Result<Value, ExpressionError> + Send + Sync,
{
    fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<Value, ExpressionError> {
        self(expression, context)
    }
}
