//! Runtime error types

use crate::datasource::DataError;
use crate::expression::ExpressionError;
use ruleflow_core::CoreError;
use std::time::Duration;
use thiserror::Error;

/// Runtime error
///
/// Rule failures never surface as a `RuntimeError`; they are recorded in
/// rule results. Step failures are recorded in step results. Only pipeline
/// validation and unknown top-level ids are returned to the caller.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Pipeline dependency graph is invalid
    #[error("Pipeline validation failed: {0}")]
    Validation(#[from] CoreError),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    #[error("Unknown rule group: {0}")]
    UnknownRuleGroup(String),

    #[error("Unknown rule chain: {0}")]
    UnknownRuleChain(String),

    #[error("Unknown data source: {0}")]
    UnknownSource(String),

    #[error("Unknown data sink: {0}")]
    UnknownSink(String),

    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Output '{0}' has already been written")]
    DuplicateOutput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
