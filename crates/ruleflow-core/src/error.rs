//! Error types for Ruleflow Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Pipeline has no steps")]
    EmptyPipeline,

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("Circular dependency detected in pipeline: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("Type error: {0}")]
    TypeError(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
