//! SDK error types

use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Loading, merging or validating configuration failed
    #[error("Configuration error: {0}")]
    Config(#[from] ruleflow_compiler::ConfigError),

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(#[from] ruleflow_runtime::RuntimeError),

    /// Engine settings could not be parsed
    #[error("Invalid engine settings: {0}")]
    Settings(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No root document was given to the builder
    #[error("No root configuration document was provided")]
    MissingRoot,

    /// No expression evaluator was given to the builder
    #[error("No expression evaluator was provided")]
    MissingEvaluator,

    /// The configuration defines no pipeline
    #[error("Configuration defines no pipeline")]
    NoPipeline,
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
