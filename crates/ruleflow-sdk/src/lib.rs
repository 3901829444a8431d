//! Ruleflow SDK
//!
//! High-level API: load a configuration with [`EngineBuilder`], then
//! evaluate rule groups and chains or run the configured pipeline on the
//! resulting [`Engine`].

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;

pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Result, SdkError};

// Re-export commonly used types from dependencies
pub use ruleflow_compiler::{ConfigError, ValidationIssue};
pub use ruleflow_core::{Configuration, Value};
pub use ruleflow_runtime::{
    DataError, DataResult, DataSink, DataSource, EvaluationContext, ExpressionError,
    ExpressionEvaluator, MemorySink, MemorySource, PipelineExecutionResult, RuleChainResult,
    RuleGroupResult, StepState,
};
