//! Ruleflow Runtime - evaluation and execution
//!
//! This crate evaluates rule groups and rule chains against variables
//! supplied by the caller, and runs pipelines of extract, transform, load
//! and audit steps over a dependency graph.
//!
//! Expressions and data stores are capabilities injected by the embedding
//! application through [`ExpressionEvaluator`], [`DataSource`] and
//! [`DataSink`].

pub mod context;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod expression;
pub mod result;

pub use context::{ExecutionContext, RECORD_VARIABLE};
pub use datasource::{DataError, DataResult, DataSink, DataSource, MemorySink, MemorySource};
pub use engine::{default_concurrency, PipelineExecutor, RuleChainEvaluator, RuleGroupEvaluator};
pub use error::{Result, RuntimeError};
pub use expression::{EvaluationContext, ExpressionError, ExpressionEvaluator};
pub use result::{
    AccumulationState, Branch, ChainOutcome, ConditionalState, ExecutionLogEntry,
    PipelineExecutionResult, RuleChainResult, RuleGroupResult, RuleResult, RuleTrace,
    StepResult, StepState,
};
