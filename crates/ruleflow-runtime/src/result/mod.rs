//! Execution results
//!
//! Results are created fresh for every evaluation or run and are not
//! mutated once returned.

pub mod pipeline;
pub mod rule;

pub use pipeline::{ExecutionLogEntry, PipelineExecutionResult, StepResult, StepState};
pub use rule::{
    AccumulationState, Branch, ChainOutcome, ConditionalState, RuleChainResult, RuleGroupResult,
    RuleResult, RuleTrace,
};
