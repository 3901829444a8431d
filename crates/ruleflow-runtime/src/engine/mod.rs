//! Evaluation and execution engines
//!
//! - [`RuleGroupEvaluator`]: AND/OR groups with short-circuit, parallel and
//!   debug behaviour
//! - [`RuleChainEvaluator`]: accumulative scoring and conditional branching
//! - [`PipelineExecutor`]: dependency-ordered step execution

mod rule;
pub mod pipeline_executor;
pub mod rule_chain;
pub mod rule_group;
mod step;

pub use pipeline_executor::PipelineExecutor;
pub use rule_chain::RuleChainEvaluator;
pub use rule_group::RuleGroupEvaluator;

/// Default worker pool size: the number of available cores
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
