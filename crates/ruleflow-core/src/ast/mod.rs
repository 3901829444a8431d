//! Definitions loaded from configuration
//!
//! This module contains the definitions for:
//! - Rules
//! - Rule groups
//! - Rule chains
//! - Pipelines
//! - Configuration documents and external references

pub mod document;
pub mod pipeline;
pub mod rule;
pub mod rule_chain;
pub mod rule_group;

pub use document::{ConfigDocument, DataSourceDefinition, DocumentMetadata, ExternalReference};
pub use pipeline::{
    ErrorHandling, ExecutionMode, PipelineDefinition, PipelineStep, RetryPolicy, StepKind,
    StepType, TransformOperation,
};
pub use rule::{Rule, Severity};
pub use rule_chain::{
    AccumulativeConfig, ChainPattern, ConditionalConfig, RuleChain, RuleSelection, WeightedRule,
};
pub use rule_group::{GroupOperator, RuleGroup, RuleGroupEntry};
