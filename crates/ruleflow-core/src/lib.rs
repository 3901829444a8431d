//! Ruleflow Core - shared definitions for the Ruleflow engine
//!
//! This crate provides the types every other Ruleflow crate builds on:
//! - Runtime values passed to and returned from expressions
//! - Definitions for rules, rule groups, rule chains and pipelines
//! - External reference and document types used while loading configuration
//! - Pipeline dependency analysis
//! - The validated, immutable [`Configuration`] arena
//! - Error types

pub mod ast;
pub mod configuration;
pub mod dag;
pub mod error;
pub mod types;

pub use ast::{
    AccumulativeConfig, ChainPattern, ConditionalConfig, ConfigDocument, DataSourceDefinition,
    DocumentMetadata, ErrorHandling, ExecutionMode, ExternalReference, GroupOperator,
    PipelineDefinition, PipelineStep, RetryPolicy, Rule, RuleChain, RuleGroup, RuleGroupEntry,
    RuleSelection, Severity, StepKind, StepType, TransformOperation, WeightedRule,
};
pub use configuration::Configuration;
pub use dag::DependencyGraph;
pub use error::CoreError;
pub use types::Value;
