//! Validated configuration arena
//!
//! Holds every merged definition keyed by id behind an `Arc`, so evaluators
//! and executors can share them across tasks without copying. A
//! `Configuration` is immutable once built.

use crate::ast::{DataSourceDefinition, PipelineDefinition, Rule, RuleChain, RuleGroup};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    rules: HashMap<String, Arc<Rule>>,
    rule_groups: HashMap<String, Arc<RuleGroup>>,
    rule_chains: HashMap<String, Arc<RuleChain>>,
    data_sources: HashMap<String, Arc<DataSourceDefinition>>,
    pipeline: Option<Arc<PipelineDefinition>>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the arena from already validated definitions.
    ///
    /// Later duplicates replace earlier ones; duplicate detection belongs to
    /// validation.
    pub fn from_parts(
        rules: Vec<Rule>,
        rule_groups: Vec<RuleGroup>,
        rule_chains: Vec<RuleChain>,
        data_sources: Vec<DataSourceDefinition>,
        pipeline: Option<PipelineDefinition>,
    ) -> Self {
        Configuration {
            rules: rules
                .into_iter()
                .map(|r| (r.id.clone(), Arc::new(r)))
                .collect(),
            rule_groups: rule_groups
                .into_iter()
                .map(|g| (g.id.clone(), Arc::new(g)))
                .collect(),
            rule_chains: rule_chains
                .into_iter()
                .map(|c| (c.id.clone(), Arc::new(c)))
                .collect(),
            data_sources: data_sources
                .into_iter()
                .map(|s| (s.name.clone(), Arc::new(s)))
                .collect(),
            pipeline: pipeline.map(Arc::new),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.insert(rule.id.clone(), Arc::new(rule));
        self
    }

    pub fn with_rule_group(mut self, group: RuleGroup) -> Self {
        self.rule_groups.insert(group.id.clone(), Arc::new(group));
        self
    }

    pub fn with_rule_chain(mut self, chain: RuleChain) -> Self {
        self.rule_chains.insert(chain.id.clone(), Arc::new(chain));
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineDefinition) -> Self {
        self.pipeline = Some(Arc::new(pipeline));
        self
    }

    pub fn rule(&self, id: &str) -> Option<&Arc<Rule>> {
        self.rules.get(id)
    }

    pub fn rule_group(&self, id: &str) -> Option<&Arc<RuleGroup>> {
        self.rule_groups.get(id)
    }

    pub fn rule_chain(&self, id: &str) -> Option<&Arc<RuleChain>> {
        self.rule_chains.get(id)
    }

    pub fn data_source(&self, name: &str) -> Option<&Arc<DataSourceDefinition>> {
        self.data_sources.get(name)
    }

    pub fn pipeline(&self) -> Option<&Arc<PipelineDefinition>> {
        self.pipeline.as_ref()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rule_group_count(&self) -> usize {
        self.rule_groups.len()
    }

    pub fn rule_chain_count(&self) -> usize {
        self.rule_chains.len()
    }

    pub fn data_source_count(&self) -> usize {
        self.data_sources.len()
    }
}
