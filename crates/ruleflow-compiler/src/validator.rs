//! Validation of a merged configuration
//!
//! Runs once, over the fully merged document. Collects every issue instead
//! of stopping at the first one.

use crate::error::{ConfigError, Result, ValidationIssue};
use ruleflow_core::{
    ChainPattern, ConfigDocument, Configuration, DependencyGraph, PipelineDefinition,
    RuleSelection, StepKind, TransformOperation,
};
use std::collections::HashSet;

/// Check a merged document, returning every issue found
pub fn validate(document: &ConfigDocument) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    let rule_ids = check_rules(document, &mut issues);
    let group_ids = check_groups(document, &rule_ids, &mut issues);
    let chain_ids = check_chains(document, &rule_ids, &mut issues);
    check_data_sources(document, &mut issues);
    if let Some(pipeline) = &document.pipeline {
        check_pipeline(pipeline, &group_ids, &chain_ids, &mut issues);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Validate a merged document and turn it into a [`Configuration`]
pub fn build_configuration(document: ConfigDocument) -> Result<Configuration> {
    validate(&document).map_err(ConfigError::Validation)?;

    Ok(Configuration::from_parts(
        document.rules,
        document.rule_groups,
        document.rule_chains,
        document.data_sources,
        document.pipeline,
    ))
}

fn require(
    value: &str,
    entity: impl FnOnce() -> String,
    field: &'static str,
    issues: &mut Vec<ValidationIssue>,
) {
    if value.trim().is_empty() {
        issues.push(ValidationIssue::MissingField {
            entity: entity(),
            field,
        });
    }
}

/// Record `id` as seen, flagging duplicates. Empty ids are reported elsewhere.
fn track_id<'a>(
    seen: &mut HashSet<&'a str>,
    id: &'a str,
    kind: &'static str,
    issues: &mut Vec<ValidationIssue>,
) {
    if !id.is_empty() && !seen.insert(id) {
        issues.push(ValidationIssue::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
}

fn check_rules<'a>(
    document: &'a ConfigDocument,
    issues: &mut Vec<ValidationIssue>,
) -> HashSet<&'a str> {
    let mut ids = HashSet::new();
    for (i, rule) in document.rules.iter().enumerate() {
        let entity = || format!("Rule #{} ('{}')", i + 1, rule.id);
        require(&rule.id, entity, "id", issues);
        require(&rule.name, entity, "name", issues);
        require(&rule.condition, entity, "condition", issues);
        track_id(&mut ids, &rule.id, "rule", issues);
    }
    ids
}

fn check_groups<'a>(
    document: &'a ConfigDocument,
    rule_ids: &HashSet<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> HashSet<&'a str> {
    let mut ids = HashSet::new();
    for (i, group) in document.rule_groups.iter().enumerate() {
        let entity = || format!("Rule group #{} ('{}')", i + 1, group.id);
        require(&group.id, entity, "id", issues);
        require(&group.name, entity, "name", issues);
        track_id(&mut ids, &group.id, "rule group", issues);

        for entry in &group.rules {
            if !rule_ids.contains(entry.rule_id.as_str()) {
                issues.push(ValidationIssue::UnknownRule {
                    owner: format!("Rule group '{}'", group.id),
                    rule_id: entry.rule_id.clone(),
                });
            }
        }
    }
    ids
}

fn check_chains<'a>(
    document: &'a ConfigDocument,
    rule_ids: &HashSet<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> HashSet<&'a str> {
    let mut ids = HashSet::new();
    for (i, chain) in document.rule_chains.iter().enumerate() {
        let entity = || format!("Rule chain #{} ('{}')", i + 1, chain.id);
        require(&chain.id, entity, "id", issues);
        require(&chain.name, entity, "name", issues);
        track_id(&mut ids, &chain.id, "rule chain", issues);

        let invalid = |message: &str| ValidationIssue::InvalidChain {
            chain: chain.id.clone(),
            message: message.to_string(),
        };
        match &chain.pattern {
            ChainPattern::Accumulative(config) => {
                if config.accumulator_variable.trim().is_empty() {
                    issues.push(invalid("accumulator variable is empty"));
                }
                if config.rules.is_empty() {
                    issues.push(invalid("accumulative chain has no rules"));
                }
                if config.rules.iter().any(|r| !r.weight.is_finite()) {
                    issues.push(invalid("weights must be finite numbers"));
                }
                if matches!(config.selection, RuleSelection::TopWeighted { max_rules: 0 }) {
                    issues.push(invalid("top_weighted selection needs max_rules >= 1"));
                }
            }
            ChainPattern::Conditional(config) => {
                if config.trigger_rule.trim().is_empty() {
                    issues.push(invalid("conditional chain has no trigger rule"));
                }
            }
        }

        for rule_id in chain.referenced_rules() {
            if !rule_id.is_empty() && !rule_ids.contains(rule_id) {
                issues.push(ValidationIssue::UnknownRule {
                    owner: format!("Rule chain '{}'", chain.id),
                    rule_id: rule_id.to_string(),
                });
            }
        }
    }
    ids
}

fn check_data_sources(document: &ConfigDocument, issues: &mut Vec<ValidationIssue>) {
    let mut names = HashSet::new();
    for (i, source) in document.data_sources.iter().enumerate() {
        require(
            &source.name,
            || format!("Data source #{}", i + 1),
            "name",
            issues,
        );
        track_id(&mut names, &source.name, "data source", issues);
    }
}

fn check_pipeline(
    pipeline: &PipelineDefinition,
    group_ids: &HashSet<&str>,
    chain_ids: &HashSet<&str>,
    issues: &mut Vec<ValidationIssue>,
) {
    let pipeline_name = if pipeline.name.is_empty() {
        "<unnamed>".to_string()
    } else {
        pipeline.name.clone()
    };

    if pipeline.retry_policy.max_attempts == 0 {
        issues.push(ValidationIssue::InvalidRetryPolicy {
            pipeline: pipeline_name.clone(),
        });
    }

    if let Err(source) = DependencyGraph::build(&pipeline.steps) {
        issues.push(ValidationIssue::Pipeline {
            pipeline: pipeline_name.clone(),
            source,
        });
    }

    for (i, step) in pipeline.steps.iter().enumerate() {
        let entity = || format!("Step #{} ('{}')", i + 1, step.name);
        require(&step.name, entity, "name", issues);

        match &step.kind {
            StepKind::Extract { source, .. } => require(source, entity, "source", issues),
            StepKind::Load { sink, .. } | StepKind::Audit { sink, .. } => {
                require(sink, entity, "sink", issues)
            }
            StepKind::Transform { operation, .. } => match operation {
                TransformOperation::RuleGroup { group, .. } => {
                    if !group_ids.contains(group.as_str()) {
                        issues.push(ValidationIssue::UnknownRuleGroup {
                            step: step.name.clone(),
                            group: group.clone(),
                        });
                    }
                }
                TransformOperation::RuleChain { chain, .. } => {
                    if !chain_ids.contains(chain.as_str()) {
                        issues.push(ValidationIssue::UnknownRuleChain {
                            step: step.name.clone(),
                            chain: chain.clone(),
                        });
                    }
                }
                TransformOperation::FieldMapping { .. } => {}
            },
        }
    }
}
