//! Rule group evaluator
//!
//! Rules are ordered by priority (ascending, stable), then either evaluated
//! one by one with optional short-circuit, or all at once on the blocking
//! worker pool. Parallel groups never short-circuit; debug mode evaluates
//! every rule and records a trace.

use super::default_concurrency;
use super::rule::{evaluate_condition, missing_rule};
use crate::error::{Result, RuntimeError};
use crate::expression::{EvaluationContext, ExpressionEvaluator};
use crate::result::{RuleGroupResult, RuleResult, RuleTrace};
use ruleflow_core::{Configuration, GroupOperator, Rule, RuleGroup};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Rule group evaluator
pub struct RuleGroupEvaluator {
    config: Arc<Configuration>,
    evaluator: Arc<dyn ExpressionEvaluator>,

    /// Bounds concurrent rule evaluations in parallel groups
    pool: Arc<Semaphore>,
}

/// A group entry resolved against the configuration
struct ResolvedEntry {
    rule_id: String,
    rule: Option<Arc<Rule>>,
}

impl RuleGroupEvaluator {
    pub fn new(config: Arc<Configuration>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            config,
            evaluator,
            pool: Arc::new(Semaphore::new(default_concurrency())),
        }
    }

    /// Limit concurrent rule evaluations for parallel groups
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.pool = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    /// Evaluate the group registered under `group_id`
    pub async fn evaluate_by_id(
        &self,
        group_id: &str,
        context: &EvaluationContext,
    ) -> Result<RuleGroupResult> {
        let group = self
            .config
            .rule_group(group_id)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownRuleGroup(group_id.to_string()))?;
        Ok(self.evaluate(&group, context).await)
    }

    /// Evaluate a group. Never fails: rule errors count as false.
    pub async fn evaluate(&self, group: &RuleGroup, context: &EvaluationContext) -> RuleGroupResult {
        let start = Instant::now();
        let entries = self.resolve_entries(group);

        let (rule_results, trace) = if entries.is_empty() {
            (Vec::new(), Vec::new())
        } else if group.runs_in_parallel() {
            self.evaluate_parallel(entries, context, group.debug_mode).await
        } else {
            self.evaluate_sequential(group, &entries, context)
        };

        let evaluated = rule_results.len();
        let passed = match group.operator {
            GroupOperator::And => evaluated > 0 && rule_results.iter().all(|r| r.triggered),
            GroupOperator::Or => rule_results.iter().any(|r| r.triggered),
        };
        let message = passed
            .then(|| combined_message(group, &rule_results))
            .flatten();

        tracing::debug!(
            group = %group.id,
            passed,
            evaluated,
            total = group.rules.len(),
            "Rule group evaluated"
        );

        RuleGroupResult {
            group_id: group.id.clone(),
            passed,
            evaluated,
            rule_results,
            message,
            trace,
            duration: start.elapsed(),
        }
    }

    /// Enabled entries in ascending effective priority; ties keep declared order
    fn resolve_entries(&self, group: &RuleGroup) -> Vec<ResolvedEntry> {
        let mut entries: Vec<(i32, ResolvedEntry)> = group
            .enabled_entries()
            .map(|entry| {
                let rule = self.config.rule(&entry.rule_id).cloned();
                let priority = entry
                    .priority
                    .or_else(|| rule.as_ref().map(|r| r.priority))
                    .unwrap_or_default();
                (
                    priority,
                    ResolvedEntry {
                        rule_id: entry.rule_id.clone(),
                        rule,
                    },
                )
            })
            .collect();
        entries.sort_by_key(|(priority, _)| *priority);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }

    fn evaluate_sequential(
        &self,
        group: &RuleGroup,
        entries: &[ResolvedEntry],
        context: &EvaluationContext,
    ) -> (Vec<RuleResult>, Vec<RuleTrace>) {
        let short_circuit = group.short_circuits();
        let mut results = Vec::with_capacity(entries.len());
        let mut traces = Vec::new();

        for entry in entries {
            let result = match &entry.rule {
                Some(rule) => {
                    let (result, trace) =
                        evaluate_condition(self.evaluator.as_ref(), rule, context, group.debug_mode);
                    traces.extend(trace);
                    result
                }
                None => missing_rule(&entry.rule_id),
            };
            let triggered = result.triggered;
            results.push(result);

            if !short_circuit {
                continue;
            }
            let decided = match group.operator {
                GroupOperator::And => !triggered,
                GroupOperator::Or => triggered,
            };
            if decided {
                tracing::debug!(
                    group = %group.id,
                    rule = %entry.rule_id,
                    skipped = entries.len() - results.len(),
                    "Short-circuiting rule group"
                );
                break;
            }
        }

        (results, traces)
    }

    async fn evaluate_parallel(
        &self,
        entries: Vec<ResolvedEntry>,
        context: &EvaluationContext,
        with_trace: bool,
    ) -> (Vec<RuleResult>, Vec<RuleTrace>) {
        let context = Arc::new(context.clone());
        let mut handles = Vec::with_capacity(entries.len());

        for entry in &entries {
            let Some(rule) = entry.rule.clone() else {
                handles.push(None);
                continue;
            };
            // Waiting for a permit before spawning bounds the number of
            // concurrently running evaluations
            let permit = self.pool.clone().acquire_owned().await.ok();
            let evaluator = self.evaluator.clone();
            let context = context.clone();
            handles.push(Some(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                evaluate_condition(evaluator.as_ref(), &rule, &context, with_trace)
            })));
        }

        let mut results = Vec::with_capacity(entries.len());
        let mut traces = Vec::new();
        for (entry, handle) in entries.iter().zip(handles) {
            let Some(handle) = handle else {
                results.push(missing_rule(&entry.rule_id));
                continue;
            };
            match handle.await {
                Ok((result, trace)) => {
                    results.push(result);
                    traces.extend(trace);
                }
                Err(join_err) => {
                    tracing::error!(?join_err, rule = %entry.rule_id, "Rule evaluation task failed");
                    let mut result = missing_rule(&entry.rule_id);
                    if let Some(rule) = &entry.rule {
                        result.rule_name = rule.name.clone();
                        result.severity = rule.severity;
                    }
                    result.error = Some(format!("Evaluation task failed: {}", join_err));
                    results.push(result);
                }
            }
        }

        (results, traces)
    }
}

/// One triggered rule: its own message; several: "<group>: m1 AND m2"
fn combined_message(group: &RuleGroup, results: &[RuleResult]) -> Option<String> {
    let messages: Vec<&str> = results
        .iter()
        .filter(|r| r.triggered && !r.message.is_empty())
        .map(|r| r.message.as_str())
        .collect();

    match messages.len() {
        0 => None,
        1 => Some(messages[0].to_string()),
        _ => {
            let separator = format!(" {} ", group.operator);
            Some(format!("{}: {}", group.name, messages.join(&separator)))
        }
    }
}
