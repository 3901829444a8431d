//! Rule chain evaluator
//!
//! Accumulative chains walk their weighted rules in declared order and are
//! never parallelised, so the weighted sum is deterministic. Conditional
//! chains evaluate a trigger and run exactly one branch.

use super::rule::{evaluate_condition, missing_rule, timed_evaluate};
use crate::error::{Result, RuntimeError};
use crate::expression::{EvaluationContext, ExpressionEvaluator};
use crate::result::{
    AccumulationState, Branch, ChainOutcome, ConditionalState, RuleChainResult, RuleResult,
};
use ruleflow_core::{
    AccumulativeConfig, ChainPattern, ConditionalConfig, Configuration, RuleChain, RuleSelection,
    Value, WeightedRule,
};
use std::sync::Arc;
use std::time::Instant;

/// Decision reported when the final decision expression fails
pub const DECISION_ERROR: &str = "ERROR";

/// Decision reported when no final decision expression is configured
pub const DECISION_COMPLETED: &str = "ACCUMULATION_COMPLETED";

/// Rule chain evaluator
pub struct RuleChainEvaluator {
    config: Arc<Configuration>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl RuleChainEvaluator {
    pub fn new(config: Arc<Configuration>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self { config, evaluator }
    }

    /// Evaluate the chain registered under `chain_id`
    pub fn evaluate_by_id(
        &self,
        chain_id: &str,
        context: &EvaluationContext,
    ) -> Result<RuleChainResult> {
        let chain = self
            .config
            .rule_chain(chain_id)
            .ok_or_else(|| RuntimeError::UnknownRuleChain(chain_id.to_string()))?;
        Ok(self.evaluate(chain, context))
    }

    /// Evaluate a chain. Never fails: rule errors are recorded per rule.
    pub fn evaluate(&self, chain: &RuleChain, context: &EvaluationContext) -> RuleChainResult {
        let start = Instant::now();
        let (rule_results, outcome) = match &chain.pattern {
            ChainPattern::Accumulative(config) => self.accumulate(chain, config, context),
            ChainPattern::Conditional(config) => self.branch(chain, config, context),
        };

        RuleChainResult {
            chain_id: chain.id.clone(),
            rule_results,
            outcome,
            duration: start.elapsed(),
        }
    }

    fn accumulate(
        &self,
        chain: &RuleChain,
        config: &AccumulativeConfig,
        context: &EvaluationContext,
    ) -> (Vec<RuleResult>, ChainOutcome) {
        let mut state = AccumulationState::Init;
        let mut accumulator = config.initial_value;
        let mut scope = context.clone();
        scope.insert(config.accumulator_variable.clone(), Value::Number(accumulator));

        let selected = self.select_rules(chain, config, &scope);
        let mut results = Vec::with_capacity(selected.len());
        state = state.advance();

        for weighted in selected {
            let Some(rule) = self.config.rule(&weighted.rule_id) else {
                results.push(missing_rule(&weighted.rule_id));
                continue;
            };

            scope.insert(config.accumulator_variable.clone(), Value::Number(accumulator));
            let (outcome, duration) = timed_evaluate(self.evaluator.as_ref(), &rule.condition, &scope);

            let (contribution, value, error) = match outcome {
                Ok(value) => (value.to_contribution(), Some(value), None),
                Err(e) => {
                    tracing::warn!(
                        chain = %chain.id,
                        rule = %rule.id,
                        error = %e,
                        "Scoring rule failed, contributing nothing"
                    );
                    (0.0, None, Some(e.to_string()))
                }
            };
            accumulator += contribution * weighted.weight;

            tracing::debug!(
                chain = %chain.id,
                rule = %rule.id,
                contribution,
                weight = weighted.weight,
                accumulator,
                "Accumulated rule"
            );

            results.push(RuleResult {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                triggered: contribution != 0.0,
                message: rule.message.clone(),
                severity: rule.severity,
                duration,
                value,
                error,
            });
        }

        scope.insert(config.accumulator_variable.clone(), Value::Number(accumulator));
        let decision = match &config.final_decision {
            None => Value::from(DECISION_COMPLETED),
            Some(expression) => match self.evaluator.evaluate(expression, &scope) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(chain = %chain.id, error = %e, "Final decision failed");
                    Value::from(DECISION_ERROR)
                }
            },
        };
        state = state.advance();

        (
            results,
            ChainOutcome::Accumulative {
                accumulator,
                decision,
                state,
            },
        )
    }

    /// Rules taking part in the accumulation, in declared order
    fn select_rules<'a>(
        &self,
        chain: &RuleChain,
        config: &'a AccumulativeConfig,
        scope: &EvaluationContext,
    ) -> Vec<&'a WeightedRule> {
        let at_least = |threshold: f64| -> Vec<&'a WeightedRule> {
            config.rules.iter().filter(|r| r.weight >= threshold).collect()
        };

        match &config.selection {
            RuleSelection::All => config.rules.iter().collect(),
            RuleSelection::WeightThreshold { threshold } => at_least(*threshold),
            RuleSelection::TopWeighted { max_rules } => {
                let mut ranked: Vec<usize> = (0..config.rules.len()).collect();
                ranked.sort_by(|&a, &b| {
                    config.rules[b]
                        .weight
                        .total_cmp(&config.rules[a].weight)
                        .then(a.cmp(&b))
                });
                ranked.truncate(*max_rules);
                ranked.sort_unstable();
                ranked.into_iter().map(|i| &config.rules[i]).collect()
            }
            RuleSelection::DynamicThreshold { expression } => {
                match self.evaluator.evaluate(expression, scope) {
                    Ok(Value::Number(threshold)) => at_least(threshold),
                    Ok(other) => {
                        tracing::warn!(
                            chain = %chain.id,
                            value = %other,
                            "Dynamic threshold is not a number, selecting all rules"
                        );
                        config.rules.iter().collect()
                    }
                    Err(e) => {
                        tracing::warn!(
                            chain = %chain.id,
                            error = %e,
                            "Dynamic threshold failed, selecting all rules"
                        );
                        config.rules.iter().collect()
                    }
                }
            }
        }
    }

    fn branch(
        &self,
        chain: &RuleChain,
        config: &ConditionalConfig,
        context: &EvaluationContext,
    ) -> (Vec<RuleResult>, ChainOutcome) {
        let mut state = ConditionalState::Init;
        let mut results = Vec::new();

        // A failing trigger takes the no-trigger branch
        let triggered = match self.config.rule(&config.trigger_rule) {
            Some(rule) => {
                let (result, _) = evaluate_condition(self.evaluator.as_ref(), rule, context, false);
                let triggered = result.triggered;
                results.push(result);
                triggered
            }
            None => {
                results.push(missing_rule(&config.trigger_rule));
                false
            }
        };
        state = state.advance();

        let (branch, rule_ids) = if triggered {
            (Branch::OnTrigger, &config.on_trigger)
        } else {
            (Branch::OnNoTrigger, &config.on_no_trigger)
        };
        tracing::debug!(chain = %chain.id, triggered, ?branch, "Trigger evaluated");

        for rule_id in rule_ids {
            let result = match self.config.rule(rule_id) {
                Some(rule) => evaluate_condition(self.evaluator.as_ref(), rule, context, false).0,
                None => missing_rule(rule_id),
            };
            results.push(result);
        }
        state = state.advance();

        (
            results,
            ChainOutcome::Conditional {
                triggered,
                branch,
                state,
            },
        )
    }
}
