//! Rule, rule group and rule chain results

use ruleflow_core::{Severity, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of evaluating one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,

    /// Condition held (for scoring rules: contributed a non-zero amount)
    pub triggered: bool,

    pub message: String,
    pub severity: Severity,
    pub duration: Duration,

    /// Raw value returned by the evaluator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Evaluation error; the rule counts as not triggered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Debug trace for one rule evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrace {
    pub rule_id: String,

    /// Variables the rule was evaluated against
    pub input: HashMap<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration: Duration,
}

/// Outcome of evaluating a rule group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroupResult {
    pub group_id: String,
    pub passed: bool,

    /// Number of rules actually evaluated
    pub evaluated: usize,

    /// Per-rule outcomes, in evaluation (priority) order
    pub rule_results: Vec<RuleResult>,

    /// Combined message of the triggered rules, when the group passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Full trace, only filled in debug mode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<RuleTrace>,

    pub duration: Duration,
}

/// Accumulative chain states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccumulationState {
    Init,
    Accumulating,
    Finalized,
}

/// Conditional chain states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionalState {
    Init,
    TriggerEvaluated,
    BranchExecuted,
}

impl AccumulationState {
    /// Next state; `Finalized` is terminal
    pub fn advance(self) -> Self {
        match self {
            AccumulationState::Init => AccumulationState::Accumulating,
            AccumulationState::Accumulating | AccumulationState::Finalized => {
                AccumulationState::Finalized
            }
        }
    }
}

impl ConditionalState {
    /// Next state; `BranchExecuted` is terminal
    pub fn advance(self) -> Self {
        match self {
            ConditionalState::Init => ConditionalState::TriggerEvaluated,
            ConditionalState::TriggerEvaluated | ConditionalState::BranchExecuted => {
                ConditionalState::BranchExecuted
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    OnTrigger,
    OnNoTrigger,
}

/// Pattern-specific part of a chain result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum ChainOutcome {
    Accumulative {
        accumulator: f64,
        decision: Value,
        state: AccumulationState,
    },
    Conditional {
        triggered: bool,
        branch: Branch,
        state: ConditionalState,
    },
}

/// Outcome of evaluating a rule chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleChainResult {
    pub chain_id: String,

    /// Per-rule outcomes in execution order (trigger first for conditional chains)
    pub rule_results: Vec<RuleResult>,

    pub outcome: ChainOutcome,
    pub duration: Duration,
}

impl RuleChainResult {
    /// Terminal value of the chain: the decision of an accumulative chain,
    /// the trigger result of a conditional one
    pub fn decision(&self) -> Value {
        match &self.outcome {
            ChainOutcome::Accumulative { decision, .. } => decision.clone(),
            ChainOutcome::Conditional { triggered, .. } => Value::Bool(*triggered),
        }
    }

    pub fn accumulator(&self) -> Option<f64> {
        match self.outcome {
            ChainOutcome::Accumulative { accumulator, .. } => Some(accumulator),
            ChainOutcome::Conditional { .. } => None,
        }
    }

    pub fn branch(&self) -> Option<Branch> {
        match self.outcome {
            ChainOutcome::Conditional { branch, .. } => Some(branch),
            ChainOutcome::Accumulative { .. } => None,
        }
    }
}
