//! Rule chain definitions
//!
//! Two chain patterns exist:
//! - Accumulative: weighted scoring over an ordered list of rules, finished
//!   by an optional decision expression.
//! - Conditional: one trigger rule picks which of two rule lists runs.

use serde::{Deserialize, Serialize};

/// Rule chain definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleChain {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub pattern: ChainPattern,
}

/// Chain pattern with its pattern-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum ChainPattern {
    Accumulative(AccumulativeConfig),
    Conditional(ConditionalConfig),
}

fn default_accumulator() -> String {
    "totalScore".to_string()
}

/// Weighted scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulativeConfig {
    /// Name under which the running total is visible to expressions
    #[serde(default = "default_accumulator")]
    pub accumulator_variable: String,

    #[serde(default)]
    pub initial_value: f64,

    #[serde(default)]
    pub rules: Vec<WeightedRule>,

    /// Expression producing the terminal decision from the final total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<String>,

    #[serde(default)]
    pub selection: RuleSelection,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedRule {
    pub rule_id: String,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Which weighted rules take part in an accumulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RuleSelection {
    #[default]
    All,
    /// Keep rules whose weight is at least `threshold`
    WeightThreshold { threshold: f64 },
    /// Keep the `max_rules` heaviest rules
    TopWeighted { max_rules: usize },
    /// Like `WeightThreshold`, with the threshold computed by an expression
    DynamicThreshold { expression: String },
}

/// Trigger branching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalConfig {
    pub trigger_rule: String,

    #[serde(default)]
    pub on_trigger: Vec<String>,

    #[serde(default)]
    pub on_no_trigger: Vec<String>,
}

impl RuleChain {
    pub fn accumulative(
        id: impl Into<String>,
        name: impl Into<String>,
        config: AccumulativeConfig,
    ) -> Self {
        RuleChain {
            id: id.into(),
            name: name.into(),
            description: None,
            pattern: ChainPattern::Accumulative(config),
        }
    }

    pub fn conditional(
        id: impl Into<String>,
        name: impl Into<String>,
        config: ConditionalConfig,
    ) -> Self {
        RuleChain {
            id: id.into(),
            name: name.into(),
            description: None,
            pattern: ChainPattern::Conditional(config),
        }
    }

    /// Every rule id the chain refers to, in declaration order
    pub fn referenced_rules(&self) -> Vec<&str> {
        match &self.pattern {
            ChainPattern::Accumulative(config) => {
                config.rules.iter().map(|r| r.rule_id.as_str()).collect()
            }
            ChainPattern::Conditional(config) => std::iter::once(config.trigger_rule.as_str())
                .chain(config.on_trigger.iter().map(String::as_str))
                .chain(config.on_no_trigger.iter().map(String::as_str))
                .collect(),
        }
    }
}

impl AccumulativeConfig {
    pub fn new(accumulator_variable: impl Into<String>) -> Self {
        AccumulativeConfig {
            accumulator_variable: accumulator_variable.into(),
            initial_value: 0.0,
            rules: Vec::new(),
            final_decision: None,
            selection: RuleSelection::All,
        }
    }

    pub fn with_initial_value(mut self, value: f64) -> Self {
        self.initial_value = value;
        self
    }

    pub fn add_rule(mut self, rule_id: impl Into<String>, weight: f64) -> Self {
        self.rules.push(WeightedRule {
            rule_id: rule_id.into(),
            weight,
        });
        self
    }

    pub fn with_final_decision(mut self, expression: impl Into<String>) -> Self {
        self.final_decision = Some(expression.into());
        self
    }

    pub fn with_selection(mut self, selection: RuleSelection) -> Self {
        self.selection = selection;
        self
    }
}

impl Default for AccumulativeConfig {
    fn default() -> Self {
        Self::new(default_accumulator())
    }
}

impl ConditionalConfig {
    pub fn new(trigger_rule: impl Into<String>) -> Self {
        ConditionalConfig {
            trigger_rule: trigger_rule.into(),
            on_trigger: Vec::new(),
            on_no_trigger: Vec::new(),
        }
    }

    pub fn on_trigger(mut self, rule_id: impl Into<String>) -> Self {
        self.on_trigger.push(rule_id.into());
        self
    }

    pub fn on_no_trigger(mut self, rule_id: impl Into<String>) -> Self {
        self.on_no_trigger.push(rule_id.into());
        self
    }
}
