//! Rule group definitions
//!
//! A rule group combines rules with AND/OR logic. Each entry references a
//! rule by id; the reference is only checked once the whole configuration
//! has been merged.

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

/// Rule group definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub operator: GroupOperator,

    /// Stop as soon as the outcome is decided (defaults to true)
    #[serde(default = "default_true")]
    pub stop_on_first_failure: bool,

    #[serde(default)]
    pub parallel_execution: bool,

    /// Evaluate every rule and record a full trace
    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default)]
    pub rules: Vec<RuleGroupEntry>,
}

/// Logical operator of a rule group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupOperator::And => f.write_str("AND"),
            GroupOperator::Or => f.write_str("OR"),
        }
    }
}

/// Reference from a group to a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroupEntry {
    pub rule_id: String,

    /// Overrides the rule's own priority inside this group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, operator: GroupOperator) -> Self {
        RuleGroup {
            id: id.into(),
            name: name.into(),
            description: None,
            operator,
            stop_on_first_failure: true,
            parallel_execution: false,
            debug_mode: false,
            rules: Vec::new(),
        }
    }

    /// Add a rule reference
    pub fn add_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rules.push(RuleGroupEntry::new(rule_id));
        self
    }

    pub fn add_entry(mut self, entry: RuleGroupEntry) -> Self {
        self.rules.push(entry);
        self
    }

    pub fn with_stop_on_first_failure(mut self, stop: bool) -> Self {
        self.stop_on_first_failure = stop;
        self
    }

    pub fn with_parallel_execution(mut self, parallel: bool) -> Self {
        self.parallel_execution = parallel;
        self
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    /// Whether evaluation may stop before every rule has run.
    ///
    /// Debug mode and parallel execution both require a full evaluation.
    pub fn short_circuits(&self) -> bool {
        self.stop_on_first_failure && !self.debug_mode && !self.runs_in_parallel()
    }

    /// Parallel evaluation only kicks in for more than one enabled rule
    pub fn runs_in_parallel(&self) -> bool {
        self.parallel_execution && self.enabled_entries().count() > 1
    }

    pub fn enabled_entries(&self) -> impl Iterator<Item = &RuleGroupEntry> {
        self.rules.iter().filter(|entry| entry.enabled)
    }
}

impl RuleGroupEntry {
    pub fn new(rule_id: impl Into<String>) -> Self {
        RuleGroupEntry {
            rule_id: rule_id.into(),
            priority: None,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
