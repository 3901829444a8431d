//! Rule definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule definition
///
/// A rule is an atomic named condition. The condition is an expression in
/// whatever language the injected evaluator understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule ID
    #[serde(default)]
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Condition expression
    #[serde(default)]
    pub condition: String,

    /// Message reported when the rule triggers
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub severity: Severity,

    /// Lower values are evaluated first
    #[serde(default)]
    pub priority: i32,
}

/// Rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "warning")]
    Warning,
    #[serde(alias = "info")]
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        f.write_str(name)
    }
}

impl Rule {
    /// Create a new rule
    pub fn new(id: impl Into<String>, name: impl Into<String>, condition: impl Into<String>) -> Self {
        Rule {
            id: id.into(),
            name: name.into(),
            description: None,
            condition: condition.into(),
            message: String::new(),
            severity: Severity::default(),
            priority: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
