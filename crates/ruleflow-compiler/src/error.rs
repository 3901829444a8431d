//! Configuration error types

use ruleflow_core::CoreError;
use thiserror::Error;

/// Error raised while loading configuration. Any of these aborts the whole
/// load; no partial configuration is returned.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Reference '{name}' not found (locator: {locator})")]
    ReferenceNotFound { name: String, locator: String },

    #[error("Reference '{name}' is malformed (locator: {locator}): {message}")]
    MalformedReference {
        name: String,
        locator: String,
        message: String,
    },

    #[error("Reference '{name}' resolves an already loaded source (locator: {locator})")]
    CircularReference { name: String, locator: String },

    #[error("Failed to read '{locator}': {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration is invalid: {}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),
}

/// A single problem found while validating the merged configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    #[error("{entity} is missing required field '{field}'")]
    MissingField { entity: String, field: &'static str },

    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{owner} references unknown rule '{rule_id}'")]
    UnknownRule { owner: String, rule_id: String },

    #[error("Step '{step}' references unknown rule group '{group}'")]
    UnknownRuleGroup { step: String, group: String },

    #[error("Step '{step}' references unknown rule chain '{chain}'")]
    UnknownRuleChain { step: String, chain: String },

    #[error("Rule chain '{chain}' is invalid: {message}")]
    InvalidChain { chain: String, message: String },

    #[error("Pipeline '{pipeline}' is invalid: {source}")]
    Pipeline {
        pipeline: String,
        #[source]
        source: CoreError,
    },

    #[error("Pipeline '{pipeline}' retry policy needs at least one attempt")]
    InvalidRetryPolicy { pipeline: String },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// Validation issues, if this is a validation failure
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ConfigError::Validation(issues) => issues,
            _ => &[],
        }
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
