//! Configuration documents and external references
//!
//! A configuration is spread over several documents. The root document may
//! name external documents holding rules or data-source definitions; those
//! are loaded and merged before anything is validated.

use super::pipeline::PipelineDefinition;
use super::rule::Rule;
use super::rule_chain::RuleChain;
use super::rule_group::RuleGroup;
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// Named pointer to another configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalReference {
    /// Logical name, used in error messages
    pub name: String,

    /// Locator of the referenced document (path or resource name)
    pub source: String,

    /// Disabled references are skipped without any load attempt
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExternalReference {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        ExternalReference {
            name: name.into(),
            source: source.into(),
            enabled: true,
            description: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Data source definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDefinition {
    #[serde(default)]
    pub name: String,

    /// Adapter type, e.g. `database` or `file`
    #[serde(rename = "type", default)]
    pub source_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One parsed configuration document, before merging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfigDocument {
    #[serde(default)]
    pub metadata: DocumentMetadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_groups: Vec<RuleGroup>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_chains: Vec<RuleChain>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<DataSourceDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<PipelineDefinition>,

    /// References to documents contributing rules, groups and chains
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_refs: Vec<ExternalReference>,

    /// References to documents contributing data sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_source_refs: Vec<ExternalReference>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_references(&self) -> bool {
        !self.rule_refs.is_empty() || !self.data_source_refs.is_empty()
    }
}
