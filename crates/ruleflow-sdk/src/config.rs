//! Engine configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory that relative reference locators are resolved against
    pub base_dir: PathBuf,

    /// Worker pool size; defaults to the number of available cores
    pub max_concurrency: Option<usize>,

    /// Applied to pipelines that declare no timeout of their own
    pub pipeline_timeout_ms: Option<u64>,

    /// Embedded documents, consulted when a locator is not a file
    pub resources: HashMap<String, String>,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            max_concurrency: None,
            pipeline_timeout_ms: None,
            resources: HashMap::new(),
        }
    }

    /// Parse settings from YAML; missing keys take their defaults
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Embed a document under a resource name
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.resources.insert(name.into(), content.into());
        self
    }

    pub fn pipeline_timeout(&self) -> Option<Duration> {
        self.pipeline_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.base_dir, PathBuf::from("."));
        assert!(config.max_concurrency.is_none());
        assert!(config.pipeline_timeout().is_none());
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let config = EngineConfig::from_yaml_str(
            r#"
base_dir: /etc/ruleflow
max_concurrency: 4
pipeline_timeout_ms: 2500
resources:
  rules/common.yaml: "rules: []"
"#,
        )
        .unwrap();

        assert_eq!(config.base_dir, PathBuf::from("/etc/ruleflow"));
        assert_eq!(config.max_concurrency, Some(4));
        assert_eq!(config.pipeline_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.resources.len(), 1);
    }

    #[test]
    fn test_partial_and_empty_yaml() {
        let config = EngineConfig::from_yaml_str("max_concurrency: 2").unwrap();
        assert_eq!(config.max_concurrency, Some(2));
        assert_eq!(config.base_dir, PathBuf::from("."));

        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::new());
        assert!(EngineConfig::from_yaml_str("max_concurrency: many").is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new()
            .with_base_dir("/srv/rules")
            .with_max_concurrency(8)
            .with_pipeline_timeout(Duration::from_secs(3))
            .with_resource("shared", "rules: []");

        assert_eq!(config.max_concurrency, Some(8));
        assert_eq!(config.pipeline_timeout_ms, Some(3000));
        assert_eq!(config.resources.get("shared").map(String::as_str), Some("rules: []"));
    }
}
