//! Builder for [`Engine`]

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{Result, SdkError};
use ruleflow_compiler::{EmbeddedResources, MergeResolver};
use ruleflow_core::ConfigDocument;
use ruleflow_runtime::{DataSink, DataSource, ExpressionEvaluator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Where the root configuration document comes from
enum RootDocument {
    File(String),
    Content(String),
    Document(ConfigDocument),
}

/// Builder for [`Engine`]
///
/// # Example
///
/// ```rust,ignore
/// use ruleflow_sdk::{EngineBuilder, EngineConfig, MemorySink, MemorySource};
///
/// let engine = EngineBuilder::new()
///     .with_config(EngineConfig::new().with_base_dir("config"))
///     .with_root_file("onboarding.yaml")
///     .with_evaluator(my_evaluator)
///     .with_source("applicants", MemorySource::new().with_records(records))
///     .with_sink("approved", MemorySink::new())
///     .build()?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    root: Option<RootDocument>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    sources: HashMap<String, Arc<dyn DataSource>>,
    sinks: HashMap<String, Arc<dyn DataSink>>,
}

impl EngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: EngineConfig::new(),
            root: None,
            evaluator: None,
            sources: HashMap::new(),
            sinks: HashMap::new(),
        }
    }

    /// Replace the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    // ========== Root document ==========

    /// Load the root document from a locator (file under `base_dir`, or an
    /// embedded resource)
    pub fn with_root_file(mut self, locator: impl Into<String>) -> Self {
        self.root = Some(RootDocument::File(locator.into()));
        self
    }

    /// Use in-memory YAML as the root document
    pub fn with_root_content(mut self, content: impl Into<String>) -> Self {
        self.root = Some(RootDocument::Content(content.into()));
        self
    }

    /// Use an already built document as the root
    pub fn with_root_document(mut self, document: ConfigDocument) -> Self {
        self.root = Some(RootDocument::Document(document));
        self
    }

    /// Embed a document that references may point at
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.config.resources.insert(name.into(), content.into());
        self
    }

    // ========== Capabilities ==========

    pub fn with_evaluator(self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.with_shared_evaluator(Arc::new(evaluator))
    }

    pub fn with_shared_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Register a data source for extract steps
    pub fn with_source(mut self, name: impl Into<String>, source: impl DataSource + 'static) -> Self {
        self.sources.insert(name.into(), Arc::new(source));
        self
    }

    pub fn with_shared_source(mut self, name: impl Into<String>, source: Arc<dyn DataSource>) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    /// Register a data sink for load and audit steps
    pub fn with_sink(mut self, name: impl Into<String>, sink: impl DataSink + 'static) -> Self {
        self.sinks.insert(name.into(), Arc::new(sink));
        self
    }

    pub fn with_shared_sink(mut self, name: impl Into<String>, sink: Arc<dyn DataSink>) -> Self {
        self.sinks.insert(name.into(), sink);
        self
    }

    // ========== Execution settings ==========

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = Some(max);
        self
    }

    pub fn with_pipeline_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_pipeline_timeout(timeout);
        self
    }

    /// Resolve the root document and build the engine.
    ///
    /// References are merged and the result validated once; any
    /// configuration error aborts the build.
    pub fn build(self) -> Result<Engine> {
        let evaluator = self.evaluator.ok_or(SdkError::MissingEvaluator)?;
        let root = self.root.ok_or(SdkError::MissingRoot)?;

        let mut resolver = MergeResolver::new(self.config.base_dir.clone());
        if !self.config.resources.is_empty() {
            let resources = self
                .config
                .resources
                .iter()
                .fold(EmbeddedResources::new(), |resources, (name, content)| {
                    resources.with_resource(name, content.clone())
                });
            resolver = resolver.with_locator(resources);
        }

        let configuration = match root {
            RootDocument::File(locator) => resolver.resolve_file(&locator)?,
            RootDocument::Content(content) => resolver.resolve_str(&content)?,
            RootDocument::Document(document) => resolver.resolve_document(document)?,
        };

        tracing::info!(
            rules = configuration.rule_count(),
            rule_groups = configuration.rule_group_count(),
            rule_chains = configuration.rule_chain_count(),
            documents = resolver.loaded_sources().len(),
            "Engine configuration loaded"
        );

        Ok(Engine::new(
            Arc::new(configuration),
            evaluator,
            self.sources,
            self.sinks,
            &self.config,
            resolver.loaded_sources().to_vec(),
        ))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
