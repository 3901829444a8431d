//! Merge resolver for cross-document configuration
//!
//! Loads the external references named by a root document and merges them
//! into one model before validating it. The order matters: validating a
//! single document on its own would reject forward references to rules that
//! only exist in another document.
//!
//! Resolution order for one pass:
//! 1. All rule references (including ones discovered inside referenced
//!    documents), in discovery order
//! 2. All data-source references, same rules
//! 3. Validation of the merged model, exactly once

use crate::error::{ConfigError, Result};
use crate::loader::{
    DocumentParser, FileSystemLocator, ResolvedResource, ResourceLocator, YamlDocumentParser,
};
use crate::validator;
use ruleflow_core::{ConfigDocument, Configuration, ExternalReference};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const ROOT_NAME: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    Rules,
    DataSources,
}

/// Merge resolver
pub struct MergeResolver {
    /// File system first, then alternates in registration order
    locators: Vec<Box<dyn ResourceLocator>>,

    parser: Box<dyn DocumentParser>,

    /// Resource keys resolved during the current pass
    visited: HashSet<String>,

    /// Resource keys in load order, for diagnostics
    loaded: Vec<String>,
}

impl MergeResolver {
    /// Create a resolver reading files relative to `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            locators: vec![Box::new(FileSystemLocator::new(base_dir))],
            parser: Box::new(YamlDocumentParser),
            visited: HashSet::new(),
            loaded: Vec::new(),
        }
    }

    /// Register an alternate locator, consulted after the file system
    pub fn with_locator(mut self, locator: impl ResourceLocator + 'static) -> Self {
        self.locators.push(Box::new(locator));
        self
    }

    pub fn with_parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Resource keys loaded by the last pass, root included
    pub fn loaded_sources(&self) -> &[String] {
        &self.loaded
    }

    /// Load the root document from a locator, merge and validate
    pub fn resolve_file(&mut self, locator: &str) -> Result<Configuration> {
        self.reset();
        let reference = ExternalReference::new(ROOT_NAME, locator);
        let root = self.load_reference(&reference)?;
        self.merge_and_build(root)
    }

    /// Parse an in-memory root document, merge and validate
    pub fn resolve_str(&mut self, content: &str) -> Result<Configuration> {
        self.reset();
        let root = self
            .parser
            .parse(content)
            .map_err(|message| ConfigError::MalformedReference {
                name: ROOT_NAME.to_string(),
                locator: "<inline>".to_string(),
                message,
            })?;
        self.merge_and_build(root)
    }

    /// Merge and validate an already parsed root document
    pub fn resolve_document(&mut self, root: ConfigDocument) -> Result<Configuration> {
        self.reset();
        self.merge_and_build(root)
    }

    /// Merge every reference reachable from `root` without validating.
    ///
    /// The returned document carries no references.
    pub fn merge(&mut self, root: ConfigDocument) -> Result<ConfigDocument> {
        let mut rule_refs: VecDeque<ExternalReference> = VecDeque::new();
        let mut source_refs: VecDeque<ExternalReference> = VecDeque::new();

        let ConfigDocument {
            metadata,
            rules,
            rule_groups,
            rule_chains,
            data_sources,
            pipeline,
            rule_refs: root_rule_refs,
            data_source_refs: root_source_refs,
        } = root;
        rule_refs.extend(root_rule_refs);
        source_refs.extend(root_source_refs);

        let mut merged = ConfigDocument {
            metadata,
            rules,
            rule_groups,
            rule_chains,
            data_sources,
            pipeline,
            rule_refs: Vec::new(),
            data_source_refs: Vec::new(),
        };

        // Rule references always drain before any data-source reference
        loop {
            let (reference, kind) = if let Some(r) = rule_refs.pop_front() {
                (r, ReferenceKind::Rules)
            } else if let Some(r) = source_refs.pop_front() {
                (r, ReferenceKind::DataSources)
            } else {
                break;
            };

            if !reference.enabled {
                debug!(reference = %reference.name, locator = %reference.source, "Skipping disabled reference");
                continue;
            }

            let mut document = self.load_reference(&reference)?;
            rule_refs.extend(std::mem::take(&mut document.rule_refs));
            source_refs.extend(std::mem::take(&mut document.data_source_refs));

            match kind {
                ReferenceKind::Rules => merge_rules(&mut merged, document, &reference),
                ReferenceKind::DataSources => merge_data_sources(&mut merged, document, &reference),
            }
        }

        Ok(merged)
    }

    fn merge_and_build(&mut self, root: ConfigDocument) -> Result<Configuration> {
        let merged = self.merge(root)?;
        info!(
            rules = merged.rules.len(),
            rule_groups = merged.rule_groups.len(),
            rule_chains = merged.rule_chains.len(),
            data_sources = merged.data_sources.len(),
            sources = self.loaded.len(),
            "Merged configuration, validating"
        );
        validator::build_configuration(merged)
    }

    fn reset(&mut self) {
        self.visited.clear();
        self.loaded.clear();
    }

    /// Locate, de-duplicate and parse one referenced document
    fn load_reference(&mut self, reference: &ExternalReference) -> Result<ConfigDocument> {
        let resource = self.locate(reference)?;

        if !self.visited.insert(resource.key.clone()) {
            return Err(ConfigError::CircularReference {
                name: reference.name.clone(),
                locator: reference.source.clone(),
            });
        }
        self.loaded.push(resource.key.clone());

        let document =
            self.parser
                .parse(&resource.content)
                .map_err(|message| ConfigError::MalformedReference {
                    name: reference.name.clone(),
                    locator: reference.source.clone(),
                    message,
                })?;

        debug!(reference = %reference.name, key = %resource.key, "Loaded reference");
        Ok(document)
    }

    fn locate(&self, reference: &ExternalReference) -> Result<ResolvedResource> {
        for locator in &self.locators {
            let found = locator
                .fetch(&reference.source)
                .map_err(|source| ConfigError::Io {
                    locator: reference.source.clone(),
                    source,
                })?;
            if let Some(resource) = found {
                debug!(locator = locator.name(), source = %reference.source, "Resolved reference");
                return Ok(resource);
            }
        }

        Err(ConfigError::ReferenceNotFound {
            name: reference.name.clone(),
            locator: reference.source.clone(),
        })
    }
}

fn merge_rules(merged: &mut ConfigDocument, document: ConfigDocument, reference: &ExternalReference) {
    if !document.data_sources.is_empty() || document.pipeline.is_some() {
        warn!(
            reference = %reference.name,
            "Rule reference carries data sources or a pipeline, ignoring them"
        );
    }
    merged.rules.extend(document.rules);
    merged.rule_groups.extend(document.rule_groups);
    merged.rule_chains.extend(document.rule_chains);
}

fn merge_data_sources(
    merged: &mut ConfigDocument,
    document: ConfigDocument,
    reference: &ExternalReference,
) {
    if !document.rules.is_empty()
        || !document.rule_groups.is_empty()
        || !document.rule_chains.is_empty()
        || document.pipeline.is_some()
    {
        warn!(
            reference = %reference.name,
            "Data-source reference carries rules or a pipeline, ignoring them"
        );
    }
    merged.data_sources.extend(document.data_sources);
}
