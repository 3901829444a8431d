//! Resource lookup and document parsing
//!
//! A locator string is resolved by asking each registered
//! [`ResourceLocator`] in turn. The file system is always asked first; any
//! further locators (embedded resources, for instance) are consulted only
//! when the file system has nothing under that name.

use ruleflow_core::ConfigDocument;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A resource located by a [`ResourceLocator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    /// Canonical identity of the resource, used for repeat detection
    pub key: String,

    pub content: String,
}

/// Source of configuration documents
pub trait ResourceLocator: Send + Sync {
    /// Locator name, for logging
    fn name(&self) -> &str;

    /// Fetch a resource. `Ok(None)` means this locator does not have it.
    fn fetch(&self, locator: &str) -> io::Result<Option<ResolvedResource>>;
}

/// Reads documents from disk, relative to a base directory
#[derive(Debug, Clone)]
pub struct FileSystemLocator {
    base_dir: PathBuf,
}

impl FileSystemLocator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn full_path(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl ResourceLocator for FileSystemLocator {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn fetch(&self, locator: &str) -> io::Result<Option<ResolvedResource>> {
        let path = self.full_path(locator);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let key = fs::canonicalize(&path).unwrap_or(path);

        Ok(Some(ResolvedResource {
            key: key.display().to_string(),
            content,
        }))
    }
}

/// In-memory resources, looked up by name
///
/// Names are matched after stripping a leading `/` and any `resource:`
/// prefix, so `resource:/rules/common.yaml` and `rules/common.yaml` are the
/// same resource.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    resources: HashMap<String, String>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, name: impl AsRef<str>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&mut self, name: impl AsRef<str>, content: impl Into<String>) {
        self.resources
            .insert(normalize_resource_name(name.as_ref()), content.into());
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn normalize_resource_name(name: &str) -> String {
    let name = name.trim();
    let name = name.strip_prefix("resource:").unwrap_or(name);
    let name = name.trim_start_matches('/');
    name.strip_prefix("./").unwrap_or(name).to_string()
}

impl ResourceLocator for EmbeddedResources {
    fn name(&self) -> &str {
        "embedded"
    }

    fn fetch(&self, locator: &str) -> io::Result<Option<ResolvedResource>> {
        let name = normalize_resource_name(locator);
        Ok(self.resources.get(&name).map(|content| ResolvedResource {
            key: format!("resource:{}", name),
            content: content.clone(),
        }))
    }
}

/// Turns document text into a [`ConfigDocument`]
pub trait DocumentParser: Send + Sync {
    fn parse(&self, content: &str) -> Result<ConfigDocument, String>;
}

/// YAML document parser
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDocumentParser;

impl DocumentParser for YamlDocumentParser {
    fn parse(&self, content: &str) -> Result<ConfigDocument, String> {
        if content.trim().is_empty() {
            return Ok(ConfigDocument::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }
}
