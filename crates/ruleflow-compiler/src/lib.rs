//! Ruleflow Compiler - configuration loading and validation
//!
//! Turns a set of cross-referencing configuration documents into one
//! validated [`Configuration`](ruleflow_core::Configuration):
//! 1. The root document is parsed
//! 2. Every rule reference, then every data-source reference, is loaded
//!    and merged (recursively, each locator at most once)
//! 3. The merged model is validated exactly once

pub mod error;
pub mod loader;
pub mod merge_resolver;
pub mod validator;

pub use error::{ConfigError, Result, ValidationIssue};
pub use loader::{
    DocumentParser, EmbeddedResources, FileSystemLocator, ResolvedResource, ResourceLocator,
    YamlDocumentParser,
};
pub use merge_resolver::MergeResolver;
pub use validator::{build_configuration, validate};
