//! Pipeline definitions
//!
//! A pipeline is a set of typed steps connected by `depends_on` edges. Each
//! step writes at most one entry into the execution context, keyed by its
//! own name, and reads upstream entries by name.

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub execution_mode: ExecutionMode,

    #[serde(default)]
    pub error_handling: ErrorHandling,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Whole-run timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    #[default]
    #[serde(alias = "sequential")]
    Sequential,
    #[serde(alias = "parallel")]
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorHandling {
    #[default]
    #[serde(alias = "stop_on_error")]
    StopOnError,
    #[serde(alias = "continue_on_error")]
    ContinueOnError,
}

fn default_max_attempts() -> u32 {
    1
}

/// Fixed-delay retry policy, applied to every step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: default_max_attempts(),
            delay_ms: 0,
        }
    }
}

/// A single pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// An optional step's failure is downgraded to a warning
    #[serde(default)]
    pub optional: bool,

    #[serde(flatten)]
    pub kind: StepKind,
}

/// Step type with its type-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Extract {
        source: String,
        #[serde(default)]
        operation: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        params: HashMap<String, Value>,
    },
    Transform {
        /// Upstream entry to read, defaults to the first dependency
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        operation: TransformOperation,
    },
    Load {
        sink: String,
        #[serde(default)]
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },
    Audit {
        sink: String,
        #[serde(default)]
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
    },
}

fn default_result_field() -> String {
    "rule_result".to_string()
}

/// Operation applied by a transform step to each input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformOperation {
    /// Evaluate a rule group per record
    RuleGroup {
        group: String,
        /// Drop failing records instead of annotating them
        #[serde(default)]
        filter: bool,
        #[serde(default = "default_result_field")]
        result_field: String,
    },
    /// Evaluate a rule chain per record
    RuleChain {
        chain: String,
        #[serde(default = "default_result_field")]
        result_field: String,
    },
    /// Rename fields, target name -> source name
    FieldMapping {
        mappings: BTreeMap<String, String>,
        #[serde(default)]
        include_unmapped: bool,
    },
}

/// Plain step type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Extract,
    Transform,
    Load,
    Audit,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepType::Extract => "EXTRACT",
            StepType::Transform => "TRANSFORM",
            StepType::Load => "LOAD",
            StepType::Audit => "AUDIT",
        };
        f.write_str(name)
    }
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        PipelineDefinition {
            name: name.into(),
            description: None,
            execution_mode: ExecutionMode::default(),
            error_handling: ErrorHandling::default(),
            retry_policy: RetryPolicy::default(),
            timeout_ms: None,
            steps: Vec::new(),
        }
    }

    pub fn add_step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn with_error_handling(mut self, policy: ErrorHandling) -> Self {
        self.error_handling = policy;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn step(&self, name: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.name == name)
    }
}

impl PipelineStep {
    pub fn new(name: impl Into<String>, kind: StepKind) -> Self {
        PipelineStep {
            name: name.into(),
            depends_on: Vec::new(),
            optional: false,
            kind,
        }
    }

    pub fn extract(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Extract {
                source: source.into(),
                operation: String::new(),
                params: HashMap::new(),
            },
        )
    }

    pub fn transform(name: impl Into<String>, operation: TransformOperation) -> Self {
        Self::new(
            name,
            StepKind::Transform {
                input: None,
                operation,
            },
        )
    }

    pub fn load(name: impl Into<String>, sink: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Load {
                sink: sink.into(),
                operation: String::new(),
                input: None,
            },
        )
    }

    pub fn audit(name: impl Into<String>, sink: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::Audit {
                sink: sink.into(),
                operation: String::new(),
                input: None,
            },
        )
    }

    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        self.depends_on.push(step.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the source/sink operation name (no-op for transforms)
    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        match &mut self.kind {
            StepKind::Extract { operation, .. }
            | StepKind::Load { operation, .. }
            | StepKind::Audit { operation, .. } => *operation = op.into(),
            StepKind::Transform { .. } => {}
        }
        self
    }

    /// Set the upstream entry to read (no-op for extracts)
    pub fn with_input(mut self, step: impl Into<String>) -> Self {
        match &mut self.kind {
            StepKind::Transform { input, .. }
            | StepKind::Load { input, .. }
            | StepKind::Audit { input, .. } => *input = Some(step.into()),
            StepKind::Extract { .. } => {}
        }
        self
    }

    pub fn step_type(&self) -> StepType {
        match self.kind {
            StepKind::Extract { .. } => StepType::Extract,
            StepKind::Transform { .. } => StepType::Transform,
            StepKind::Load { .. } => StepType::Load,
            StepKind::Audit { .. } => StepType::Audit,
        }
    }

    /// Context entry this step reads: explicit input, else first dependency
    pub fn input_key(&self) -> Option<&str> {
        let explicit = match &self.kind {
            StepKind::Extract { .. } => return None,
            StepKind::Transform { input, .. }
            | StepKind::Load { input, .. }
            | StepKind::Audit { input, .. } => input.as_deref(),
        };
        explicit.or_else(|| self.depends_on.first().map(String::as_str))
    }

    /// Audit steps never halt the pipeline
    pub fn is_optional(&self) -> bool {
        self.optional || self.step_type() == StepType::Audit
    }
}
