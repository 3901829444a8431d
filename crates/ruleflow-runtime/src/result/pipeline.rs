//! Pipeline execution results

use chrono::{DateTime, Utc};
use ruleflow_core::{StepType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Step lifecycle: Pending -> Running -> Succeeded | Failed | Skipped.
/// A failed attempt goes back to Running while retries remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Skipped
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepState::Pending => "PENDING",
            StepState::Running => "RUNNING",
            StepState::Succeeded => "SUCCEEDED",
            StepState::Failed => "FAILED",
            StepState::Skipped => "SKIPPED",
        };
        f.write_str(name)
    }
}

/// Final state of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub step_type: StepType,
    pub state: StepState,

    /// Attempts made, 0 for skipped steps
    pub attempts: u32,

    pub optional: bool,
    pub duration: Duration,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One state transition in the execution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub step: String,
    pub state: StepState,
    pub timestamp: DateTime<Utc>,

    /// Time spent in the attempt that ended with this transition
    pub duration: Duration,

    pub attempt: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregated outcome of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExecutionResult {
    pub execution_id: Uuid,
    pub pipeline: String,

    /// True iff no non-optional step failed and the run did not time out
    pub overall_success: bool,

    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,

    /// Step results in topological order
    pub steps: Vec<StepResult>,

    /// Ordered state transitions
    pub log: Vec<ExecutionLogEntry>,

    /// Failures downgraded to warnings (optional steps, absent inputs)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Outputs of the steps that produced one
    pub outputs: HashMap<String, Value>,

    pub timed_out: bool,
    pub duration: Duration,
}

impl PipelineExecutionResult {
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn state_of(&self, name: &str) -> Option<StepState> {
        self.step(name).map(|s| s.state)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Log entries of one step, in order
    pub fn log_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ExecutionLogEntry> {
        self.log.iter().filter(move |entry| entry.step == name)
    }
}
