//! Execution context
//!
//! One context per pipeline run. The initial input is read-only; each step
//! owns exactly one output key, its own name. Keys are written once, so the
//! backing store only needs thread-safe insert and lookup.

use crate::error::{Result, RuntimeError};
use crate::expression::EvaluationContext;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ruleflow_core::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Variable under which the record being processed is visible
pub const RECORD_VARIABLE: &str = "record";

/// Per-run shared store, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    input: Arc<HashMap<String, Value>>,
    outputs: Arc<DashMap<String, Value>>,
}

impl ExecutionContext {
    pub fn new(input: HashMap<String, Value>) -> Self {
        Self {
            input: Arc::new(input),
            outputs: Arc::new(DashMap::new()),
        }
    }

    pub fn input(&self) -> &HashMap<String, Value> {
        &self.input
    }

    /// Output written by a step, `None` when the step produced nothing
    pub fn output(&self, key: &str) -> Option<Value> {
        self.outputs.get(key).map(|entry| entry.value().clone())
    }

    pub fn has_output(&self, key: &str) -> bool {
        self.outputs.contains_key(key)
    }

    /// Write a step's output. Each key may be written once.
    pub fn insert_output(&self, key: impl Into<String>, value: Value) -> Result<()> {
        match self.outputs.entry(key.into()) {
            Entry::Occupied(entry) => Err(RuntimeError::DuplicateOutput(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Copy of every output written so far
    pub fn outputs(&self) -> HashMap<String, Value> {
        self.outputs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Variables for evaluating rules against one record.
    ///
    /// Starts from the run input; an object record's fields are laid over
    /// it, and the whole record is available as `record`.
    pub fn scope_for(&self, record: Option<&Value>) -> EvaluationContext {
        let mut scope: EvaluationContext = (*self.input).clone();
        if let Some(record) = record {
            if let Value::Object(fields) = record {
                scope.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            scope.insert(RECORD_VARIABLE.to_string(), record.clone());
        }
        scope
    }
}
