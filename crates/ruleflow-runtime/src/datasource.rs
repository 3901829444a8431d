//! Data source and sink capabilities
//!
//! Concrete adapters (databases, files, HTTP) live outside the engine. The
//! pipeline executor only sees these two traits, registered by name.
//! In-memory implementations are provided for embedding and tests.

use ruleflow_core::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Error reported by a source or sink
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// The record itself is unacceptable; loads skip it and carry on
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Data store unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{0}")]
    Other(String),
}

pub type DataResult<T> = std::result::Result<T, DataError>;

/// Readable data source
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    async fn read(&self, operation: &str, params: &HashMap<String, Value>)
        -> DataResult<Vec<Value>>;
}

/// Writable data sink
#[async_trait::async_trait]
pub trait DataSink: Send + Sync {
    async fn write(&self, operation: &str, record: &Value) -> DataResult<()>;
}

/// In-memory source returning fixed records per operation
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: HashMap<String, Vec<Value>>,
    default_records: Option<Vec<Value>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records returned for any operation without its own records
    pub fn with_records(mut self, records: Vec<Value>) -> Self {
        self.default_records = Some(records);
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>, records: Vec<Value>) -> Self {
        self.records.insert(operation.into(), records);
        self
    }
}

#[async_trait::async_trait]
impl DataSource for MemorySource {
    async fn read(
        &self,
        operation: &str,
        _params: &HashMap<String, Value>,
    ) -> DataResult<Vec<Value>> {
        self.records
            .get(operation)
            .or(self.default_records.as_ref())
            .cloned()
            .ok_or_else(|| DataError::UnsupportedOperation(operation.to_string()))
    }
}

/// In-memory sink collecting `(operation, record)` pairs
#[derive(Debug, Default)]
pub struct MemorySink {
    written: Mutex<Vec<(String, Value)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record written so far
    pub fn records(&self) -> Vec<Value> {
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn operations(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(op, _)| op.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DataSink for MemorySink {
    async fn write(&self, operation: &str, record: &Value) -> DataResult<()> {
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((operation.to_string(), record.clone()));
        Ok(())
    }
}
