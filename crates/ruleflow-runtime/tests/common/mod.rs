//! Common test utilities for runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ruleflow_core::Value;
use ruleflow_runtime::{
    DataError, DataResult, DataSink, DataSource, EvaluationContext, ExpressionError,
    ExpressionEvaluator,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Evaluator answering from a fixed table and recording every call.
///
/// Expressions not in the table resolve as variables from the context;
/// anything else is an unknown variable.
#[derive(Default)]
pub struct ScriptedEvaluator {
    answers: HashMap<String, Result<Value, ExpressionError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, expression: &str, value: impl Into<Value>) -> Self {
        self.answers.insert(expression.to_string(), Ok(value.into()));
        self
    }

    pub fn fail(mut self, expression: &str) -> Self {
        self.answers.insert(
            expression.to_string(),
            Err(ExpressionError::Evaluation(format!("{} exploded", expression))),
        );
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Expressions evaluated so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl ExpressionEvaluator for ScriptedEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        context: &EvaluationContext,
    ) -> Result<Value, ExpressionError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(expression.to_string());

        if let Some(answer) = self.answers.get(expression) {
            return answer.clone();
        }
        context
            .get(expression)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownVariable(expression.to_string()))
    }
}

/// Build an object record from field pairs
pub fn record(pairs: &[(&str, Value)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

/// Source failing its first `failures` reads
pub struct FlakySource {
    failures: usize,
    calls: AtomicUsize,
    records: Vec<Value>,
}

impl FlakySource {
    pub fn new(failures: usize, records: Vec<Value>) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
            records,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for FlakySource {
    async fn read(
        &self,
        _operation: &str,
        _params: &HashMap<String, Value>,
    ) -> DataResult<Vec<Value>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DataError::Unavailable(format!("attempt {} refused", call + 1)));
        }
        Ok(self.records.clone())
    }
}

/// Source that takes `delay` to answer
pub struct SlowSource {
    delay: Duration,
    records: Vec<Value>,
}

impl SlowSource {
    pub fn new(delay: Duration, records: Vec<Value>) -> Self {
        Self { delay, records }
    }
}

#[async_trait]
impl DataSource for SlowSource {
    async fn read(
        &self,
        _operation: &str,
        _params: &HashMap<String, Value>,
    ) -> DataResult<Vec<Value>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.records.clone())
    }
}

/// Sink that always fails
pub struct BrokenSink;

#[async_trait]
impl DataSink for BrokenSink {
    async fn write(&self, _operation: &str, _record: &Value) -> DataResult<()> {
        Err(DataError::Unavailable("sink is down".to_string()))
    }
}

/// Sink rejecting records whose `field` is null or missing
pub struct StrictSink {
    field: String,
    accepted: Mutex<Vec<Value>>,
}

impl StrictSink {
    pub fn requiring(field: &str) -> Self {
        Self {
            field: field.to_string(),
            accepted: Mutex::new(Vec::new()),
        }
    }

    pub fn accepted(&self) -> Vec<Value> {
        self.accepted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl DataSink for StrictSink {
    async fn write(&self, _operation: &str, record: &Value) -> DataResult<()> {
        match record.get(&self.field) {
            Some(value) if !value.is_null() => {
                self.accepted
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(record.clone());
                Ok(())
            }
            _ => Err(DataError::DataIntegrity(format!("{} is required", self.field))),
        }
    }
}

/// Sink recording the order in which steps reached it
#[derive(Default)]
pub struct OrderSink {
    seen: Mutex<Vec<String>>,
}

impl OrderSink {
    pub fn seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl DataSink for OrderSink {
    async fn write(&self, operation: &str, _record: &Value) -> DataResult<()> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(operation.to_string());
        Ok(())
    }
}
