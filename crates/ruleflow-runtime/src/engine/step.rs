//! Step handlers
//!
//! One handler per step type. Each handler reads upstream entries from the
//! execution context and returns the value to store under the step's own
//! name; the scheduler does the storing.

use super::rule_chain::RuleChainEvaluator;
use super::rule_group::RuleGroupEvaluator;
use crate::context::ExecutionContext;
use crate::datasource::{DataError, DataSink, DataSource};
use crate::error::{Result, RuntimeError};
use ruleflow_core::{Configuration, PipelineStep, StepKind, TransformOperation, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What a successful step attempt produced
#[derive(Debug, Default)]
pub(crate) struct StepOutput {
    /// Value stored under the step name, if any
    pub value: Option<Value>,
    pub warning: Option<String>,
}

impl StepOutput {
    fn value(value: Value) -> Self {
        Self {
            value: Some(value),
            warning: None,
        }
    }
}

/// Shared state for running steps of one pipeline
pub(crate) struct StepRunner {
    pub pipeline: String,
    pub config: Arc<Configuration>,
    pub groups: RuleGroupEvaluator,
    pub chains: RuleChainEvaluator,
    pub sources: HashMap<String, Arc<dyn DataSource>>,
    pub sinks: HashMap<String, Arc<dyn DataSink>>,
}

impl StepRunner {
    /// Run one attempt of a step
    pub async fn run(&self, step: &PipelineStep, context: &ExecutionContext) -> Result<StepOutput> {
        match &step.kind {
            StepKind::Extract {
                source,
                operation,
                params,
            } => self.extract(source, operation, params).await,
            StepKind::Transform { operation, .. } => self.transform(step, operation, context).await,
            StepKind::Load { sink, operation, .. } => {
                self.load(step, sink, operation, context).await
            }
            StepKind::Audit { sink, operation, .. } => {
                self.audit(step, sink, operation, context).await
            }
        }
    }

    async fn extract(
        &self,
        source: &str,
        operation: &str,
        params: &HashMap<String, Value>,
    ) -> Result<StepOutput> {
        let client = self
            .sources
            .get(source)
            .ok_or_else(|| RuntimeError::UnknownSource(source.to_string()))?;
        let records = client.read(operation, params).await?;
        tracing::debug!(source, operation, records = records.len(), "Extracted records");
        Ok(StepOutput::value(Value::Array(records)))
    }

    async fn transform(
        &self,
        step: &PipelineStep,
        operation: &TransformOperation,
        context: &ExecutionContext,
    ) -> Result<StepOutput> {
        let (records, warning) = match step.input_key() {
            // No upstream at all: the run input is the single record
            None => (vec![Value::Object(context.input().clone())], None),
            Some(key) => match context.output(key) {
                Some(value) => (value.records().into_iter().cloned().collect(), None),
                None => (Vec::new(), Some(absent_input(step, key))),
            },
        };

        let mut output = Vec::with_capacity(records.len());
        match operation {
            TransformOperation::RuleGroup {
                group,
                filter,
                result_field,
            } => {
                let group = self
                    .config
                    .rule_group(group)
                    .ok_or_else(|| RuntimeError::UnknownRuleGroup(group.clone()))?;
                for record in records {
                    let scope = context.scope_for(Some(&record));
                    let result = self.groups.evaluate(group, &scope).await;
                    if *filter {
                        if result.passed {
                            output.push(record);
                        }
                    } else {
                        output.push(annotate(record, result_field, Value::Bool(result.passed)));
                    }
                }
            }
            TransformOperation::RuleChain {
                chain,
                result_field,
            } => {
                let chain = self
                    .config
                    .rule_chain(chain)
                    .ok_or_else(|| RuntimeError::UnknownRuleChain(chain.clone()))?;
                for record in records {
                    let scope = context.scope_for(Some(&record));
                    let decision = self.chains.evaluate(chain, &scope).decision();
                    output.push(annotate(record, result_field, decision));
                }
            }
            TransformOperation::FieldMapping {
                mappings,
                include_unmapped,
            } => {
                for record in records {
                    output.push(map_fields(&record, mappings, *include_unmapped)?);
                }
            }
        }

        Ok(StepOutput {
            value: Some(Value::Array(output)),
            warning,
        })
    }

    async fn load(
        &self,
        step: &PipelineStep,
        sink: &str,
        operation: &str,
        context: &ExecutionContext,
    ) -> Result<StepOutput> {
        let client = self
            .sinks
            .get(sink)
            .ok_or_else(|| RuntimeError::UnknownSink(sink.to_string()))?;

        let input = step.input_key().and_then(|key| context.output(key));
        let Some(input) = input else {
            let key = step.input_key().unwrap_or("<none>");
            return Ok(StepOutput {
                value: Some(load_summary(0, 0)),
                warning: Some(absent_input(step, key)),
            });
        };

        let mut written = 0usize;
        let mut skipped = 0usize;
        for record in input.records() {
            match client.write(operation, record).await {
                Ok(()) => written += 1,
                Err(DataError::DataIntegrity(reason)) => {
                    tracing::warn!(step = %step.name, %reason, "Skipping record rejected by sink");
                    skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(step = %step.name, sink, written, skipped, "Loaded records");
        Ok(StepOutput::value(load_summary(written, skipped)))
    }

    async fn audit(
        &self,
        step: &PipelineStep,
        sink: &str,
        operation: &str,
        context: &ExecutionContext,
    ) -> Result<StepOutput> {
        let client = self
            .sinks
            .get(sink)
            .ok_or_else(|| RuntimeError::UnknownSink(sink.to_string()))?;

        let input = step.input_key().and_then(|key| context.output(key));
        let records: Vec<&Value> = input.as_ref().map(Value::records).unwrap_or_default();
        if records.is_empty() {
            tracing::warn!(step = %step.name, "No data to audit");
            return Ok(StepOutput::default());
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        for record in records {
            let mut entry = HashMap::new();
            entry.insert("original_data".to_string(), record.clone());
            entry.insert("pipeline_name".to_string(), Value::from(self.pipeline.as_str()));
            entry.insert("step_name".to_string(), Value::from(step.name.as_str()));
            entry.insert("timestamp".to_string(), Value::from(timestamp.as_str()));
            entry.insert("status".to_string(), Value::from("processed"));
            client.write(operation, &Value::Object(entry)).await?;
        }

        // Audit output never feeds downstream steps
        Ok(StepOutput::default())
    }
}

fn absent_input(step: &PipelineStep, key: &str) -> String {
    let message = format!("Step '{}' input '{}' is absent", step.name, key);
    tracing::warn!(step = %step.name, input = key, "Step input is absent");
    message
}

fn load_summary(written: usize, skipped: usize) -> Value {
    let mut summary = HashMap::new();
    summary.insert("written".to_string(), Value::Number(written as f64));
    summary.insert("skipped".to_string(), Value::Number(skipped as f64));
    Value::Object(summary)
}

/// Set `field` on an object record; other records are wrapped as `{value: ..}`
fn annotate(record: Value, field: &str, value: Value) -> Value {
    let mut fields = match record {
        Value::Object(fields) => fields,
        other => HashMap::from([("value".to_string(), other)]),
    };
    fields.insert(field.to_string(), value);
    Value::Object(fields)
}

fn map_fields(
    record: &Value,
    mappings: &BTreeMap<String, String>,
    include_unmapped: bool,
) -> Result<Value> {
    let fields = record.as_object().ok_or_else(|| {
        RuntimeError::InvalidInput(format!(
            "Field mapping needs object records, got {}",
            record.type_name()
        ))
    })?;

    let mut mapped = HashMap::with_capacity(mappings.len());
    if include_unmapped {
        let sources: Vec<&String> = mappings.values().collect();
        for (name, value) in fields {
            if !sources.contains(&name) {
                mapped.insert(name.clone(), value.clone());
            }
        }
    }
    for (target, source) in mappings {
        if let Some(value) = fields.get(source) {
            mapped.insert(target.clone(), value.clone());
        }
    }
    Ok(Value::Object(mapped))
}
