//! Engine facade over the loaded configuration

use crate::config::EngineConfig;
use crate::error::{Result, SdkError};
use ruleflow_core::{Configuration, StepKind, Value};
use ruleflow_runtime::{
    DataSink, DataSource, EvaluationContext, ExpressionEvaluator, PipelineExecutionResult,
    PipelineExecutor, RuleChainEvaluator, RuleChainResult, RuleGroupEvaluator, RuleGroupResult,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Loaded, validated engine. Cheap to share behind an `Arc`.
pub struct Engine {
    configuration: Arc<Configuration>,
    groups: RuleGroupEvaluator,
    chains: RuleChainEvaluator,
    executor: PipelineExecutor,
    loaded_sources: Vec<String>,
}

impl Engine {
    pub(crate) fn new(
        configuration: Arc<Configuration>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        sources: HashMap<String, Arc<dyn DataSource>>,
        sinks: HashMap<String, Arc<dyn DataSink>>,
        config: &EngineConfig,
        loaded_sources: Vec<String>,
    ) -> Self {
        warn_unregistered(&configuration, &sources, &sinks);

        let mut groups = RuleGroupEvaluator::new(configuration.clone(), evaluator.clone());
        let mut executor = PipelineExecutor::new(configuration.clone(), evaluator.clone());
        if let Some(max) = config.max_concurrency {
            groups = groups.with_max_concurrency(max);
            executor = executor.with_max_concurrency(max);
        }
        if let Some(timeout) = config.pipeline_timeout() {
            executor = executor.with_default_timeout(timeout);
        }
        for (name, source) in sources {
            executor = executor.with_source(name, source);
        }
        for (name, sink) in sinks {
            executor = executor.with_sink(name, sink);
        }

        Self {
            chains: RuleChainEvaluator::new(configuration.clone(), evaluator),
            configuration,
            groups,
            executor,
            loaded_sources,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Documents the configuration was merged from, root first
    pub fn loaded_sources(&self) -> &[String] {
        &self.loaded_sources
    }

    /// Evaluate a rule group by id
    pub async fn evaluate_group(
        &self,
        group_id: &str,
        context: &EvaluationContext,
    ) -> Result<RuleGroupResult> {
        Ok(self.groups.evaluate_by_id(group_id, context).await?)
    }

    /// Evaluate a rule chain by id
    pub fn evaluate_chain(
        &self,
        chain_id: &str,
        context: &EvaluationContext,
    ) -> Result<RuleChainResult> {
        Ok(self.chains.evaluate_by_id(chain_id, context)?)
    }

    /// Run the configured pipeline with `input` as the initial context
    pub async fn run_pipeline(
        &self,
        input: HashMap<String, Value>,
    ) -> Result<PipelineExecutionResult> {
        let pipeline = self.configuration.pipeline().ok_or(SdkError::NoPipeline)?;
        Ok(self.executor.execute(pipeline, input).await?)
    }
}

/// Steps naming a source or sink nobody registered fail at run time
fn warn_unregistered(
    configuration: &Configuration,
    sources: &HashMap<String, Arc<dyn DataSource>>,
    sinks: &HashMap<String, Arc<dyn DataSink>>,
) {
    let Some(pipeline) = configuration.pipeline() else {
        return;
    };
    for step in &pipeline.steps {
        match &step.kind {
            StepKind::Extract { source, .. } if !sources.contains_key(source) => {
                tracing::warn!(step = %step.name, %source, "No data source registered");
            }
            StepKind::Load { sink, .. } | StepKind::Audit { sink, .. }
                if !sinks.contains_key(sink) =>
            {
                tracing::warn!(step = %step.name, %sink, "No data sink registered");
            }
            _ => {}
        }
    }
}
