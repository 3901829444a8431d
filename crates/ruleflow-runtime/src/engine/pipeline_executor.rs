//! Pipeline executor
//!
//! Validates the step dependency graph, then schedules steps:
//! - A step starts only once every dependency reached a terminal state
//! - Eligible steps start in topological order (declaration order on ties)
//! - SEQUENTIAL runs one step at a time, PARALLEL up to the pool size
//! - Failing attempts are retried in place with a fixed delay
//! - STOP_ON_ERROR skips every unstarted step after a non-optional failure;
//!   CONTINUE_ON_ERROR skips only the steps that lost their input
//! - A pipeline timeout fails running steps and skips pending ones

use super::default_concurrency;
use super::rule_chain::RuleChainEvaluator;
use super::rule_group::RuleGroupEvaluator;
use super::step::{StepOutput, StepRunner};
use crate::context::ExecutionContext;
use crate::datasource::{DataSink, DataSource};
use crate::error::{Result, RuntimeError};
use crate::expression::ExpressionEvaluator;
use crate::result::{ExecutionLogEntry, PipelineExecutionResult, StepResult, StepState};
use futures::FutureExt;
use ruleflow_core::{
    Configuration, DependencyGraph, ErrorHandling, ExecutionMode, PipelineDefinition,
    PipelineStep, RetryPolicy, Value,
};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use uuid::Uuid;

/// Pipeline executor
pub struct PipelineExecutor {
    config: Arc<Configuration>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    sources: HashMap<String, Arc<dyn DataSource>>,
    sinks: HashMap<String, Arc<dyn DataSink>>,
    max_concurrency: usize,
    default_timeout: Option<Duration>,
}

impl PipelineExecutor {
    pub fn new(config: Arc<Configuration>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            config,
            evaluator,
            sources: HashMap::new(),
            sinks: HashMap::new(),
            max_concurrency: default_concurrency(),
            default_timeout: None,
        }
    }

    /// Register a data source under `name`
    pub fn with_source(mut self, name: impl Into<String>, source: Arc<dyn DataSource>) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    /// Register a data sink under `name`
    pub fn with_sink(mut self, name: impl Into<String>, sink: Arc<dyn DataSink>) -> Self {
        self.sinks.insert(name.into(), sink);
        self
    }

    /// Worker pool size for PARALLEL pipelines and parallel rule groups
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Timeout used when a pipeline does not declare its own
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Run the pipeline stored in the configuration
    pub async fn execute_configured(
        &self,
        input: HashMap<String, Value>,
    ) -> Result<PipelineExecutionResult> {
        let definition = self.config.pipeline().cloned().ok_or_else(|| {
            RuntimeError::InvalidInput("Configuration has no pipeline".to_string())
        })?;
        self.execute(&definition, input).await
    }

    /// Execute a pipeline.
    ///
    /// Returns `Err` only when the dependency graph is invalid, in which case
    /// no step has run. Step failures are reported in the result.
    pub async fn execute(
        &self,
        definition: &PipelineDefinition,
        input: HashMap<String, Value>,
    ) -> Result<PipelineExecutionResult> {
        let graph = DependencyGraph::build(&definition.steps)?;
        let execution_id = Uuid::new_v4();
        tracing::info!(
            pipeline = %definition.name,
            %execution_id,
            steps = graph.len(),
            mode = ?definition.execution_mode,
            "Starting pipeline"
        );

        let runner = Arc::new(StepRunner {
            pipeline: definition.name.clone(),
            config: self.config.clone(),
            groups: RuleGroupEvaluator::new(self.config.clone(), self.evaluator.clone())
                .with_max_concurrency(self.max_concurrency),
            chains: RuleChainEvaluator::new(self.config.clone(), self.evaluator.clone()),
            sources: self.sources.clone(),
            sinks: self.sinks.clone(),
        });

        let mut run = Run::new(definition, graph, ExecutionContext::new(input));
        let limit = match definition.execution_mode {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Parallel => self.max_concurrency,
        };
        let timeout = definition.timeout().or(self.default_timeout);
        run.schedule(&runner, limit, timeout).await;

        let result = run.finish(execution_id);
        tracing::info!(
            pipeline = %definition.name,
            %execution_id,
            success = result.overall_success,
            failed = result.failed_steps,
            skipped = result.skipped_steps,
            "Pipeline finished"
        );
        Ok(result)
    }
}

/// Terminal report of one step task
struct TaskReport {
    index: usize,
    attempts: u32,
    duration: Duration,
    outcome: std::result::Result<StepOutput, String>,
}

/// Ordered, shared transition log
#[derive(Clone, Default)]
struct ExecutionLog {
    entries: Arc<Mutex<Vec<ExecutionLogEntry>>>,
}

impl ExecutionLog {
    fn record(
        &self,
        step: &str,
        state: StepState,
        attempt: u32,
        duration: Duration,
        message: Option<String>,
    ) {
        let entry = ExecutionLogEntry {
            step: step.to_string(),
            state,
            timestamp: chrono::Utc::now(),
            duration,
            attempt,
            message,
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    fn into_entries(self) -> Vec<ExecutionLogEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *entries)
    }
}

enum Readiness {
    Ready,
    Waiting,
    Blocked(String),
}

/// Mutable state of one pipeline run
struct Run<'a> {
    definition: &'a PipelineDefinition,
    graph: DependencyGraph,
    context: ExecutionContext,
    log: ExecutionLog,
    states: Vec<StepState>,
    results: Vec<Option<StepResult>>,
    started: Vec<Option<Instant>>,
    warnings: Vec<String>,
    halted: bool,
    timed_out: bool,
    start: Instant,
}

impl<'a> Run<'a> {
    fn new(definition: &'a PipelineDefinition, graph: DependencyGraph, context: ExecutionContext) -> Self {
        let n = graph.len();
        Self {
            definition,
            graph,
            context,
            log: ExecutionLog::default(),
            states: vec![StepState::Pending; n],
            results: vec![None; n],
            started: vec![None; n],
            warnings: Vec::new(),
            halted: false,
            timed_out: false,
            start: Instant::now(),
        }
    }

    fn step(&self, index: usize) -> &'a PipelineStep {
        &self.definition.steps[index]
    }

    async fn schedule(&mut self, runner: &Arc<StepRunner>, limit: usize, timeout: Option<Duration>) {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut tasks: JoinSet<TaskReport> = JoinSet::new();

        loop {
            if !self.halted {
                self.start_ready_steps(runner, &mut tasks, limit);
            }
            if tasks.is_empty() {
                break;
            }

            let joined = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            self.drain_finished(&mut tasks).await;
                            tasks.abort_all();
                            self.time_out(timeout.unwrap_or_default());
                            break;
                        }
                    }
                }
                None => tasks.join_next().await,
            };

            match joined {
                Some(Ok(report)) => self.complete(report),
                Some(Err(join_err)) => {
                    tracing::error!(?join_err, "Step task ended without a report");
                }
                None => break,
            }
        }

        self.skip_pending("pipeline halted before the step started");
    }

    /// Record reports of tasks that finished at the deadline
    async fn drain_finished(&mut self, tasks: &mut JoinSet<TaskReport>) {
        // Let tasks woken by the same timer tick run to completion first
        tokio::task::yield_now().await;
        while let Some(joined) = tasks.try_join_next() {
            match joined {
                Ok(report) => self.complete(report),
                Err(join_err) => {
                    tracing::error!(?join_err, "Step task ended without a report");
                }
            }
        }
    }

    /// Start eligible steps in topological order until the pool is full
    fn start_ready_steps(
        &mut self,
        runner: &Arc<StepRunner>,
        tasks: &mut JoinSet<TaskReport>,
        limit: usize,
    ) {
        let order: Vec<usize> = self.graph.order().to_vec();
        for index in order {
            if tasks.len() >= limit {
                break;
            }
            if self.states[index] != StepState::Pending {
                continue;
            }
            match self.readiness(index) {
                Readiness::Waiting => continue,
                Readiness::Blocked(reason) => self.skip(index, reason),
                Readiness::Ready => self.spawn(index, runner, tasks),
            }
        }
    }

    fn readiness(&self, index: usize) -> Readiness {
        for &dep in self.graph.dependencies(index) {
            let dep_step = self.step(dep);
            match self.states[dep] {
                StepState::Pending | StepState::Running => return Readiness::Waiting,
                StepState::Succeeded => {}
                // Optional upstream: dependents see its output as absent
                StepState::Failed | StepState::Skipped if dep_step.is_optional() => {}
                StepState::Failed => {
                    return Readiness::Blocked(format!("dependency '{}' failed", dep_step.name))
                }
                StepState::Skipped => {
                    return Readiness::Blocked(format!("dependency '{}' was skipped", dep_step.name))
                }
            }
        }
        Readiness::Ready
    }

    fn spawn(&mut self, index: usize, runner: &Arc<StepRunner>, tasks: &mut JoinSet<TaskReport>) {
        let step = self.step(index).clone();
        self.states[index] = StepState::Running;
        self.started[index] = Some(Instant::now());
        self.log.record(&step.name, StepState::Running, 1, Duration::ZERO, None);
        tracing::info!(step = %step.name, step_type = %step.step_type(), "Starting step");

        let runner = runner.clone();
        let context = self.context.clone();
        let log = self.log.clone();
        let retry = self.definition.retry_policy.clone();
        tasks.spawn(async move {
            let start = Instant::now();
            let (attempts, outcome) = run_with_retries(&runner, &step, &context, &log, &retry).await;
            TaskReport {
                index,
                attempts,
                duration: start.elapsed(),
                outcome,
            }
        });
    }

    fn complete(&mut self, report: TaskReport) {
        let step = self.step(report.index);
        match report.outcome {
            Ok(output) => {
                if let Some(warning) = output.warning {
                    self.warnings.push(warning);
                }
                if let Some(value) = output.value {
                    if let Err(e) = self.context.insert_output(step.name.clone(), value) {
                        tracing::error!(step = %step.name, error = %e, "Could not store step output");
                    }
                }
                self.states[report.index] = StepState::Succeeded;
                self.log.record(&step.name, StepState::Succeeded, report.attempts, report.duration, None);
                tracing::info!(step = %step.name, attempts = report.attempts, "Step succeeded");
                self.results[report.index] = Some(self.step_result(report.index, report.attempts, report.duration, None));
            }
            Err(error) => {
                self.states[report.index] = StepState::Failed;
                self.log.record(
                    &step.name,
                    StepState::Failed,
                    report.attempts,
                    report.duration,
                    Some(error.clone()),
                );

                if step.is_optional() {
                    tracing::warn!(step = %step.name, %error, "Optional step failed");
                    self.warnings.push(format!("Optional step '{}' failed: {}", step.name, error));
                } else {
                    tracing::error!(step = %step.name, %error, attempts = report.attempts, "Step failed");
                    if self.definition.error_handling == ErrorHandling::StopOnError {
                        self.halted = true;
                    }
                }
                self.results[report.index] =
                    Some(self.step_result(report.index, report.attempts, report.duration, Some(error)));
            }
        }
    }

    fn skip(&mut self, index: usize, reason: String) {
        let step = self.step(index);
        tracing::warn!(step = %step.name, %reason, "Skipping step");
        self.states[index] = StepState::Skipped;
        self.log.record(&step.name, StepState::Skipped, 0, Duration::ZERO, Some(reason.clone()));
        self.results[index] = Some(self.step_result(index, 0, Duration::ZERO, Some(reason)));
    }

    fn skip_pending(&mut self, reason: &str) {
        for index in self.graph.order().to_vec() {
            if self.states[index] == StepState::Pending {
                self.skip(index, reason.to_string());
            }
        }
    }

    fn time_out(&mut self, timeout: Duration) {
        self.timed_out = true;
        self.halted = true;
        tracing::warn!(pipeline = %self.definition.name, ?timeout, "Pipeline timed out");

        let error = RuntimeError::Timeout(timeout).to_string();
        for index in self.graph.order().to_vec() {
            if self.states[index] != StepState::Running {
                continue;
            }
            let step = self.step(index);
            let duration = self.started[index].map(|s| s.elapsed()).unwrap_or_default();
            self.states[index] = StepState::Failed;
            self.log.record(&step.name, StepState::Failed, 0, duration, Some(error.clone()));
            let attempts = self
                .log
                .entries
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .iter()
                .filter(|e| e.step == step.name && e.state == StepState::Running)
                .count() as u32;
            self.results[index] = Some(self.step_result(index, attempts, duration, Some(error.clone())));
        }
        self.skip_pending("pipeline timed out");
    }

    fn step_result(
        &self,
        index: usize,
        attempts: u32,
        duration: Duration,
        error: Option<String>,
    ) -> StepResult {
        let step = self.step(index);
        StepResult {
            name: step.name.clone(),
            step_type: step.step_type(),
            state: self.states[index],
            attempts,
            optional: step.is_optional(),
            duration,
            error,
        }
    }

    fn finish(self, execution_id: Uuid) -> PipelineExecutionResult {
        let steps: Vec<StepResult> = self
            .graph
            .order()
            .iter()
            .filter_map(|&i| self.results[i].clone())
            .collect();

        let count = |state: StepState| steps.iter().filter(|s| s.state == state).count();
        let successful_steps = count(StepState::Succeeded);
        let failed_steps = count(StepState::Failed);
        let skipped_steps = count(StepState::Skipped);
        let required_failure = steps
            .iter()
            .any(|s| s.state == StepState::Failed && !s.optional);

        PipelineExecutionResult {
            execution_id,
            pipeline: self.definition.name.clone(),
            overall_success: !required_failure && !self.timed_out,
            total_steps: steps.len(),
            successful_steps,
            failed_steps,
            skipped_steps,
            steps,
            log: self.log.into_entries(),
            warnings: self.warnings,
            outputs: self.context.outputs(),
            timed_out: self.timed_out,
            duration: self.start.elapsed(),
        }
    }
}

/// Run a step until it succeeds or the retry policy is exhausted.
/// Panics inside a step count as a failed attempt.
async fn run_with_retries(
    runner: &StepRunner,
    step: &PipelineStep,
    context: &ExecutionContext,
    log: &ExecutionLog,
    retry: &RetryPolicy,
) -> (u32, std::result::Result<StepOutput, String>) {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let attempt_start = Instant::now();
        let outcome = AssertUnwindSafe(runner.run(step, context))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(RuntimeError::Task(format!("step '{}' panicked", step.name))));

        let error = match outcome {
            Ok(output) => return (attempt, Ok(output)),
            Err(e) => e.to_string(),
        };
        if attempt >= max_attempts {
            return (attempt, Err(error));
        }

        tracing::warn!(
            step = %step.name,
            attempt,
            max_attempts,
            %error,
            "Step attempt failed, retrying"
        );
        log.record(
            &step.name,
            StepState::Failed,
            attempt,
            attempt_start.elapsed(),
            Some(format!("{} (retrying)", error)),
        );
        tokio::time::sleep(retry.delay()).await;
        attempt += 1;
        log.record(&step.name, StepState::Running, attempt, Duration::ZERO, None);
    }
}
