//! Pipeline execution
//!
//! [`PipelineExecutor`] validates a pipeline, derives its execution order and
//! runs the DAG. A single scheduling loop owns all per-step state: it marks
//! steps ready or skipped as their dependencies settle, launches ready steps
//! while concurrency slots are free, and records each finished step's result
//! in the run context. Step tasks only ever see a read-only snapshot of that
//! context.

mod backoff;
mod rate;
mod report;

pub use backoff::Backoff;
pub use rate::RateGate;
pub use report::{AbortReason, PipelineStatus, RunReport, StepReport, StepStatus};

use crate::client::{Client, RateLimitedClient};
use crate::error::{PipelineError, PipelineResult, StepError};
use crate::events::{EventSink, NoopSink, RunEvent};
use crate::pipeline::{PipelineConfig, StepConfig};
use crate::schema::{RemoteVersion, SchemaManager};
use crate::steps::{RunContext, Step, StepContext, StepRegistry, StepResult};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

// ============================================================================
// Executor
// ============================================================================

/// Runs one pipeline definition.
///
/// Construction does no I/O; the remote service is first contacted by
/// [`run`](Self::run).
pub struct PipelineExecutor {
    config: PipelineConfig,
    client: Arc<dyn Client>,
    registry: Arc<StepRegistry>,
    schemas: Arc<SchemaManager>,
    sink: Arc<dyn EventSink>,
    backoff: Backoff,
    cancel: CancellationToken,
    remote_version: Option<RemoteVersion>,
}

impl PipelineExecutor {
    pub fn new(config: PipelineConfig, client: Arc<dyn Client>) -> Self {
        Self {
            config,
            client,
            registry: Arc::new(StepRegistry::with_defaults()),
            schemas: Arc::new(SchemaManager::new()),
            sink: Arc::new(NoopSink),
            backoff: Backoff::default(),
            cancel: CancellationToken::new(),
            remote_version: None,
        }
    }

    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaManager) -> Self {
        self.schemas = Arc::new(schemas);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Skip server version detection and use this version
    pub fn with_remote_version(mut self, version: RemoteVersion) -> Self {
        self.remote_version = Some(version);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Token that aborts a run in progress when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the pipeline.
    ///
    /// Returns `Err` only when the pipeline cannot start (invalid definition
    /// or no execution order). Step failures, timeouts and cancellation are
    /// reported in the returned [`RunReport`].
    pub async fn run(&self) -> PipelineResult<RunReport> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            return Err(PipelineError::Validation(errors));
        }
        let order = self.config.get_execution_order()?;

        let Some(gate) = RateGate::new(self.config.rps) else {
            return Err(PipelineError::Validation(vec![format!(
                "rps {} cannot be used as a request rate",
                self.config.rps
            )]));
        };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        // A budget past the clock's range means no deadline
        let deadline = self
            .config
            .timeout_duration()
            .and_then(|t| clock.checked_add(t));
        let run_cancel = self.cancel.child_token();

        self.sink.emit(&RunEvent::RunStarted {
            run_id,
            pipeline: self.config.name.clone(),
            steps: order.len(),
        });

        let client: Arc<dyn Client> = Arc::new(RateLimitedClient::new(
            self.client.clone(),
            Arc::new(gate.with_sink(self.sink.clone())),
        ));
        let version = self.detect_version(client.as_ref(), deadline).await;

        let mut run = RunState::new(&self.config, &order);
        let slots = Arc::new(Semaphore::new(
            self.config.concurrency.min(Semaphore::MAX_PERMITS),
        ));
        let mut running: JoinSet<StepOutcome> = JoinSet::new();
        let mut tasks: HashMap<task::Id, usize> = HashMap::new();
        let mut aborted = None;

        loop {
            run.resolve_pending(self.sink.as_ref());

            for index in run.ready() {
                let Ok(permit) = slots.clone().try_acquire_owned() else {
                    break;
                };
                let state = &mut run.steps[index];
                state.status = StepStatus::Running;
                state.started_at = Some(Utc::now());

                let ctx = StepContext {
                    client: client.clone(),
                    schemas: self.schemas.clone(),
                    results: run.context.clone(),
                    version,
                    cancel: run_cancel.child_token(),
                };
                let task = StepTask {
                    index,
                    config: state.config.clone(),
                    registry: self.registry.clone(),
                    backoff: self.backoff,
                    sink: self.sink.clone(),
                };
                let handle = running.spawn(async move {
                    let _permit = permit;
                    task.run(ctx).await
                });
                tasks.insert(handle.id(), index);
            }

            if running.is_empty() {
                break;
            }

            // Abort signals win over a step finishing at the same instant
            tokio::select! {
                biased;
                _ = run_cancel.cancelled() => {
                    aborted = Some(AbortReason::Cancelled);
                    break;
                },
                _ = wait_for(deadline) => {
                    aborted = Some(AbortReason::Timeout);
                    break;
                },
                joined = running.join_next_with_id() => match joined {
                    Some(Ok((id, outcome))) => {
                        tasks.remove(&id);
                        run.record(outcome, None, self.sink.as_ref());
                    },
                    Some(Err(e)) => run.record_abnormal(&mut tasks, e, None, self.sink.as_ref()),
                    None => {},
                },
            }
        }

        if let Some(reason) = aborted {
            warn!(pipeline = %self.config.name, %reason, "Aborting pipeline run");
            run_cancel.cancel();
            while let Some(joined) = running.join_next_with_id().await {
                match joined {
                    Ok((id, outcome)) => {
                        tasks.remove(&id);
                        run.record(outcome, Some(reason), self.sink.as_ref());
                    },
                    Err(e) => run.record_abnormal(&mut tasks, e, Some(reason), self.sink.as_ref()),
                }
            }
        }
        run.settle_remaining(aborted, self.sink.as_ref());

        let failed = run.steps.iter().any(|s| s.status == StepStatus::Failed);
        let status = if failed || aborted.is_some() {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Completed
        };
        let duration = clock.elapsed();

        self.sink.emit(&RunEvent::RunFinished {
            run_id,
            pipeline: self.config.name.clone(),
            status,
            duration,
        });

        Ok(RunReport {
            run_id,
            pipeline: self.config.name.clone(),
            status,
            started_at,
            duration_ms: duration.as_millis() as u64,
            aborted,
            steps: run.into_reports(),
        })
    }

    async fn detect_version(&self, client: &dyn Client, deadline: Option<Instant>) -> RemoteVersion {
        if let Some(version) = self.remote_version {
            return version;
        }
        let detected = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, client.version())
                .await
                .unwrap_or(Ok(RemoteVersion::Unknown)),
            None => client.version().await,
        };
        match detected {
            Ok(version) => {
                debug!(%version, "Detected remote version");
                version
            },
            Err(e) => {
                warn!(error = %e, "Could not detect remote version, schema fallback disabled");
                RemoteVersion::Unknown
            },
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Run state (owned by the scheduling loop)
// ============================================================================

struct StepState {
    config: StepConfig,
    status: StepStatus,
    attempts: u32,
    started_at: Option<DateTime<Utc>>,
    duration: Option<Duration>,
    result: Option<StepResult>,
    reason: Option<String>,
    /// Failed step that caused this one to be skipped
    failed_ancestor: Option<String>,
}

enum Resolution {
    Blocked,
    UpstreamFailed(String),
    Disabled,
    Ready,
}

struct RunState {
    /// In execution order
    steps: Vec<StepState>,
    index: HashMap<String, usize>,
    context: RunContext,
}

impl RunState {
    fn new(config: &PipelineConfig, order: &[String]) -> Self {
        let steps: Vec<StepState> = order
            .iter()
            .filter_map(|name| config.get_step_by_name(name))
            .map(|step| StepState {
                config: step.clone(),
                status: StepStatus::Pending,
                attempts: 0,
                started_at: None,
                duration: None,
                result: None,
                reason: None,
                failed_ancestor: None,
            })
            .collect();
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.config.name.clone(), i))
            .collect();

        Self {
            steps,
            index,
            context: RunContext::default(),
        }
    }

    fn ready(&self) -> Vec<usize> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.status == StepStatus::Ready)
            .map(|(i, _)| i)
            .collect()
    }

    fn resolution(&self, step: &StepState) -> Resolution {
        let mut blocked = false;
        for dep in &step.config.depends_on {
            let Some(&i) = self.index.get(dep) else {
                continue;
            };
            let dep_state = &self.steps[i];
            match dep_state.status {
                StepStatus::Failed => return Resolution::UpstreamFailed(dep.clone()),
                StepStatus::Skipped => {
                    if let Some(ancestor) = &dep_state.failed_ancestor {
                        return Resolution::UpstreamFailed(ancestor.clone());
                    }
                },
                StepStatus::Succeeded => {},
                StepStatus::Pending | StepStatus::Ready | StepStatus::Running => blocked = true,
            }
        }

        if blocked {
            Resolution::Blocked
        } else if !step.config.enabled {
            Resolution::Disabled
        } else {
            Resolution::Ready
        }
    }

    /// Promote or skip pending steps whose dependencies have settled.
    ///
    /// One pass suffices because steps are stored in execution order.
    fn resolve_pending(&mut self, sink: &dyn EventSink) {
        for i in 0..self.steps.len() {
            if self.steps[i].status != StepStatus::Pending {
                continue;
            }
            match self.resolution(&self.steps[i]) {
                Resolution::Blocked => {},
                Resolution::Ready => {
                    self.steps[i].status = StepStatus::Ready;
                    sink.emit(&RunEvent::StepReady {
                        step: self.steps[i].config.name.clone(),
                    });
                },
                Resolution::Disabled => self.skip(i, "step disabled".to_string(), None, sink),
                Resolution::UpstreamFailed(ancestor) => {
                    let reason = format!("upstream step '{ancestor}' failed");
                    self.skip(i, reason, Some(ancestor), sink);
                },
            }
        }
    }

    fn skip(&mut self, i: usize, reason: String, ancestor: Option<String>, sink: &dyn EventSink) {
        let state = &mut self.steps[i];
        state.status = StepStatus::Skipped;
        state.reason = Some(reason);
        state.failed_ancestor = ancestor;
        emit_finished(state, sink);
    }

    fn record(&mut self, outcome: StepOutcome, aborted: Option<AbortReason>, sink: &dyn EventSink) {
        let state = &mut self.steps[outcome.index];
        state.status = outcome.status;
        state.attempts = outcome.attempts;
        state.duration = Some(outcome.duration);

        state.reason = match (&outcome.error, aborted) {
            (Some(StepError::Cancelled), Some(reason)) => Some(format!("interrupted: {reason}")),
            (Some(e), _) if outcome.attempts == 0 => Some(e.to_string()),
            (Some(e), _) => Some(format!(
                "failed after {} attempt{}: {e}",
                outcome.attempts,
                if outcome.attempts == 1 { "" } else { "s" }
            )),
            (None, _) => None,
        };

        if let Some(result) = outcome.result {
            self.context.insert(state.config.name.clone(), result.clone());
            state.result = Some(result);
        }
        emit_finished(state, sink);
    }

    /// A step task that panicked outside its attempt guard or was aborted.
    ///
    /// The step is failed like any other so its dependents are skipped with
    /// the usual upstream reason.
    fn record_abnormal(
        &mut self,
        tasks: &mut HashMap<task::Id, usize>,
        e: JoinError,
        aborted: Option<AbortReason>,
        sink: &dyn EventSink,
    ) {
        error!(error = %e, "Step task terminated abnormally");
        let Some(index) = tasks.remove(&e.id()) else {
            return;
        };
        let state = &self.steps[index];
        let duration = state
            .started_at
            .and_then(|started| (Utc::now() - started).to_std().ok())
            .unwrap_or_default();
        let error = if e.is_panic() {
            StepError::Panicked(panic_message(e.into_panic().as_ref()))
        } else {
            StepError::Cancelled
        };
        let outcome = StepOutcome {
            index,
            status: StepStatus::Failed,
            attempts: state.attempts,
            duration,
            result: None,
            error: Some(error),
        };
        self.record(outcome, aborted, sink);
    }

    /// After an abort, nothing may stay pending or running
    fn settle_remaining(&mut self, aborted: Option<AbortReason>, sink: &dyn EventSink) {
        let reason = aborted.map_or_else(|| "run ended".to_string(), |r| r.to_string());
        for state in self.steps.iter_mut().filter(|s| !s.status.is_terminal()) {
            if state.status == StepStatus::Running {
                state.status = StepStatus::Failed;
                state.reason = Some(format!("interrupted: {reason}"));
            } else {
                state.status = StepStatus::Skipped;
                state.reason = Some(format!("not started: {reason}"));
            }
            emit_finished(state, sink);
        }
    }

    fn into_reports(self) -> Vec<StepReport> {
        self.steps
            .into_iter()
            .map(|s| StepReport {
                name: s.config.name,
                step_type: s.config.step_type,
                status: s.status,
                attempts: s.attempts,
                started_at: s.started_at,
                duration_ms: s.duration.map(|d| d.as_millis() as u64),
                result: s.result,
                reason: s.reason,
            })
            .collect()
    }
}

fn emit_finished(state: &StepState, sink: &dyn EventSink) {
    sink.emit(&RunEvent::StepFinished {
        step: state.config.name.clone(),
        status: state.status,
        attempts: state.attempts,
        duration: state.duration.unwrap_or_default(),
        reason: state.reason.clone(),
    });
}

// ============================================================================
// Step task (one spawned per started step)
// ============================================================================

struct StepOutcome {
    index: usize,
    status: StepStatus,
    attempts: u32,
    duration: Duration,
    result: Option<StepResult>,
    error: Option<StepError>,
}

struct StepTask {
    index: usize,
    config: StepConfig,
    registry: Arc<StepRegistry>,
    backoff: Backoff,
    sink: Arc<dyn EventSink>,
}

impl StepTask {
    async fn run(self, ctx: StepContext) -> StepOutcome {
        let clock = Instant::now();
        self.sink.emit(&RunEvent::StepStarted {
            step: self.config.name.clone(),
            step_type: self.config.step_type.clone(),
        });

        let step = match self.registry.create(&self.config) {
            Ok(step) => step,
            Err(e) => return self.failed(clock, 0, e, None),
        };
        // Parameter problems are final: no attempt is made
        if let Err(e) = step.validate_params() {
            return self.failed(clock, 0, e, None);
        }

        let max_attempts = self.config.retry_count.saturating_add(1);
        let timeout = self.config.timeout_duration();
        let mut last_result = None;
        let mut attempt = 0;

        loop {
            if ctx.cancel.is_cancelled() {
                return self.failed(clock, attempt, StepError::Cancelled, last_result);
            }
            attempt += 1;
            self.sink.emit(&RunEvent::AttemptStarted {
                step: self.config.name.clone(),
                attempt,
                max_attempts,
            });

            let error = match run_attempt(step.as_ref(), &ctx, timeout).await {
                Ok(result) if result.is_success() => return self.succeeded(clock, attempt, result),
                Ok(result) => {
                    let message = result
                        .error
                        .clone()
                        .unwrap_or_else(|| "step reported failure".to_string());
                    last_result = Some(result);
                    StepError::Execution(message)
                },
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return self.failed(clock, attempt, error, last_result);
            }

            let delay = self.backoff.delay(attempt);
            self.sink.emit(&RunEvent::RetryScheduled {
                step: self.config.name.clone(),
                attempt,
                max_attempts,
                delay,
                error: error.to_string(),
            });
            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = ctx.cancel.cancelled() => {
                    return self.failed(clock, attempt, StepError::Cancelled, last_result);
                },
            }
        }
    }

    fn succeeded(&self, clock: Instant, attempts: u32, result: StepResult) -> StepOutcome {
        StepOutcome {
            index: self.index,
            status: StepStatus::Succeeded,
            attempts,
            duration: clock.elapsed(),
            result: Some(result),
            error: None,
        }
    }

    fn failed(
        &self,
        clock: Instant,
        attempts: u32,
        error: StepError,
        last_result: Option<StepResult>,
    ) -> StepOutcome {
        StepOutcome {
            index: self.index,
            status: StepStatus::Failed,
            attempts,
            duration: clock.elapsed(),
            result: last_result,
            error: Some(error),
        }
    }
}

/// One call to `execute`, bounded by the step timeout and the cancel token.
///
/// A panic inside the step counts as a failed attempt.
async fn run_attempt(
    step: &dyn Step,
    ctx: &StepContext,
    timeout: Option<Duration>,
) -> Result<StepResult, StepError> {
    let guarded = AssertUnwindSafe(step.execute(ctx)).catch_unwind();
    let attempt = async move {
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(StepError::Timeout(limit)),
            },
            None => guarded.await,
        };
        match outcome {
            Ok(result) => result,
            Err(panic) => Err(StepError::Panicked(panic_message(panic.as_ref()))),
        }
    };

    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(StepError::Cancelled),
        result = attempt => result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
