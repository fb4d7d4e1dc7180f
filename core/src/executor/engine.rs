use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::compose::compose;
use crate::error::EngineError;
use crate::phase::{PhaseGraph, PhaseId, PhaseStatus};

use super::cancel::CancelSignal;
use super::store::PhaseStore;
use super::traits::{EngineEvent, EventSink, InvokeOutcome, InvokeRequest, PhaseInvoker};
use super::types::{RunError, RunMode, RunReport, CANCELLED_MESSAGE};

/// Recorded on phases left running when a run stops for another reason.
const STOPPED_MESSAGE: &str = "Run stopped before this phase finished";

/// Identity and start time of the run in progress.
struct RunClock {
    run_id: String,
    mode: RunMode,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// Outcome of executing one phase: `Err` carries the run-level error.
pub(super) type PhaseStep = Result<(), RunError>;

/// Runs the phase graph in sequential or parallel mode.
///
/// The engine is the only writer of its [`PhaseStore`]. Runs are serialized:
/// starting one while another is active fails with
/// [`EngineError::RunInProgress`].
pub struct PhaseEngine {
    store: PhaseStore,
    pub(super) invoker: Arc<dyn PhaseInvoker>,
    sink: Option<Arc<dyn EventSink>>,
    model: String,
    initial_input: Mutex<String>,
    run_lock: tokio::sync::Mutex<()>,
    running: AtomicBool,
    last_error: Mutex<Option<String>>,
}

/// Raises the engine's running flag for as long as it lives.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PhaseEngineBuilder {
    graph: PhaseGraph,
    invoker: Arc<dyn PhaseInvoker>,
    sink: Option<Arc<dyn EventSink>>,
    model: String,
    initial_input: String,
}

impl PhaseEngineBuilder {
    pub fn new(graph: PhaseGraph, invoker: Arc<dyn PhaseInvoker>) -> Self {
        Self {
            graph,
            invoker,
            sink: None,
            model: String::new(),
            initial_input: String::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Seed text substituted into root phases.
    pub fn initial_input(mut self, input: impl Into<String>) -> Self {
        self.initial_input = input.into();
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> PhaseEngine {
        PhaseEngine {
            store: PhaseStore::new(self.graph),
            invoker: self.invoker,
            sink: self.sink,
            model: self.model,
            initial_input: Mutex::new(self.initial_input),
            run_lock: tokio::sync::Mutex::new(()),
            running: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PhaseEngine {
    pub fn builder(graph: PhaseGraph, invoker: Arc<dyn PhaseInvoker>) -> PhaseEngineBuilder {
        PhaseEngineBuilder::new(graph, invoker)
    }

    /// Latest committed phase table.
    pub fn phases(&self) -> PhaseGraph {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<PhaseGraph> {
        self.store.subscribe()
    }

    /// Human-readable error of the most recent run, if it failed.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_initial_input(&self, input: impl Into<String>) -> Result<(), EngineError> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        *lock(&self.initial_input) = input.into();
        Ok(())
    }

    /// Replace the prompt of one phase. Applies to the next composition.
    pub fn set_prompt(&self, id: PhaseId, prompt: impl Into<String>) -> Result<(), EngineError> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        let prompt = prompt.into();
        self.store.update(|g| g.with_phase(id, |p| p.prompt = prompt))?;
        Ok(())
    }

    /// Restore the prompt of one phase to its default text.
    pub fn reset_prompt(&self, id: PhaseId) -> Result<(), EngineError> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        self.store
            .update(|g| g.with_phase(id, |p| p.prompt = p.default_prompt.clone()))?;
        Ok(())
    }

    /// Run every phase in registration order, stopping at the first failure.
    pub async fn run_sequential(&self, cancel: &CancelSignal) -> Result<RunReport, EngineError> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        let _running = RunningFlag::raise(&self.running);
        let clock = self.begin_run(RunMode::Sequential);

        let order: Vec<PhaseId> = self.store.snapshot().ids().collect();
        let mut error = None;
        for id in order {
            if cancel.is_cancelled() {
                error = Some(RunError::Cancelled);
                break;
            }
            if let Err(e) = self.execute_phase(&clock.run_id, id, cancel).await? {
                error = Some(e);
                break;
            }
        }

        self.finish_run(clock, error)
    }

    /// Run the graph with maximal safe parallelism.
    ///
    /// A failure stops new launches; invocations already in flight run to
    /// completion and their results are kept.
    pub async fn run_parallel(&self, cancel: &CancelSignal) -> Result<RunReport, EngineError> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        let _running = RunningFlag::raise(&self.running);
        let clock = self.begin_run(RunMode::Parallel);

        let error = self.schedule_parallel(&clock.run_id, cancel).await?;

        self.finish_run(clock, error)
    }

    /// Execute one phase against the current state, without resetting others.
    ///
    /// Returns the updated phase table; a failure is recorded on the phase
    /// and in [`last_error`](Self::last_error).
    pub async fn run_single_phase(
        &self,
        id: PhaseId,
        cancel: &CancelSignal,
    ) -> Result<PhaseGraph, EngineError> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::RunInProgress)?;
        let _running = RunningFlag::raise(&self.running);
        self.store.snapshot().lookup(id)?;

        if cancel.is_cancelled() {
            *lock(&self.last_error) = Some(RunError::Cancelled.to_string());
            return Ok(self.store.snapshot());
        }

        let run_id = Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, phase = %id, "running single phase");
        let step = self.execute_phase(&run_id, id, cancel).await?;
        *lock(&self.last_error) = step.err().map(|e| e.to_string());

        Ok(self.store.snapshot())
    }

    fn begin_run(&self, mode: RunMode) -> RunClock {
        let run_id = Uuid::new_v4().to_string();
        *lock(&self.last_error) = None;

        let graph = self.store.snapshot().reset();
        let total_phases = graph.len();
        self.store.commit(graph);

        tracing::info!(run_id = %run_id, mode = %mode, total_phases, "run started");
        self.emit(EngineEvent::RunStart {
            run_id: run_id.clone(),
            mode,
            total_phases,
        });
        RunClock {
            run_id,
            mode,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    fn finish_run(&self, clock: RunClock, error: Option<RunError>) -> Result<RunReport, EngineError> {
        let leftover = match &error {
            Some(RunError::Cancelled) => CANCELLED_MESSAGE,
            _ => STOPPED_MESSAGE,
        };
        self.fail_running(&clock.run_id, leftover)?;

        let report = RunReport {
            run_id: clock.run_id,
            mode: clock.mode,
            success: error.is_none(),
            error,
            phases: self.store.snapshot(),
            started_at: clock.started_at,
            elapsed: clock.started.elapsed(),
        };
        *lock(&self.last_error) = report.error_message();

        match &report.error {
            None => tracing::info!(
                run_id = %report.run_id,
                completed = report.completed(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "run completed"
            ),
            Some(e) => tracing::warn!(
                run_id = %report.run_id,
                completed = report.completed(),
                failed = report.failed(),
                pending = report.pending(),
                "run ended: {}",
                e
            ),
        }
        self.emit(EngineEvent::RunEnd {
            run_id: report.run_id.clone(),
            summary: report.summary(),
        });

        Ok(report)
    }

    /// Dependency check, compose, invoke and write back a single phase.
    pub(super) async fn execute_phase(
        &self,
        run_id: &str,
        id: PhaseId,
        cancel: &CancelSignal,
    ) -> Result<PhaseStep, EngineError> {
        let graph = self.store.snapshot();
        let phase = graph.lookup(id)?;

        if let Some(dep) = graph.first_unmet_dependency(id)? {
            let err = RunError::DependencyNotSatisfied {
                phase: id,
                title: phase.title.clone(),
                dependency: dep,
                dependency_title: graph
                    .get(dep)
                    .map(|d| d.title.clone())
                    .unwrap_or_else(|| dep.to_string()),
            };
            self.mark_failed(run_id, id, &err.to_string())?;
            return Ok(Err(err));
        }

        let mut requests = self.mark_running(run_id, &[id], cancel)?;
        let Some(request) = requests.pop() else {
            return Err(EngineError::UnknownPhase(id));
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => InvokeOutcome::Aborted,
            outcome = self.invoker.invoke(request) => outcome,
        };

        self.settle(run_id, id, outcome)
    }

    /// Compose inputs for `ids` and mark them all running in one commit.
    pub(super) fn mark_running(
        &self,
        run_id: &str,
        ids: &[PhaseId],
        cancel: &CancelSignal,
    ) -> Result<Vec<InvokeRequest>, EngineError> {
        let seed = lock(&self.initial_input).clone();
        let graph = self.store.snapshot();

        let mut inputs: HashMap<PhaseId, String> = HashMap::with_capacity(ids.len());
        for id in ids {
            let phase = graph.lookup(*id)?;
            inputs.insert(*id, compose(phase, &graph, &seed));
        }

        let next = graph.with_phases(ids, |p| {
            p.status = PhaseStatus::Running;
            p.input = inputs.remove(&p.id).unwrap_or_default();
            p.output.clear();
            p.duration = None;
            p.error = None;
            p.tokens_per_second = None;
        })?;
        self.store.commit(next.clone());

        ids.iter()
            .map(|id| {
                let phase = next.lookup(*id)?;
                tracing::debug!(run_id, phase = %id, title = %phase.title, "phase started");
                self.emit(EngineEvent::PhaseStart {
                    run_id: run_id.to_string(),
                    phase_id: *id,
                    title: phase.title.clone(),
                });
                Ok(InvokeRequest {
                    model: self.model.clone(),
                    phase_id: *id,
                    composed_input: phase.input.clone(),
                    file_path: phase.file_path.clone(),
                    output_type: phase.output_type,
                    cancel: cancel.clone(),
                })
            })
            .collect()
    }

    /// Write an invocation outcome back into the store.
    pub(super) fn settle(
        &self,
        run_id: &str,
        id: PhaseId,
        outcome: InvokeOutcome,
    ) -> Result<PhaseStep, EngineError> {
        let next = if outcome.is_success() {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Failed
        };
        debug_assert!(
            self.store
                .snapshot()
                .status_of(id)
                .is_some_and(|s| s.can_transition_to(next)),
            "phase {id} settled to {next} from an invalid state"
        );

        match outcome {
            InvokeOutcome::Success(result) => {
                let graph = self.store.update(|g| {
                    g.with_phase(id, move |p| {
                        p.status = PhaseStatus::Completed;
                        p.output = result.output;
                        p.duration = Some(result.duration);
                        p.tokens_per_second = result.tokens_per_second;
                        p.error = None;
                    })
                })?;
                let phase = graph.lookup(id)?;
                tracing::debug!(
                    run_id,
                    phase = %id,
                    duration_ms = phase.duration.map(|d| d.as_millis() as u64),
                    "phase completed"
                );
                self.emit(EngineEvent::PhaseComplete {
                    run_id: run_id.to_string(),
                    phase_id: id,
                    title: phase.title.clone(),
                    duration: phase.duration.unwrap_or_default(),
                    output: phase.output.clone(),
                    tokens_per_second: phase.tokens_per_second,
                });
                Ok(Ok(()))
            }
            InvokeOutcome::Failure { message } => {
                let title = self.mark_failed(run_id, id, &message)?;
                Ok(Err(RunError::InvocationFailed {
                    phase: id,
                    title,
                    message,
                }))
            }
            InvokeOutcome::Aborted => {
                self.mark_failed(run_id, id, CANCELLED_MESSAGE)?;
                Ok(Err(RunError::Cancelled))
            }
        }
    }

    /// Mark one phase failed; returns its title.
    fn mark_failed(&self, run_id: &str, id: PhaseId, message: &str) -> Result<String, EngineError> {
        let graph = self.store.update(|g| {
            g.with_phase(id, |p| {
                p.status = PhaseStatus::Failed;
                p.error = Some(message.to_string());
            })
        })?;
        let title = graph.lookup(id)?.title.clone();

        tracing::error!(run_id, phase = %id, title = %title, "phase failed: {}", message);
        self.emit(EngineEvent::PhaseFailed {
            run_id: run_id.to_string(),
            phase_id: id,
            title: title.clone(),
            message: message.to_string(),
        });
        Ok(title)
    }

    /// Flip every running phase to failed in one commit.
    pub(super) fn fail_running(&self, run_id: &str, message: &str) -> Result<(), EngineError> {
        let running = self.store.snapshot().ids_with_status(PhaseStatus::Running);
        if running.is_empty() {
            return Ok(());
        }

        let graph = self.store.update(|g| {
            g.with_phases(&running, |p| {
                p.status = PhaseStatus::Failed;
                p.error = Some(message.to_string());
            })
        })?;

        for id in running {
            let title = graph.lookup(id)?.title.clone();
            tracing::warn!(run_id, phase = %id, "running phase marked failed: {}", message);
            self.emit(EngineEvent::PhaseFailed {
                run_id: run_id.to_string(),
                phase_id: id,
                title,
                message: message.to_string(),
            });
        }
        Ok(())
    }

    pub(super) fn snapshot(&self) -> PhaseGraph {
        self.store.snapshot()
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(&event);
        }
    }
}
