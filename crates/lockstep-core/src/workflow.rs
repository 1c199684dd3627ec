//! The workflow orchestrator: an ordered step list run strictly one step at
//! a time against a shared state container.
//!
//! The runner iterates by live index, not a snapshot, so structural edits
//! land on the next iteration. Flow-control signals are interpreted here:
//! SKIP drops exactly the next queued step, BREAK/CONTINUE stop the pass and
//! surface in the report for the nearest enclosing loop. A step failure
//! either stops the run (`exit_on_failure`, the default) or is recorded and
//! stepped over. Pausing takes effect at step boundaries only.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use lockstep_types::error::WorkflowError;
use lockstep_types::event::FlowEvent;
use lockstep_types::signal::ControlSignal;
use lockstep_types::workflow::{FailureRecord, WorkflowStatus};

use crate::event::bus::EventBus;
use crate::state::{SharedState, State, lock};
use crate::step::Step;

// ---------------------------------------------------------------------------
// ExecutionReport
// ---------------------------------------------------------------------------

/// What a run hands back: terminal status, the output list, any surfaced
/// control signal, absorbed failures, and a terminal state snapshot. There
/// is no result channel distinct from state beyond this.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    /// One entry per completed step, in completion order.
    pub outputs: Vec<Value>,
    /// BREAK/CONTINUE surfaced by this pass, for the nearest enclosing loop.
    pub signal: ControlSignal,
    /// Failures absorbed under `exit_on_failure = false`.
    pub failures: Vec<FailureRecord>,
    /// Deep copy of the state store at report time.
    pub state: Value,
}

// ---------------------------------------------------------------------------
// PauseHandle
// ---------------------------------------------------------------------------

/// Cloneable handle for requesting a pause from outside the run.
///
/// The runner honors the request at the next step boundary; the currently
/// running step always finishes first.
#[derive(Debug, Clone)]
pub struct PauseHandle {
    flag: Arc<AtomicBool>,
}

impl PauseHandle {
    pub fn pause(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// An ordered, mutable step sequence plus its own state.
pub struct Workflow {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) status: WorkflowStatus,
    pub(crate) steps: Vec<Step>,
    pub(crate) state: SharedState,
    pub(crate) index: usize,
    pub(crate) outputs: Vec<Value>,
    pub(crate) failures: Vec<FailureRecord>,
    exit_on_failure: bool,
    last_signal: ControlSignal,
    pending_skip: bool,
    pause_flag: Arc<AtomicBool>,
    pub(crate) events: EventBus,
}

impl Workflow {
    /// Create an empty workflow with its own fresh state. Failures stop the
    /// run by default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            status: WorkflowStatus::Waiting,
            steps: Vec::new(),
            state: State::new().into_shared(),
            index: 0,
            outputs: Vec::new(),
            failures: Vec::new(),
            exit_on_failure: true,
            last_signal: ControlSignal::None,
            pending_skip: false,
            pause_flag: Arc::new(AtomicBool::new(false)),
            events: EventBus::default(),
        }
    }

    /// Create a workflow pre-seeded with steps.
    pub fn with_steps(name: impl Into<String>, steps: Vec<Step>) -> Self {
        let mut workflow = Self::new(name);
        for step in steps {
            workflow.add_step(step);
        }
        workflow
    }

    // -- Accessors ---------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Index of the next step the runner will consider.
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Results of completed steps so far, in completion order.
    pub fn outputs(&self) -> &[Value] {
        &self.outputs
    }

    /// Failures absorbed so far under `exit_on_failure = false`.
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn exit_on_failure(&self) -> bool {
        self.exit_on_failure
    }

    /// Whether a step failure stops the run (true, the default) or is
    /// recorded and stepped over (false).
    pub fn set_exit_on_failure(&mut self, exit_on_failure: bool) {
        self.exit_on_failure = exit_on_failure;
    }

    /// Builder form of `set_exit_on_failure(false)`.
    pub fn continue_on_failure(mut self) -> Self {
        self.exit_on_failure = false;
        self
    }

    // -- State -------------------------------------------------------------

    /// The shared state handle this workflow runs against. Handing it to
    /// another workflow is legitimate, caller-opted-into sharing.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Deep copy of the current state store.
    pub fn state_snapshot(&self) -> Value {
        lock(&self.state).snapshot()
    }

    /// Swap in a different state container (used by subflows and loops to
    /// share or isolate the caller's state).
    pub fn adopt_state(&mut self, state: SharedState) {
        self.state = state;
    }

    /// Freeze the state store; every later mutation fails uniformly.
    pub fn freeze(&self) {
        lock(&self.state).freeze();
    }

    // -- Events ------------------------------------------------------------

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to this workflow's notifications (step transitions,
    /// lifecycle changes, structural edits).
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    /// Route this workflow's (and every step's) notifications to `bus`.
    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        self.events = bus.clone();
        for step in &mut self.steps {
            step.attach_events(bus);
        }
    }

    // -- Structural edits --------------------------------------------------

    /// Append a step. Synchronous; permitted before, between, or during
    /// runs -- the runner reads the list by live index.
    pub fn add_step(&mut self, mut step: Step) {
        step.attach_events(&self.events);
        self.events.publish(FlowEvent::StepAdded {
            workflow_id: self.id,
            step_id: step.id(),
            step_name: step.name().to_string(),
        });
        self.steps.push(step);
    }

    /// Insert a step at `index` (clamped to the list length).
    pub fn insert_step(&mut self, index: usize, mut step: Step) {
        step.attach_events(&self.events);
        self.events.publish(FlowEvent::StepAdded {
            workflow_id: self.id,
            step_id: step.id(),
            step_name: step.name().to_string(),
        });
        let index = index.min(self.steps.len());
        self.steps.insert(index, step);
    }

    /// Remove and return the step at `index`.
    pub fn remove_step(&mut self, index: usize) -> Option<Step> {
        if index >= self.steps.len() {
            return None;
        }
        let step = self.steps.remove(index);
        self.events.publish(FlowEvent::StepRemoved {
            workflow_id: self.id,
            step_id: step.id(),
            step_name: step.name().to_string(),
        });
        Some(step)
    }

    /// Remove and return the first step.
    pub fn shift(&mut self) -> Option<Step> {
        self.remove_step(0)
    }

    /// Move the step at `from` to position `to`. Returns false when either
    /// index is out of bounds.
    pub fn move_step(&mut self, from: usize, to: usize) -> bool {
        if from >= self.steps.len() || to >= self.steps.len() {
            return false;
        }
        let step = self.steps.remove(from);
        self.events.publish(FlowEvent::StepMoved {
            workflow_id: self.id,
            step_id: step.id(),
            step_name: step.name().to_string(),
            from,
            to,
        });
        self.steps.insert(to, step);
        true
    }

    /// Remove every step.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.events.publish(FlowEvent::StepsCleared {
            workflow_id: self.id,
            workflow_name: self.name.clone(),
        });
    }

    // -- Pause -------------------------------------------------------------

    /// Handle for requesting a pause while a run is in flight.
    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle {
            flag: Arc::clone(&self.pause_flag),
        }
    }

    /// Request the runner stop after the currently running step finishes.
    pub fn pause(&self) {
        self.pause_flag.store(true, Ordering::SeqCst);
    }

    // -- Execution ---------------------------------------------------------

    /// Run the step list from the beginning. Fails with
    /// `WorkflowError::Empty` when there are no steps. Re-arms every step,
    /// clears outputs and failures, and resets the index first.
    pub async fn execute(&mut self) -> Result<ExecutionReport, WorkflowError> {
        self.start()?;
        self.run_from_index().await
    }

    /// Run from the beginning after shallow-merging `initial` into the
    /// state. The merge happens before the first step runs.
    pub async fn execute_seeded(
        &mut self,
        initial: Value,
    ) -> Result<ExecutionReport, WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Empty);
        }
        lock(&self.state).merge(initial)?;
        self.start()?;
        self.run_from_index().await
    }

    /// Continue a paused run from the stored index against the same state.
    pub async fn resume(&mut self) -> Result<ExecutionReport, WorkflowError> {
        if self.status != WorkflowStatus::Paused {
            return Err(WorkflowError::NotPaused);
        }
        self.status = WorkflowStatus::Running;
        self.events.publish(FlowEvent::WorkflowResumed {
            workflow_id: self.id,
            workflow_name: self.name.clone(),
            at_index: self.index,
        });
        tracing::info!(
            workflow = self.name.as_str(),
            index = self.index,
            "resuming workflow run"
        );
        self.run_from_index().await
    }

    fn start(&mut self) -> Result<(), WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::Empty);
        }
        self.rearm();
        self.status = WorkflowStatus::Running;
        self.events.publish(FlowEvent::WorkflowStarted {
            workflow_id: self.id,
            workflow_name: self.name.clone(),
        });
        tracing::info!(
            workflow = self.name.as_str(),
            steps = self.steps.len(),
            "starting workflow run"
        );
        Ok(())
    }

    /// Reset run bookkeeping and drive every step back to WAITING. Loop
    /// iterations re-enter through here.
    pub(crate) fn rearm(&mut self) {
        self.index = 0;
        self.outputs.clear();
        self.failures.clear();
        self.last_signal = ControlSignal::None;
        self.pending_skip = false;
        self.pause_flag.store(false, Ordering::SeqCst);
        for step in &mut self.steps {
            step.reset();
        }
    }

    async fn run_from_index(&mut self) -> Result<ExecutionReport, WorkflowError> {
        let run_start = Instant::now();

        loop {
            // pause only takes effect here, at a step boundary
            if self.pause_flag.swap(false, Ordering::SeqCst) {
                self.status = WorkflowStatus::Paused;
                self.events.publish(FlowEvent::WorkflowPaused {
                    workflow_id: self.id,
                    workflow_name: self.name.clone(),
                    at_index: self.index,
                });
                tracing::info!(
                    workflow = self.name.as_str(),
                    index = self.index,
                    "workflow paused"
                );
                return Ok(self.report());
            }

            // live length check: steps edited in are seen here
            if self.index >= self.steps.len() {
                break;
            }

            if self.pending_skip {
                self.pending_skip = false;
                let step = &self.steps[self.index];
                tracing::debug!(step = step.name(), "skipping next queued step");
                self.events.publish(FlowEvent::StepSkipped {
                    workflow_id: self.id,
                    step_id: step.id(),
                    step_name: step.name().to_string(),
                });
                self.index += 1;
                continue;
            }

            let index = self.index;
            let state = Arc::clone(&self.state);
            match self.steps[index].execute(&state).await {
                Ok(outcome) => {
                    self.outputs.push(outcome.value);
                    self.index += 1;
                    match outcome.signal {
                        ControlSignal::None => {}
                        ControlSignal::Skip => self.pending_skip = true,
                        ControlSignal::Break | ControlSignal::Continue => {
                            self.last_signal = outcome.signal;
                            break;
                        }
                    }
                }
                Err(err) => {
                    let step = &self.steps[index];
                    let message = err.to_string();
                    self.failures.push(FailureRecord {
                        step_id: step.id(),
                        step_name: step.name().to_string(),
                        index,
                        error: message.clone(),
                    });

                    if self.exit_on_failure {
                        self.status = WorkflowStatus::Failed;
                        self.events.publish(FlowEvent::WorkflowFailed {
                            workflow_id: self.id,
                            workflow_name: self.name.clone(),
                            error: message,
                        });
                        return Err(WorkflowError::Step {
                            step: step.name().to_string(),
                            source: Box::new(err),
                        });
                    }

                    tracing::warn!(
                        workflow = self.name.as_str(),
                        step = step.name(),
                        error = message.as_str(),
                        "absorbed step failure, continuing"
                    );
                    self.index += 1;
                }
            }
        }

        self.status = WorkflowStatus::Complete;
        self.events.publish(FlowEvent::WorkflowCompleted {
            workflow_id: self.id,
            workflow_name: self.name.clone(),
            steps_completed: self.outputs.len(),
            duration_ms: run_start.elapsed().as_millis() as u64,
        });
        tracing::info!(
            workflow = self.name.as_str(),
            outputs = self.outputs.len(),
            "workflow run complete"
        );
        Ok(self.report())
    }

    fn report(&self) -> ExecutionReport {
        ExecutionReport {
            workflow_id: self.id,
            status: self.status,
            outputs: self.outputs.clone(),
            signal: self.last_signal,
            failures: self.failures.clone(),
            state: lock(&self.state).snapshot(),
        }
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("steps", &self.steps.len())
            .field("index", &self.index)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
