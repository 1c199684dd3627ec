//! Callable polymorphism: the unit of work bound to a step.
//!
//! A callable is one of exactly three variants -- a plain async function, a
//! nested step, or a nested workflow -- resolved once at construction into a
//! tagged variant and never re-classified per call. Every callable receives
//! the shared state as its one explicit context argument.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::{Value, json};

use lockstep_types::error::StepError;

use crate::event::bus::EventBus;
use crate::state::{SharedState, lock};
use crate::step::{Step, StepOutcome};
use crate::workflow::Workflow;

/// The boxed future a function callable produces.
pub type CallableFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// A plain async function bound to a step. Invoked with a clone of the
/// shared state handle on every attempt.
pub type StepFn = Arc<dyn Fn(SharedState) -> CallableFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// StateMode
// ---------------------------------------------------------------------------

/// How a nested workflow sees the caller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    /// Run against the caller's own container; writes are visible outside.
    Share,
    /// Run against a deep copy; nothing leaks across the boundary.
    Isolate,
}

impl StateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateMode::Share => "share",
            StateMode::Isolate => "isolate",
        }
    }
}

// ---------------------------------------------------------------------------
// Callable
// ---------------------------------------------------------------------------

/// The polymorphic executable bound to a step.
pub enum Callable {
    /// A plain async function.
    Function(StepFn),
    /// Delegation to another step.
    Step(Box<Step>),
    /// A nested workflow run as a unit.
    Workflow {
        workflow: Box<Workflow>,
        mode: StateMode,
    },
}

impl Callable {
    /// Bind an async function.
    pub fn function<F, Fut>(function: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Callable::Function(Arc::new(move |state| Box::pin(function(state))))
    }

    /// Bind a nested step.
    pub fn step(step: Step) -> Self {
        Callable::Step(Box::new(step))
    }

    /// Bind a nested workflow sharing the caller's state.
    pub fn workflow(workflow: Workflow) -> Self {
        Callable::Workflow {
            workflow: Box::new(workflow),
            mode: StateMode::Share,
        }
    }

    /// Bind a nested workflow running against a deep copy of the caller's
    /// state.
    pub fn workflow_isolated(workflow: Workflow) -> Self {
        Callable::Workflow {
            workflow: Box::new(workflow),
            mode: StateMode::Isolate,
        }
    }

    /// The resolved variant's name, for snapshots and notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            Callable::Function(_) => "function",
            Callable::Step(_) => "step",
            Callable::Workflow { .. } => "workflow",
        }
    }

    /// Run the callable against the current shared state.
    ///
    /// - A function's return value passes through with no signal.
    /// - A nested step's outcome (value and signal) propagates unchanged;
    ///   a terminal inner step is re-armed first.
    /// - A nested workflow's result is its full terminal state snapshot,
    ///   never just its last step's return value. BREAK/CONTINUE raised
    ///   inside it were consumed at that workflow's own level and do not
    ///   propagate outward.
    pub(crate) async fn invoke(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        match self {
            Callable::Function(function) => {
                let value = function(Arc::clone(state))
                    .await
                    .map_err(|err| StepError::Execution(err.to_string()))?;
                Ok(StepOutcome::value(value))
            }
            Callable::Step(inner) => {
                if inner.status().is_terminal() {
                    inner.reset();
                }
                inner.execute(state).await
            }
            Callable::Workflow { workflow, mode } => {
                match mode {
                    StateMode::Share => workflow.adopt_state(Arc::clone(state)),
                    StateMode::Isolate => {
                        let copy = lock(state).clone();
                        workflow.adopt_state(copy.into_shared());
                    }
                }
                let report = workflow
                    .execute()
                    .await
                    .map_err(|err| StepError::Workflow(Box::new(err)))?;
                Ok(StepOutcome::value(report.state))
            }
        }
    }

    /// Re-arm any nested structure for another invocation.
    pub(crate) fn rearm(&mut self) {
        match self {
            Callable::Function(_) => {}
            Callable::Step(inner) => inner.reset(),
            Callable::Workflow { workflow, .. } => workflow.rearm(),
        }
    }

    /// Route notifications from nested structure onto `bus`.
    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        match self {
            Callable::Function(_) => {}
            Callable::Step(inner) => inner.attach_events(bus),
            Callable::Workflow { workflow, .. } => workflow.attach_events(bus),
        }
    }

    /// Lossy description: functions have no serializable form.
    pub(crate) fn snapshot(&self) -> Value {
        match self {
            Callable::Function(_) => json!("function"),
            Callable::Step(inner) => json!({ "step": inner.snapshot() }),
            Callable::Workflow { workflow, mode } => json!({
                "workflow": workflow.snapshot(),
                "state_mode": mode.as_str(),
            }),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(_) => f.write_str("Callable::Function"),
            Callable::Step(inner) => write!(f, "Callable::Step({})", inner.name()),
            Callable::Workflow { workflow, mode } => {
                write!(f, "Callable::Workflow({}, {:?})", workflow.name(), mode)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
