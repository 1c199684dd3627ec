//! Iteration: `while` loops with a mandatory ceiling and `for_each` over an
//! ordered collection.
//!
//! The loop body is itself a workflow, re-armed and run against the shared
//! parent state each iteration. A BREAK signal from the body stops the loop
//! immediately, keeping partial results; CONTINUE skips the rest of the
//! current iteration's steps and proceeds. Both are consumed here -- they
//! never propagate past the loop.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use lockstep_types::error::StepError;
use lockstep_types::signal::ControlSignal;

use crate::condition::Condition;
use crate::event::bus::EventBus;
use crate::state::{SharedState, State, lock};
use crate::step::StepOutcome;
use crate::workflow::Workflow;

/// Where `for_each` publishes the current element before each iteration.
pub const DEFAULT_ELEMENT_PATH: &str = "item";

// ---------------------------------------------------------------------------
// IterationSource
// ---------------------------------------------------------------------------

/// Where a `for_each` loop's elements come from.
#[derive(Clone)]
pub enum IterationSource {
    /// A literal ordered collection.
    Items(Vec<Value>),
    /// A state path expected to hold an ordered collection at loop start.
    Path(String),
    /// A function yielding the collection, invoked with the state.
    Generator(Arc<dyn Fn(&State) -> Vec<Value> + Send + Sync>),
}

impl IterationSource {
    pub fn items(items: Vec<Value>) -> Self {
        IterationSource::Items(items)
    }

    pub fn path(path: impl Into<String>) -> Self {
        IterationSource::Path(path.into())
    }

    pub fn generator<F>(generator: F) -> Self
    where
        F: Fn(&State) -> Vec<Value> + Send + Sync + 'static,
    {
        IterationSource::Generator(Arc::new(generator))
    }

    fn resolve(&self, state: &SharedState) -> Result<Vec<Value>, StepError> {
        match self {
            IterationSource::Items(items) => Ok(items.clone()),
            IterationSource::Path(path) => {
                match lock(state).get_or(path, Value::Null) {
                    Value::Array(items) => Ok(items),
                    other => Err(StepError::Execution(format!(
                        "for_each source at '{path}' is not a sequence (found {other})"
                    ))),
                }
            }
            IterationSource::Generator(generator) => Ok(generator(&lock(state))),
        }
    }
}

impl From<Vec<Value>> for IterationSource {
    fn from(items: Vec<Value>) -> Self {
        IterationSource::Items(items)
    }
}

impl fmt::Debug for IterationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationSource::Items(items) => write!(f, "Items({})", items.len()),
            IterationSource::Path(path) => write!(f, "Path({path})"),
            IterationSource::Generator(_) => f.write_str("Generator"),
        }
    }
}

// ---------------------------------------------------------------------------
// LoopStep
// ---------------------------------------------------------------------------

enum LoopMode {
    While {
        condition: Condition,
        max_iterations: u32,
        body: Workflow,
    },
    ForEach {
        source: IterationSource,
        element_path: String,
        body: Workflow,
    },
}

/// A loop over a body workflow, in `while` or `for_each` mode. Both modes
/// return the ordered list of per-iteration results (each iteration's
/// result is the body run's last output).
pub struct LoopStep {
    mode: LoopMode,
}

impl LoopStep {
    /// A `while` loop: the condition is re-evaluated before every iteration
    /// and the body runs while it holds. The ceiling is mandatory -- if it
    /// is reached while the condition is still true, the loop fails with
    /// `StepError::MaxIterations`, guaranteeing termination independent of
    /// the logical condition.
    pub fn while_loop(condition: Condition, max_iterations: u32, body: Workflow) -> Self {
        Self {
            mode: LoopMode::While {
                condition,
                max_iterations,
                body,
            },
        }
    }

    /// A `for_each` loop over an ordered collection, publishing the current
    /// element into the shared state before each iteration.
    pub fn for_each(source: impl Into<IterationSource>, body: Workflow) -> Self {
        Self {
            mode: LoopMode::ForEach {
                source: source.into(),
                element_path: DEFAULT_ELEMENT_PATH.to_string(),
                body,
            },
        }
    }

    /// Override where `for_each` publishes the current element. No effect
    /// on a `while` loop.
    pub fn element_path(mut self, path: impl Into<String>) -> Self {
        if let LoopMode::ForEach { element_path, .. } = &mut self.mode {
            *element_path = path.into();
        }
        self
    }

    pub(crate) async fn route(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        match &mut self.mode {
            LoopMode::While {
                condition,
                max_iterations,
                body,
            } => {
                condition.validate()?;
                let mut results = Vec::new();
                let mut iterations: u32 = 0;
                loop {
                    let verdict = {
                        let guard = lock(state);
                        condition.evaluate(&guard)?
                    };
                    if !verdict {
                        break;
                    }
                    if iterations >= *max_iterations {
                        return Err(StepError::MaxIterations {
                            limit: *max_iterations,
                        });
                    }

                    body.adopt_state(Arc::clone(state));
                    let report = body
                        .execute()
                        .await
                        .map_err(|err| StepError::Workflow(Box::new(err)))?;
                    results.push(report.outputs.last().cloned().unwrap_or(Value::Null));
                    iterations += 1;
                    tracing::debug!(iterations, "while iteration finished");

                    if report.signal == ControlSignal::Break {
                        break;
                    }
                }
                Ok(StepOutcome::value(Value::Array(results)))
            }
            LoopMode::ForEach {
                source,
                element_path,
                body,
            } => {
                let items = source.resolve(state)?;
                let mut results = Vec::with_capacity(items.len());
                for element in items {
                    lock(state).set(element_path, element)?;

                    body.adopt_state(Arc::clone(state));
                    let report = body
                        .execute()
                        .await
                        .map_err(|err| StepError::Workflow(Box::new(err)))?;
                    results.push(report.outputs.last().cloned().unwrap_or(Value::Null));

                    if report.signal == ControlSignal::Break {
                        break;
                    }
                }
                Ok(StepOutcome::value(Value::Array(results)))
            }
        }
    }

    pub(crate) fn rearm(&mut self) {
        match &mut self.mode {
            LoopMode::While { body, .. } | LoopMode::ForEach { body, .. } => body.rearm(),
        }
    }

    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        match &mut self.mode {
            LoopMode::While { body, .. } | LoopMode::ForEach { body, .. } => {
                body.attach_events(bus);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Value {
        match &self.mode {
            LoopMode::While {
                condition,
                max_iterations,
                body,
            } => json!({
                "mode": "while",
                "condition": condition.summary(),
                "max_iterations": max_iterations,
                "body": body.snapshot(),
            }),
            LoopMode::ForEach {
                source,
                element_path,
                body,
            } => json!({
                "mode": "for_each",
                "source": format!("{source:?}"),
                "element_path": element_path,
                "body": body.snapshot(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
