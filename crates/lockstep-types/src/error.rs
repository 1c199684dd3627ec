//! Error taxonomy for the Lockstep engine.
//!
//! Per-domain error enums with `#[from]` conversions. `StepError` and
//! `WorkflowError` box each other because nested execution is mutually
//! recursive: a step may run a workflow whose steps may run workflows.

use std::time::Duration;

use thiserror::Error;

use crate::step::StepStatus;

/// Errors from parsing or applying a path expression.
#[derive(Debug, Error)]
pub enum PathError {
    /// `set`/`delete` require at least one key; `get` treats an empty path
    /// as "the whole container".
    #[error("path is empty")]
    Empty,

    /// A dotted or quoted segment with no characters in it.
    #[error("path contains an empty key")]
    EmptyKey,

    #[error("malformed path: {0}")]
    Malformed(String),
}

/// Errors from mutating the state container.
#[derive(Debug, Error)]
pub enum StateError {
    /// Any mutation after `freeze()` fails with this, uniformly.
    #[error("state is frozen")]
    Frozen,

    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    /// Seeding and merging take a JSON object; anything else is rejected.
    #[error("state payload must be a json object")]
    NotAnObject,
}

/// Errors from evaluating a condition triple.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The operator spelling matched nothing; unknown spellings never
    /// default to a falsy result.
    #[error("unknown operator: '{0}'")]
    UnknownOperator(String),

    /// Subject, operator, and value must all be explicitly assigned.
    #[error("condition is incomplete: missing {0}")]
    Incomplete(&'static str),

    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),

    /// `custom_function` requires a predicate on the value side.
    #[error("operator requires a predicate value")]
    PredicateExpected,

    /// A predicate operand cannot be resolved to a comparison value.
    #[error("a predicate operand has no value form")]
    PredicateOperand,
}

/// Errors from executing a single step.
#[derive(Debug, Error)]
pub enum StepError {
    /// The bound callable reported a failure.
    #[error("callable failed: {0}")]
    Execution(String),

    /// The callable did not settle within the configured duration. The
    /// callable is not forcibly killed; the engine only stops waiting.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// `execute()` was called on a step that is not re-armed.
    #[error("step is not re-armed (status is {status})")]
    NotReady { status: StepStatus },

    /// A `while` loop hit its iteration ceiling with the condition still
    /// true.
    #[error("loop exceeded {limit} iterations")]
    MaxIterations { limit: u32 },

    #[error(transparent)]
    Condition(#[from] ConditionError),

    #[error(transparent)]
    State(#[from] StateError),

    /// A nested workflow failed under its own exit-on-failure policy.
    #[error("nested workflow failed: {0}")]
    Workflow(Box<WorkflowError>),
}

/// Errors from running a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Executing a workflow with zero steps is an error, consistently.
    #[error("workflow has no steps")]
    Empty,

    /// A step failed and `exit_on_failure` stopped the run.
    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<StepError>,
    },

    #[error(transparent)]
    State(#[from] StateError),

    /// `resume()` is only valid on a paused workflow.
    #[error("workflow is not paused")]
    NotPaused,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
