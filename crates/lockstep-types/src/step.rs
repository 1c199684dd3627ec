//! Step-level domain types: declared kinds, the status state machine, and
//! retry policy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StepKind
// ---------------------------------------------------------------------------

/// The declared kind of a step.
///
/// The kind is descriptive -- it names what the step was built as, for
/// notifications and snapshots. Execution behavior is carried by the step's
/// resolved callable, not by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A plain async function bound to the step.
    Action,
    /// Suspends until a duration elapses or a wall-clock instant passes.
    Delay,
    /// A composite logic step (conditional, switch, loop, flow control).
    Logic,
    /// A nested workflow run as a single step.
    Subflow,
    /// Another step wrapped for delegation.
    Nested,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Action => "action",
            StepKind::Delay => "delay",
            StepKind::Logic => "logic",
            StepKind::Subflow => "subflow",
            StepKind::Nested => "nested",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a step.
///
/// Transitions move forward only: `Waiting -> Pending -> Running -> Complete`
/// or `Failed`. A step returns to `Waiting` solely through an explicit
/// `reset()`, which re-arms it for another run (loop iterations do this).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Waiting,
    Pending,
    Running,
    Complete,
    Failed,
}

impl StepStatus {
    /// Whether this status ends a run (no further forward transition).
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Complete | StepStatus::Failed)
    }

    /// Whether the forward state machine permits `self -> to`.
    ///
    /// Re-arming (`-> Waiting`) is allowed from any status except `Running`:
    /// an in-flight step cannot be reset out from under its own execution.
    pub fn can_transition(&self, to: StepStatus) -> bool {
        match (self, to) {
            (StepStatus::Waiting, StepStatus::Pending) => true,
            (StepStatus::Pending, StepStatus::Running) => true,
            (StepStatus::Running, StepStatus::Complete) => true,
            (StepStatus::Running, StepStatus::Failed) => true,
            (from, StepStatus::Waiting) => *from != StepStatus::Running,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Waiting => "waiting",
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Complete => "complete",
            StepStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Default number of attempts when a retry policy is constructed bare.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Retry configuration for a step.
///
/// `max_attempts` counts total executions, not re-executions: a policy of 3
/// runs the callable at most three times. The delay is waited between
/// consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Whether another attempt remains after `attempt` (1-based) has failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
