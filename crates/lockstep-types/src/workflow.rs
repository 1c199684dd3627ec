//! Workflow-level domain types: run status and absorbed-failure records.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a workflow, the workflow-level analogue of the step
/// machine plus `Paused` for runs suspended at a step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Waiting,
    Running,
    Paused,
    Complete,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Complete | WorkflowStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Waiting => "waiting",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Complete => "complete",
            WorkflowStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FailureRecord
// ---------------------------------------------------------------------------

/// Record kept when a workflow absorbs a step failure instead of stopping
/// (`exit_on_failure = false`). The failing step keeps its own status and
/// error; this record preserves where in the run it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Identity of the failing step.
    pub step_id: Uuid,
    /// Name of the failing step (denormalized for display).
    pub step_name: String,
    /// Position of the step in the list at the time it failed.
    pub index: usize,
    /// The error message that was absorbed.
    pub error: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
