//! Event types for the Lockstep notification bus.
//!
//! `FlowEvent` is the unified event type broadcast during step and workflow
//! execution. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels. Every variant names its subject (id + name); failure
//! variants carry the error message as well.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted during step and workflow execution.
///
/// One variant per step status transition, workflow lifecycle change, skip,
/// and structural edit. Subscribers (UI, logging, relays) receive these from
/// the event bus; publishing never blocks the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    // -- Step lifecycle --
    /// A step has been queued for execution (WAITING -> PENDING).
    StepPending { step_id: Uuid, step_name: String },

    /// A step's callable is now executing (PENDING -> RUNNING).
    StepRunning { step_id: Uuid, step_name: String },

    /// A step finished successfully (RUNNING -> COMPLETE).
    StepCompleted {
        step_id: Uuid,
        step_name: String,
        duration_ms: u64,
    },

    /// A step failed terminally (RUNNING -> FAILED).
    StepFailed {
        step_id: Uuid,
        step_name: String,
        error: String,
        will_retry: bool,
    },

    /// A failed attempt will be retried after the configured delay.
    StepRetrying {
        step_id: Uuid,
        step_name: String,
        attempt: u32,
        error: String,
    },

    /// A step was explicitly driven back to WAITING to re-arm.
    StepRearmed { step_id: Uuid, step_name: String },

    /// The runner skipped a queued step in response to a SKIP signal.
    StepSkipped {
        workflow_id: Uuid,
        step_id: Uuid,
        step_name: String,
    },

    // -- Workflow lifecycle --
    /// A workflow run has started from the beginning.
    WorkflowStarted {
        workflow_id: Uuid,
        workflow_name: String,
    },

    /// A paused workflow run has continued from its stored index.
    WorkflowResumed {
        workflow_id: Uuid,
        workflow_name: String,
        at_index: usize,
    },

    /// A workflow run stopped at a step boundary on request.
    WorkflowPaused {
        workflow_id: Uuid,
        workflow_name: String,
        at_index: usize,
    },

    /// A workflow run finished with every remaining step settled.
    WorkflowCompleted {
        workflow_id: Uuid,
        workflow_name: String,
        steps_completed: usize,
        duration_ms: u64,
    },

    /// A workflow run stopped on a step failure (exit-on-failure policy).
    WorkflowFailed {
        workflow_id: Uuid,
        workflow_name: String,
        error: String,
    },

    // -- Structural edits --
    /// A step was appended or inserted into the workflow's list.
    StepAdded {
        workflow_id: Uuid,
        step_id: Uuid,
        step_name: String,
    },

    /// A step was removed from the workflow's list.
    StepRemoved {
        workflow_id: Uuid,
        step_id: Uuid,
        step_name: String,
    },

    /// A step was moved to a new position in the workflow's list.
    StepMoved {
        workflow_id: Uuid,
        step_id: Uuid,
        step_name: String,
        from: usize,
        to: usize,
    },

    /// All steps were removed from the workflow's list.
    StepsCleared {
        workflow_id: Uuid,
        workflow_name: String,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_events_tagged_snake_case() {
        let event = FlowEvent::StepPending {
            step_id: Uuid::now_v7(),
            step_name: "fetch".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_pending\""));
        assert!(json.contains("fetch"));
    }

    #[test]
    fn failure_event_carries_error() {
        let event = FlowEvent::StepFailed {
            step_id: Uuid::now_v7(),
            step_name: "fetch".to_string(),
            error: "connection refused".to_string(),
            will_retry: false,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_failed\""));
        assert!(json.contains("connection refused"));
        let parsed: FlowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            FlowEvent::StepFailed {
                will_retry: false,
                ..
            }
        ));
    }

    #[test]
    fn structural_events_name_their_subject() {
        let workflow_id = Uuid::now_v7();
        let step_id = Uuid::now_v7();
        let event = FlowEvent::StepMoved {
            workflow_id,
            step_id,
            step_name: "transform".to_string(),
            from: 2,
            to: 0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_moved\""));
        let parsed: FlowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, FlowEvent::StepMoved { from: 2, to: 0, .. }));
    }

    #[test]
    fn workflow_lifecycle_roundtrip() {
        let event = FlowEvent::WorkflowCompleted {
            workflow_id: Uuid::now_v7(),
            workflow_name: "pipeline".to_string(),
            steps_completed: 4,
            duration_ms: 120,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: FlowEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed,
            FlowEvent::WorkflowCompleted {
                steps_completed: 4,
                ..
            }
        ));
    }
}
