//! Typed flow-control signals.
//!
//! Signals travel alongside a step's return value, never inside the shared
//! state store -- the interpreter's control flow and the application's data
//! stay in separate channels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A flow-control signal raised by a step and consumed by the nearest
/// enclosing loop or workflow runner.
///
/// - `Break` / `Continue` affect only the nearest enclosing loop and never
///   propagate past one nesting level.
/// - `Skip` makes the enclosing workflow's runner skip exactly the next
///   queued step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    #[default]
    None,
    Break,
    Continue,
    Skip,
}

impl ControlSignal {
    /// Whether this signal stops the current workflow pass (break/continue).
    pub fn interrupts_pass(&self) -> bool {
        matches!(self, ControlSignal::Break | ControlSignal::Continue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlSignal::None => "none",
            ControlSignal::Break => "break",
            ControlSignal::Continue => "continue",
            ControlSignal::Skip => "skip",
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
