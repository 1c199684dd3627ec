//! Composite logic steps: routing behavior layered on the condition
//! evaluation primitive.
//!
//! Composition, not inheritance: one `LogicStep` holds a kind tag and
//! dispatches through per-kind `route` functions. The kinds:
//! - `conditional` -- evaluate once, run left or right
//! - `switch` -- ordered cases, first match only, optional default
//! - `loop` -- `while` with a mandatory iteration ceiling, or `for_each`
//!   over an ordered collection
//! - `flow_control` -- raise BREAK/CONTINUE/SKIP when a condition holds

pub mod conditional;
pub mod flow;
pub mod looping;
pub mod switch;

use serde_json::{Value, json};

use lockstep_types::error::StepError;

use crate::event::bus::EventBus;
use crate::state::SharedState;
use crate::step::StepOutcome;

use self::conditional::Conditional;
use self::flow::FlowControlStep;
use self::looping::LoopStep;
use self::switch::SwitchStep;

/// The kind tag for a composite logic step.
pub(crate) enum LogicKind {
    Conditional(Conditional),
    Switch(SwitchStep),
    Loop(LoopStep),
    FlowControl(FlowControlStep),
}

/// A composite logic step, executed by a `Step` with kind `logic`.
pub(crate) struct LogicStep {
    kind: LogicKind,
}

impl LogicStep {
    pub(crate) fn new(kind: LogicKind) -> Self {
        Self { kind }
    }

    pub(crate) async fn route(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        match &mut self.kind {
            LogicKind::Conditional(conditional) => conditional.route(state).await,
            LogicKind::Switch(switch) => switch.route(state).await,
            LogicKind::Loop(looping) => looping.route(state).await,
            LogicKind::FlowControl(flow) => flow.route(state).await,
        }
    }

    pub(crate) fn rearm(&mut self) {
        match &mut self.kind {
            LogicKind::Conditional(conditional) => conditional.rearm(),
            LogicKind::Switch(switch) => switch.rearm(),
            LogicKind::Loop(looping) => looping.rearm(),
            LogicKind::FlowControl(_) => {}
        }
    }

    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        match &mut self.kind {
            LogicKind::Conditional(conditional) => conditional.attach_events(bus),
            LogicKind::Switch(switch) => switch.attach_events(bus),
            LogicKind::Loop(looping) => looping.attach_events(bus),
            LogicKind::FlowControl(_) => {}
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match &self.kind {
            LogicKind::Conditional(_) => "conditional",
            LogicKind::Switch(_) => "switch",
            LogicKind::Loop(_) => "loop",
            LogicKind::FlowControl(_) => "flow_control",
        }
    }

    pub(crate) fn snapshot(&self) -> Value {
        let detail = match &self.kind {
            LogicKind::Conditional(conditional) => conditional.snapshot(),
            LogicKind::Switch(switch) => switch.snapshot(),
            LogicKind::Loop(looping) => looping.snapshot(),
            LogicKind::FlowControl(flow) => flow.snapshot(),
        };
        json!({ "logic": self.label(), "detail": detail })
    }
}
