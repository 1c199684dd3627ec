//! Flow-control signaling: raise BREAK/CONTINUE/SKIP when a condition holds.

use serde_json::{Value, json};

use lockstep_types::error::StepError;
use lockstep_types::signal::ControlSignal;

use crate::condition::Condition;
use crate::state::{SharedState, lock};
use crate::step::StepOutcome;

/// Evaluates its condition and, when true, returns the declared signal as
/// its outcome. The signal is consumed by the nearest enclosing loop
/// (BREAK/CONTINUE) or by the enclosing workflow's runner (SKIP, which
/// skips exactly the next queued step).
#[derive(Debug)]
pub struct FlowControlStep {
    signal: ControlSignal,
    condition: Condition,
}

impl FlowControlStep {
    pub fn new(signal: ControlSignal, condition: Condition) -> Self {
        Self { signal, condition }
    }

    pub(crate) async fn route(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        self.condition.validate()?;
        let verdict = {
            let guard = lock(state);
            self.condition.evaluate(&guard)?
        };
        if verdict {
            tracing::debug!(signal = %self.signal, "flow-control signal raised");
            Ok(StepOutcome::signal(self.signal))
        } else {
            Ok(StepOutcome::value(Value::Null))
        }
    }

    pub(crate) fn snapshot(&self) -> Value {
        json!({
            "signal": self.signal.as_str(),
            "condition": self.condition.summary(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use crate::step::Step;
    use lockstep_types::error::ConditionError;

    fn shared() -> SharedState {
        State::new().into_shared()
    }

    #[tokio::test]
    async fn true_condition_raises_declared_signal() {
        for signal in [
            ControlSignal::Break,
            ControlSignal::Continue,
            ControlSignal::Skip,
        ] {
            let mut step = Step::flow_control(
                "raise",
                signal,
                Condition::new(1, "==", 1).unwrap(),
            );
            let outcome = step.execute(&shared()).await.unwrap();
            assert_eq!(outcome.signal, signal);
            assert_eq!(outcome.value, Value::Null);
        }
    }

    #[tokio::test]
    async fn false_condition_raises_nothing() {
        let mut step = Step::flow_control(
            "hold",
            ControlSignal::Break,
            Condition::new(1, "==", 2).unwrap(),
        );
        let outcome = step.execute(&shared()).await.unwrap();
        assert_eq!(outcome.signal, ControlSignal::None);
    }

    #[tokio::test]
    async fn half_configured_condition_fails_fast() {
        let mut step = Step::flow_control(
            "broken",
            ControlSignal::Skip,
            Condition::default(),
        );
        let err = step.execute(&shared()).await.unwrap_err();
        assert!(matches!(
            err,
            StepError::Condition(ConditionError::Incomplete(_))
        ));
    }
}
