//! If/else routing over a single condition evaluation.

use serde_json::{Value, json};

use lockstep_types::error::StepError;

use crate::callable::Callable;
use crate::condition::Condition;
use crate::event::bus::EventBus;
use crate::state::{SharedState, lock};
use crate::step::StepOutcome;

/// Evaluates its condition once per run; executes `left` if true else
/// `right`. A missing branch is a no-op returning null. A branch's signal
/// propagates, so a flow-control step can sit behind a condition.
#[derive(Debug)]
pub struct Conditional {
    condition: Condition,
    left: Option<Callable>,
    right: Option<Callable>,
}

impl Conditional {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            left: None,
            right: None,
        }
    }

    /// The branch taken when the condition is true.
    pub fn left(mut self, callable: Callable) -> Self {
        self.left = Some(callable);
        self
    }

    /// The branch taken when the condition is false.
    pub fn right(mut self, callable: Callable) -> Self {
        self.right = Some(callable);
        self
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
        tracing::debug!(verdict, "conditional evaluated");

        let branch = if verdict {
            self.left.as_mut()
        } else {
            self.right.as_mut()
        };
        match branch {
            Some(callable) => callable.invoke(state).await,
            None => Ok(StepOutcome::value(Value::Null)),
        }
    }

    pub(crate) fn rearm(&mut self) {
        if let Some(callable) = &mut self.left {
            callable.rearm();
        }
        if let Some(callable) = &mut self.right {
            callable.rearm();
        }
    }

    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        if let Some(callable) = &mut self.left {
            callable.attach_events(bus);
        }
        if let Some(callable) = &mut self.right {
            callable.attach_events(bus);
        }
    }

    pub(crate) fn snapshot(&self) -> Value {
        json!({
            "condition": self.condition.summary(),
            "left": self.left.as_ref().map(Callable::snapshot),
            "right": self.right.as_ref().map(Callable::snapshot),
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
    use serde_json::json;

    fn shared() -> SharedState {
        State::new().into_shared()
    }

    #[tokio::test]
    async fn true_condition_takes_left() {
        let mut step = Step::conditional(
            "pick",
            Conditional::new(Condition::new(2, ">", 1).unwrap())
                .left(Callable::function(|_| async { Ok(json!("yes")) }))
                .right(Callable::function(|_| async { Ok(json!("no")) })),
        );
        let outcome = step.execute(&shared()).await.unwrap();
        assert_eq!(outcome.value, json!("yes"));
    }

    #[tokio::test]
    async fn false_condition_takes_right() {
        let mut step = Step::conditional(
            "pick",
            Conditional::new(Condition::new(1, ">", 2).unwrap())
                .left(Callable::function(|_| async { Ok(json!("yes")) }))
                .right(Callable::function(|_| async { Ok(json!("no")) })),
        );
        let outcome = step.execute(&shared()).await.unwrap();
        assert_eq!(outcome.value, json!("no"));
    }

    #[tokio::test]
    async fn missing_branch_is_noop_null() {
        let mut step = Step::conditional(
            "one-armed",
            Conditional::new(Condition::new(1, ">", 2).unwrap())
                .left(Callable::function(|_| async { Ok(json!("yes")) })),
        );
        let outcome = step.execute(&shared()).await.unwrap();
        assert_eq!(outcome.value, Value::Null);
    }

    #[tokio::test]
    async fn half_configured_condition_fails_fast() {
        let mut step = Step::conditional(
            "broken",
            Conditional::new(Condition::default())
                .left(Callable::function(|_| async { Ok(Value::Null) })),
        );
        let err = step.execute(&shared()).await.unwrap_err();
        assert!(matches!(
            err,
            StepError::Condition(ConditionError::Incomplete(_))
        ));
    }

    #[tokio::test]
    async fn branch_signal_propagates() {
        use lockstep_types::signal::ControlSignal;

        let inner = Step::flow_control(
            "raise break",
            ControlSignal::Break,
            Condition::new(1, "==", 1).unwrap(),
        );
        let mut step = Step::conditional(
            "break if",
            Conditional::new(Condition::new(true, "===", true).unwrap())
                .left(Callable::step(inner)),
        );
        let outcome = step.execute(&shared()).await.unwrap();
        assert_eq!(outcome.signal, ControlSignal::Break);
    }

    #[tokio::test]
    async fn condition_reads_live_state() {
        let state = shared();
        lock(&state).set("mode", json!("fast")).unwrap();

        let mut step = Step::conditional(
            "mode check",
            Conditional::new(
                Condition::new(
                    crate::condition::Operand::path("mode"),
                    "===",
                    "fast",
                )
                .unwrap(),
            )
            .left(Callable::function(|_| async { Ok(json!("took fast path")) })),
        );
        let outcome = step.execute(&state).await.unwrap();
        assert_eq!(outcome.value, json!("took fast path"));
    }
}
