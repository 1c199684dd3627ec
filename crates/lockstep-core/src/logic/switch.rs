//! Multi-way dispatch over an ordered case list.

use serde_json::{Value, json};

use lockstep_types::error::StepError;

use crate::callable::Callable;
use crate::condition::{Condition, Operand};
use crate::event::bus::EventBus;
use crate::state::{SharedState, lock};
use crate::step::StepOutcome;

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

/// One switch entry: a condition paired with the callable it selects.
#[derive(Debug)]
pub struct Case {
    pub(crate) condition: Condition,
    pub(crate) callable: Callable,
}

impl Case {
    pub fn new(condition: Condition, callable: Callable) -> Self {
        Self {
            condition,
            callable,
        }
    }
}

// ---------------------------------------------------------------------------
// Switch (builder)
// ---------------------------------------------------------------------------

/// Builder for a switch step.
///
/// A common subject declared on the switch is pushed into each case at
/// resolution unless the case already declares its own subject --
/// `subject_override` forces it into every case regardless.
#[derive(Debug, Default)]
pub struct Switch {
    cases: Vec<Case>,
    default: Option<Callable>,
    subject: Option<Operand>,
    force_subject: bool,
}

impl Switch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case(mut self, condition: Condition, callable: Callable) -> Self {
        self.cases.push(Case::new(condition, callable));
        self
    }

    /// The callable run when no case matches.
    pub fn default_case(mut self, callable: Callable) -> Self {
        self.default = Some(callable);
        self
    }

    /// Common subject for cases that do not declare their own.
    pub fn subject(mut self, subject: impl Into<Operand>) -> Self {
        self.subject = Some(subject.into());
        self.force_subject = false;
        self
    }

    /// Common subject forced into every case.
    pub fn subject_override(mut self, subject: impl Into<Operand>) -> Self {
        self.subject = Some(subject.into());
        self.force_subject = true;
        self
    }

    /// Inject the common subject and fix the case order. Done once, at
    /// construction of the owning step.
    pub(crate) fn resolve(self) -> SwitchStep {
        let Switch {
            mut cases,
            default,
            subject,
            force_subject,
        } = self;
        if let Some(subject) = subject {
            for case in &mut cases {
                if force_subject || !case.condition.has_subject() {
                    case.condition.set_subject(subject.clone());
                }
            }
        }
        SwitchStep { cases, default }
    }
}

// ---------------------------------------------------------------------------
// SwitchStep (resolved)
// ---------------------------------------------------------------------------

/// A resolved switch: ordered cases plus an optional default.
#[derive(Debug)]
pub(crate) struct SwitchStep {
    cases: Vec<Case>,
    default: Option<Callable>,
}

impl SwitchStep {
    /// Evaluate cases strictly in list order and execute only the first
    /// match -- no fall-through. If none match, the default runs; with no
    /// default the switch is a no-op returning null.
    pub(crate) async fn route(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        for case in &self.cases {
            case.condition.validate()?;
        }

        let matched = {
            let guard = lock(state);
            let mut matched = None;
            for (index, case) in self.cases.iter().enumerate() {
                if case.condition.evaluate(&guard)? {
                    matched = Some(index);
                    break;
                }
            }
            matched
        };

        match matched {
            Some(index) => {
                tracing::debug!(case = index, "switch matched");
                self.cases[index].callable.invoke(state).await
            }
            None => match self.default.as_mut() {
                Some(callable) => {
                    tracing::debug!("switch fell through to default");
                    callable.invoke(state).await
                }
                None => Ok(StepOutcome::value(Value::Null)),
            },
        }
    }

    pub(crate) fn rearm(&mut self) {
        for case in &mut self.cases {
            case.callable.rearm();
        }
        if let Some(callable) = &mut self.default {
            callable.rearm();
        }
    }

    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        for case in &mut self.cases {
            case.callable.attach_events(bus);
        }
        if let Some(callable) = &mut self.default {
            callable.attach_events(bus);
        }
    }

    pub(crate) fn snapshot(&self) -> Value {
        json!({
            "cases": self
                .cases
                .iter()
                .map(|case| case.condition.summary())
                .collect::<Vec<_>>(),
            "has_default": self.default.is_some(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
