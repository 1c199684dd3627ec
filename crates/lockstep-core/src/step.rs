//! The atomic executable unit and its status state machine.
//!
//! A step owns a resolved executable (a callable or a composite logic
//! routine), a forward-only status machine, and retry/timeout policy. Every
//! status transition is announced on the event bus with the step's identity.
//! A step never swallows its own failure: errors always propagate to
//! whatever invoked `execute()`; absorbing them is workflow policy.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use lockstep_types::error::StepError;
use lockstep_types::event::FlowEvent;
use lockstep_types::signal::ControlSignal;
use lockstep_types::step::{RetryPolicy, StepKind, StepStatus};

use crate::callable::Callable;
use crate::condition::Condition;
use crate::event::bus::EventBus;
use crate::logic::conditional::Conditional;
use crate::logic::flow::FlowControlStep;
use crate::logic::looping::{IterationSource, LoopStep};
use crate::logic::switch::Switch;
use crate::logic::{LogicKind, LogicStep};
use crate::state::SharedState;
use crate::workflow::Workflow;

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// A step's return value paired with its control signal.
///
/// Control flow travels here, in a typed channel beside the value -- never
/// inside the shared state store.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub value: Value,
    pub signal: ControlSignal,
}

impl StepOutcome {
    /// A plain value with no signal.
    pub fn value(value: Value) -> Self {
        Self {
            value,
            signal: ControlSignal::None,
        }
    }

    /// A null value carrying a signal.
    pub fn signal(signal: ControlSignal) -> Self {
        Self {
            value: Value::Null,
            signal,
        }
    }
}

// ---------------------------------------------------------------------------
// Executable
// ---------------------------------------------------------------------------

/// What a step runs: a resolved callable or a composite logic routine.
pub(crate) enum Executable {
    Callable(Callable),
    Logic(Box<LogicStep>),
}

impl Executable {
    pub(crate) async fn invoke(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        match self {
            Executable::Callable(callable) => callable.invoke(state).await,
            Executable::Logic(logic) => logic.route(state).await,
        }
    }

    pub(crate) fn rearm(&mut self) {
        match self {
            Executable::Callable(callable) => callable.rearm(),
            Executable::Logic(logic) => logic.rearm(),
        }
    }

    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        match self {
            Executable::Callable(callable) => callable.attach_events(bus),
            Executable::Logic(logic) => logic.attach_events(bus),
        }
    }

    pub(crate) fn snapshot(&self) -> Value {
        match self {
            Executable::Callable(callable) => callable.snapshot(),
            Executable::Logic(logic) => logic.snapshot(),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One executable unit of a workflow.
pub struct Step {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) kind: StepKind,
    pub(crate) exec: Executable,
    pub(crate) status: StepStatus,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) last_value: Option<Value>,
    pub(crate) last_error: Option<String>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) elapsed: Option<Duration>,
    pub(crate) events: EventBus,
}

impl Step {
    /// Construct a step from an explicit kind and callable. The callable is
    /// resolved here, once; execution never re-classifies it.
    pub fn new(name: impl Into<String>, kind: StepKind, callable: Callable) -> Self {
        Self::build(name.into(), kind, Executable::Callable(callable))
    }

    fn build(name: String, kind: StepKind, exec: Executable) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            kind,
            exec,
            status: StepStatus::Waiting,
            retry: None,
            timeout: None,
            last_value: None,
            last_error: None,
            started_at: None,
            finished_at: None,
            elapsed: None,
            events: EventBus::default(),
        }
    }

    // -- Constructors ------------------------------------------------------

    /// An action step bound to an async function.
    pub fn action<F, Fut>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(SharedState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::new(name, StepKind::Action, Callable::function(function))
    }

    /// A step that delegates to another step.
    pub fn wrap(name: impl Into<String>, step: Step) -> Self {
        Self::new(name, StepKind::Nested, Callable::step(step))
    }

    /// A step that runs a nested workflow against the caller's state. Its
    /// result is the nested workflow's full terminal state.
    pub fn subflow(name: impl Into<String>, workflow: Workflow) -> Self {
        Self::new(name, StepKind::Subflow, Callable::workflow(workflow))
    }

    /// A subflow running against a deep copy of the caller's state.
    pub fn subflow_isolated(name: impl Into<String>, workflow: Workflow) -> Self {
        Self::new(
            name,
            StepKind::Subflow,
            Callable::workflow_isolated(workflow),
        )
    }

    /// A step that suspends for a duration.
    pub fn delay(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(
            name,
            StepKind::Delay,
            Callable::function(move |_state| async move {
                tokio::time::sleep(duration).await;
                Ok(Value::Null)
            }),
        )
    }

    /// A step that suspends until a wall-clock instant has passed. A
    /// deadline already in the past completes immediately.
    pub fn delay_until(name: impl Into<String>, deadline: DateTime<Utc>) -> Self {
        Self::new(
            name,
            StepKind::Delay,
            Callable::function(move |_state| async move {
                let remaining = (deadline - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                tokio::time::sleep(remaining).await;
                Ok(Value::Null)
            }),
        )
    }

    /// A conditional step: evaluate once, run `left` if true else `right`.
    pub fn conditional(name: impl Into<String>, conditional: Conditional) -> Self {
        Self::build(
            name.into(),
            StepKind::Logic,
            Executable::Logic(Box::new(LogicStep::new(LogicKind::Conditional(
                conditional,
            )))),
        )
    }

    /// A switch step: ordered cases, first match only, optional default.
    pub fn switch(name: impl Into<String>, switch: Switch) -> Self {
        Self::build(
            name.into(),
            StepKind::Logic,
            Executable::Logic(Box::new(LogicStep::new(LogicKind::Switch(
                switch.resolve(),
            )))),
        )
    }

    /// A `while` loop step. The iteration ceiling is mandatory: the loop
    /// fails with `StepError::MaxIterations` if it is reached while the
    /// condition is still true.
    pub fn while_loop(
        name: impl Into<String>,
        condition: Condition,
        max_iterations: u32,
        body: Workflow,
    ) -> Self {
        Self::build(
            name.into(),
            StepKind::Logic,
            Executable::Logic(Box::new(LogicStep::new(LogicKind::Loop(
                LoopStep::while_loop(condition, max_iterations, body),
            )))),
        )
    }

    /// A `for_each` loop step publishing each element at the default
    /// element path.
    pub fn for_each(
        name: impl Into<String>,
        source: impl Into<IterationSource>,
        body: Workflow,
    ) -> Self {
        Self::build(
            name.into(),
            StepKind::Logic,
            Executable::Logic(Box::new(LogicStep::new(LogicKind::Loop(
                LoopStep::for_each(source, body),
            )))),
        )
    }

    /// A `for_each` loop step publishing each element at `element_path`.
    pub fn for_each_at(
        name: impl Into<String>,
        source: impl Into<IterationSource>,
        element_path: impl Into<String>,
        body: Workflow,
    ) -> Self {
        Self::build(
            name.into(),
            StepKind::Logic,
            Executable::Logic(Box::new(LogicStep::new(LogicKind::Loop(
                LoopStep::for_each(source, body).element_path(element_path),
            )))),
        )
    }

    /// A flow-control step raising `signal` when its condition holds.
    pub fn flow_control(
        name: impl Into<String>,
        signal: ControlSignal,
        condition: Condition,
    ) -> Self {
        Self::build(
            name.into(),
            StepKind::Logic,
            Executable::Logic(Box::new(LogicStep::new(LogicKind::FlowControl(
                FlowControlStep::new(signal, condition),
            )))),
        )
    }

    // -- Policy ------------------------------------------------------------

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    // -- Accessors ---------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The value stored by the most recent successful run.
    pub fn last_value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }

    /// The error stored by the most recent failed run.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall-clock duration of the most recent run, retries included.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Drive the step back to WAITING to re-arm it for a new run. A running
    /// step cannot be re-armed; last value/error are kept for inspection
    /// until the next run overwrites them.
    pub fn reset(&mut self) {
        if self.status == StepStatus::Running {
            return;
        }
        if self.status != StepStatus::Waiting {
            self.transition(StepStatus::Waiting);
        }
        self.exec.rearm();
    }

    /// Route this step's (and any nested structure's) notifications to `bus`.
    pub(crate) fn attach_events(&mut self, bus: &EventBus) {
        self.events = bus.clone();
        self.exec.attach_events(bus);
    }

    fn transition(&mut self, to: StepStatus) {
        debug_assert!(
            self.status.can_transition(to),
            "illegal step transition {} -> {}",
            self.status,
            to
        );
        self.status = to;
        let event = match to {
            StepStatus::Waiting => FlowEvent::StepRearmed {
                step_id: self.id,
                step_name: self.name.clone(),
            },
            StepStatus::Pending => FlowEvent::StepPending {
                step_id: self.id,
                step_name: self.name.clone(),
            },
            StepStatus::Running => FlowEvent::StepRunning {
                step_id: self.id,
                step_name: self.name.clone(),
            },
            StepStatus::Complete => FlowEvent::StepCompleted {
                step_id: self.id,
                step_name: self.name.clone(),
                duration_ms: self
                    .elapsed
                    .map_or(0, |elapsed| elapsed.as_millis() as u64),
            },
            StepStatus::Failed => FlowEvent::StepFailed {
                step_id: self.id,
                step_name: self.name.clone(),
                error: self.last_error.clone().unwrap_or_default(),
                will_retry: false,
            },
        };
        self.events.publish(event);
    }

    // -- Execution ---------------------------------------------------------

    /// Run the resolved executable against the current shared state.
    ///
    /// Requires a re-armed (WAITING) step; `&mut self` guarantees at most
    /// one in-flight execution per instance. On success the return value is
    /// stored and the step completes; on failure the error is stored, the
    /// step fails, and the same error propagates. With retry configured,
    /// failed attempts wait the policy delay and re-invoke; the last failure
    /// is what ultimately propagates. With a timeout configured, an attempt
    /// that has not settled in time is abandoned as a timeout failure --
    /// cancellation is cooperative, the callable is not forcibly killed.
    pub fn execute<'a>(
        &'a mut self,
        state: &'a SharedState,
    ) -> BoxFuture<'a, Result<StepOutcome, StepError>> {
        Box::pin(self.execute_inner(state))
    }

    async fn execute_inner(
        &mut self,
        state: &SharedState,
    ) -> Result<StepOutcome, StepError> {
        if self.status != StepStatus::Waiting {
            return Err(StepError::NotReady {
                status: self.status,
            });
        }

        self.transition(StepStatus::Pending);
        self.started_at = Some(Utc::now());
        self.finished_at = None;
        self.elapsed = None;
        let started = Instant::now();
        self.transition(StepStatus::Running);

        let mut attempt: u32 = 1;

        let result = loop {
            let settled = match self.timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.exec.invoke(state)).await {
                        Ok(settled) => settled,
                        Err(_) => Err(StepError::Timeout { after: limit }),
                    }
                }
                None => self.exec.invoke(state).await,
            };

            let retry_allowed = self
                .retry
                .is_some_and(|policy| policy.should_retry(attempt));
            match settled {
                Ok(outcome) => break Ok(outcome),
                Err(err) if retry_allowed => {
                    let delay = self.retry.map_or(Duration::ZERO, |policy| policy.delay);
                    tracing::warn!(
                        step = self.name.as_str(),
                        attempt,
                        error = %err,
                        "step attempt failed, retrying"
                    );
                    self.events.publish(FlowEvent::StepRetrying {
                        step_id: self.id,
                        step_name: self.name.clone(),
                        attempt,
                        error: err.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                    self.exec.rearm();
                    attempt += 1;
                }
                Err(err) => break Err(err),
            }
        };

        self.finished_at = Some(Utc::now());
        self.elapsed = Some(started.elapsed());

        match result {
            Ok(outcome) => {
                self.last_value = Some(outcome.value.clone());
                self.last_error = None;
                self.transition(StepStatus::Complete);
                Ok(outcome)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                self.transition(StepStatus::Failed);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
