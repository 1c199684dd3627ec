//! Text snapshots of steps and workflows for logging and debugging.
//!
//! Lossy by design: function callables have no serializable form and render
//! as kind tags; nested steps and workflows render recursively. The `Value`
//! form composes into larger documents; `describe()` pretty-prints it.

use serde_json::{Value, json};

use crate::step::Step;
use crate::workflow::Workflow;

impl Step {
    /// A lossy description of this step's configuration and current state.
    pub fn snapshot(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "name": self.name,
            "kind": self.kind.as_str(),
            "status": self.status.as_str(),
            "retry": self.retry.map(|policy| json!({
                "max_attempts": policy.max_attempts,
                "delay_ms": policy.delay.as_millis() as u64,
            })),
            "timeout_ms": self.timeout.map(|limit| limit.as_millis() as u64),
            "last_error": self.last_error,
            "started_at": self.started_at.map(|at| at.to_rfc3339()),
            "finished_at": self.finished_at.map(|at| at.to_rfc3339()),
            "elapsed_ms": self.elapsed.map(|elapsed| elapsed.as_millis() as u64),
            "callable": self.exec.snapshot(),
        })
    }

    /// Pretty-printed snapshot text.
    pub fn describe(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_default()
    }
}

impl Workflow {
    /// A lossy description of this workflow's configuration and current
    /// state, including every step.
    pub fn snapshot(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "name": self.name,
            "status": self.status.as_str(),
            "index": self.index,
            "exit_on_failure": self.exit_on_failure(),
            "steps": self.steps.iter().map(Step::snapshot).collect::<Vec<_>>(),
            "outputs": self.outputs,
            "failures": self.failures,
        })
    }

    /// Pretty-printed snapshot text.
    pub fn describe(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::logic::conditional::Conditional;
    use lockstep_types::step::RetryPolicy;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn step_snapshot_names_kind_and_status() {
        let step = Step::action("fetch", |_| async { Ok(Value::Null) })
            .with_retry(RetryPolicy::new(2, Duration::from_millis(10)))
            .with_timeout(Duration::from_secs(1));
        let snapshot = step.snapshot();

        assert_eq!(snapshot["name"], json!("fetch"));
        assert_eq!(snapshot["kind"], json!("action"));
        assert_eq!(snapshot["status"], json!("waiting"));
        assert_eq!(snapshot["retry"]["max_attempts"], json!(2));
        assert_eq!(snapshot["timeout_ms"], json!(1000));
        // functions are lossy: rendered as a kind tag only
        assert_eq!(snapshot["callable"], json!("function"));
    }

    #[test]
    fn logic_step_snapshot_describes_condition() {
        let step = Step::conditional(
            "gate",
            Conditional::new(Condition::new(2, ">", 1).unwrap()),
        );
        let snapshot = step.snapshot();
        assert_eq!(snapshot["kind"], json!("logic"));
        assert_eq!(snapshot["callable"]["logic"], json!("conditional"));
        assert_eq!(
            snapshot["callable"]["detail"]["condition"],
            json!("2 greater_than 1")
        );
    }

    #[test]
    fn workflow_snapshot_lists_every_step() {
        let mut workflow = Workflow::new("pipeline");
        workflow.add_step(Step::action("a", |_| async { Ok(Value::Null) }));
        workflow.add_step(Step::delay("b", Duration::from_millis(1)));

        let snapshot = workflow.snapshot();
        assert_eq!(snapshot["name"], json!("pipeline"));
        assert_eq!(snapshot["steps"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["steps"][0]["name"], json!("a"));
        assert_eq!(snapshot["steps"][1]["kind"], json!("delay"));
    }

    #[test]
    fn nested_workflow_renders_recursively() {
        let mut nested = Workflow::new("inner");
        nested.add_step(Step::action("leaf", |_| async { Ok(Value::Null) }));
        let step = Step::subflow("outer", nested);

        let snapshot = step.snapshot();
        assert_eq!(snapshot["callable"]["state_mode"], json!("share"));
        assert_eq!(
            snapshot["callable"]["workflow"]["steps"][0]["name"],
            json!("leaf")
        );
    }

    #[tokio::test]
    async fn describe_is_valid_pretty_json() {
        let mut workflow = Workflow::new("described");
        workflow.add_step(Step::action("only", |_| async { Ok(json!(1)) }));
        workflow.execute().await.unwrap();

        let text = workflow.describe();
        assert!(text.contains('\n'));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["status"], json!("complete"));
        assert_eq!(parsed["outputs"], json!([1]));
    }
}
