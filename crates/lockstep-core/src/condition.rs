//! The condition evaluation primitive shared by every composite logic step.
//!
//! A condition is an ephemeral (subject, operator, value) triple. Operands
//! are re-resolved on every evaluation: a subject captured by value goes
//! stale across repeated evaluations, so loops should address state by path
//! or supply a computed getter.
//!
//! Operator identifiers accept both symbolic (`===`) and word
//! (`strict_equals`) spellings that resolve identically; unknown spellings
//! fail with `ConditionError::UnknownOperator` rather than defaulting to a
//! falsy result.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use lockstep_types::error::ConditionError;

use crate::state::State;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// The fixed comparator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    StrictEquals,
    StrictNotEquals,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Empty,
    NotEmpty,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    NotMatches,
    IsNull,
    IsNotNull,
    CustomFunction,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::StrictEquals => "strict_equals",
            Operator::StrictNotEquals => "strict_not_equals",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterOrEqual => "greater_or_equal",
            Operator::LessOrEqual => "less_or_equal",
            Operator::Empty => "empty",
            Operator::NotEmpty => "not_empty",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Matches => "matches",
            Operator::NotMatches => "not_matches",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::CustomFunction => "custom_function",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(spelling: &str) -> Result<Self, Self::Err> {
        let op = match spelling {
            "===" | "strict_equals" => Operator::StrictEquals,
            "!==" | "strict_not_equals" => Operator::StrictNotEquals,
            "==" | "equals" | "loose_equals" => Operator::Equals,
            "!=" | "not_equals" => Operator::NotEquals,
            ">" | "greater_than" => Operator::GreaterThan,
            "<" | "less_than" => Operator::LessThan,
            ">=" | "greater_or_equal" => Operator::GreaterOrEqual,
            "<=" | "less_or_equal" => Operator::LessOrEqual,
            "empty" | "is_empty" => Operator::Empty,
            "not_empty" | "is_not_empty" => Operator::NotEmpty,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "starts_with" | "prefix" => Operator::StartsWith,
            "ends_with" | "suffix" => Operator::EndsWith,
            "=~" | "matches" | "regex" => Operator::Matches,
            "!~" | "not_matches" => Operator::NotMatches,
            "null" | "is_null" => Operator::IsNull,
            "not_null" | "is_not_null" => Operator::IsNotNull,
            "custom" | "custom_function" => Operator::CustomFunction,
            other => return Err(ConditionError::UnknownOperator(other.to_string())),
        };
        Ok(op)
    }
}

// ---------------------------------------------------------------------------
// Operand
// ---------------------------------------------------------------------------

/// How a condition side obtains its value at evaluation time.
#[derive(Clone)]
pub enum Operand {
    /// A value captured at construction. Stale by design across repeated
    /// evaluations.
    Value(Value),
    /// A state path, re-read on every evaluation. Absent paths resolve to
    /// null.
    Path(String),
    /// A getter invoked with the state on every evaluation.
    Compute(Arc<dyn Fn(&State) -> Value + Send + Sync>),
    /// A one-argument predicate; only meaningful as the value side of
    /// `custom_function`.
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Operand {
    pub fn value(value: impl Into<Value>) -> Self {
        Operand::Value(value.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Operand::Path(path.into())
    }

    pub fn compute<F>(getter: F) -> Self
    where
        F: Fn(&State) -> Value + Send + Sync + 'static,
    {
        Operand::Compute(Arc::new(getter))
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Operand::Predicate(Arc::new(predicate))
    }

    fn resolve(&self, state: &State) -> Result<Value, ConditionError> {
        match self {
            Operand::Value(value) => Ok(value.clone()),
            Operand::Path(path) => Ok(state.get_or(path, Value::Null)),
            Operand::Compute(getter) => Ok(getter(state)),
            Operand::Predicate(_) => Err(ConditionError::PredicateOperand),
        }
    }

    /// Lossy description for snapshots and logs.
    pub(crate) fn summary(&self) -> String {
        match self {
            Operand::Value(value) => value.to_string(),
            Operand::Path(path) => format!("state:{path}"),
            Operand::Compute(_) => "<computed>".to_string(),
            Operand::Predicate(_) => "<predicate>".to_string(),
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Value(Value::from(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Value(Value::from(value))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Value(Value::from(value))
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Value(Value::from(value))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Value(Value::from(value))
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A (subject, operator, value) triple.
///
/// Well-formed only when all three parts are explicitly assigned;
/// `validate()` exists so composite steps can fail fast on half-configured
/// conditions instead of silently comparing absent values.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    subject: Option<Operand>,
    operator: Option<Operator>,
    value: Option<Operand>,
}

impl Condition {
    /// Build a fully-formed condition, parsing the operator spelling.
    pub fn new(
        subject: impl Into<Operand>,
        operator: &str,
        value: impl Into<Operand>,
    ) -> Result<Self, ConditionError> {
        Ok(Self {
            subject: Some(subject.into()),
            operator: Some(operator.parse()?),
            value: Some(value.into()),
        })
    }

    /// Build a condition for a unary operator (`empty`, `is_null`, ...).
    /// The value side is explicitly assigned null; unary operators ignore it.
    pub fn unary(subject: impl Into<Operand>, operator: &str) -> Result<Self, ConditionError> {
        Self::new(subject, operator, Value::Null)
    }

    /// Build a condition with operator and value but no subject yet -- for
    /// switch cases that inherit the switch's common subject.
    pub fn when(operator: &str, value: impl Into<Operand>) -> Result<Self, ConditionError> {
        Ok(Self {
            subject: None,
            operator: Some(operator.parse()?),
            value: Some(value.into()),
        })
    }

    pub fn set_subject(&mut self, subject: impl Into<Operand>) {
        self.subject = Some(subject.into());
    }

    pub fn set_operator(&mut self, operator: Operator) {
        self.operator = Some(operator);
    }

    pub fn set_value(&mut self, value: impl Into<Operand>) {
        self.value = Some(value.into());
    }

    pub fn has_subject(&self) -> bool {
        self.subject.is_some()
    }

    /// Fail fast unless subject, operator, and value are all assigned.
    pub fn validate(&self) -> Result<(), ConditionError> {
        if self.subject.is_none() {
            return Err(ConditionError::Incomplete("subject"));
        }
        if self.operator.is_none() {
            return Err(ConditionError::Incomplete("operator"));
        }
        if self.value.is_none() {
            return Err(ConditionError::Incomplete("value"));
        }
        Ok(())
    }

    /// Resolve both operands against `state` and apply the operator.
    pub fn evaluate(&self, state: &State) -> Result<bool, ConditionError> {
        self.validate()?;
        let (Some(subject), Some(operator), Some(value)) =
            (&self.subject, self.operator, &self.value)
        else {
            return Err(ConditionError::Incomplete("condition"));
        };

        let lhs = subject.resolve(state)?;

        let verdict = match operator {
            Operator::StrictEquals => strict_eq(&lhs, &value.resolve(state)?),
            Operator::StrictNotEquals => !strict_eq(&lhs, &value.resolve(state)?),
            Operator::Equals => loose_eq(&lhs, &value.resolve(state)?),
            Operator::NotEquals => !loose_eq(&lhs, &value.resolve(state)?),
            Operator::GreaterThan => {
                matches!(compare(&lhs, &value.resolve(state)?), Some(Ordering::Greater))
            }
            Operator::LessThan => {
                matches!(compare(&lhs, &value.resolve(state)?), Some(Ordering::Less))
            }
            Operator::GreaterOrEqual => matches!(
                compare(&lhs, &value.resolve(state)?),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::LessOrEqual => matches!(
                compare(&lhs, &value.resolve(state)?),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Empty => is_empty(&lhs),
            Operator::NotEmpty => !is_empty(&lhs),
            Operator::In => is_member(&lhs, &value.resolve(state)?),
            Operator::NotIn => !is_member(&lhs, &value.resolve(state)?),
            Operator::Contains => contains(&lhs, &value.resolve(state)?),
            Operator::NotContains => !contains(&lhs, &value.resolve(state)?),
            Operator::StartsWith => match (&lhs, &value.resolve(state)?) {
                (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                _ => false,
            },
            Operator::EndsWith => match (&lhs, &value.resolve(state)?) {
                (Value::String(s), Value::String(suffix)) => s.ends_with(suffix.as_str()),
                _ => false,
            },
            Operator::Matches => regex_match(&lhs, &value.resolve(state)?)?,
            Operator::NotMatches => !regex_match(&lhs, &value.resolve(state)?)?,
            Operator::IsNull => lhs.is_null(),
            Operator::IsNotNull => !lhs.is_null(),
            Operator::CustomFunction => match value {
                Operand::Predicate(predicate) => predicate(&lhs),
                _ => return Err(ConditionError::PredicateExpected),
            },
        };
        Ok(verdict)
    }

    /// Lossy one-line description for snapshots and logs.
    pub fn summary(&self) -> String {
        let subject = self
            .subject
            .as_ref()
            .map_or("<unset>".to_string(), Operand::summary);
        let operator = self
            .operator
            .map_or("<unset>", |op| op.as_str());
        let value = self
            .value
            .as_ref()
            .map_or("<unset>".to_string(), Operand::summary);
        format!("{subject} {operator} {value}")
    }
}

// ---------------------------------------------------------------------------
// Comparison helpers
// ---------------------------------------------------------------------------

fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Same type and equal. Numbers compare numerically regardless of their
/// integer/float representation; there is no cross-type coercion.
fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a) == as_f64(b),
        _ => a == b,
    }
}

/// Strict equality plus coercion: numeric strings compare against numbers,
/// booleans compare against numbers as 0/1.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if strict_eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::String(s), Value::Number(_)) => {
            s.trim().parse::<f64>().ok() == as_f64(b)
        }
        (Value::Number(_), Value::String(s)) => {
            s.trim().parse::<f64>().ok() == as_f64(a)
        }
        (Value::Bool(flag), Value::Number(_)) => {
            Some(if *flag { 1.0 } else { 0.0 }) == as_f64(b)
        }
        (Value::Number(_), Value::Bool(flag)) => {
            Some(if *flag { 1.0 } else { 0.0 }) == as_f64(a)
        }
        _ => false,
    }
}

/// Native type ordering: numbers numerically, strings lexicographically,
/// numeric strings coerce against numbers. Anything else has no order.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::Number(_)) => {
            x.trim().parse::<f64>().ok()?.partial_cmp(&as_f64(b)?)
        }
        (Value::Number(_), Value::String(y)) => {
            as_f64(a)?.partial_cmp(&y.trim().parse::<f64>().ok()?)
        }
        _ => None,
    }
}

/// Null, zero-length string, or zero-length collection.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(seq) => seq.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Membership of `subject` in `collection`: array element, substring, or
/// object key.
fn is_member(subject: &Value, collection: &Value) -> bool {
    match collection {
        Value::Array(seq) => seq.iter().any(|element| strict_eq(element, subject)),
        Value::String(haystack) => subject
            .as_str()
            .is_some_and(|needle| haystack.contains(needle)),
        Value::Object(map) => subject.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

/// Containment of `value` inside `subject` -- the mirror of `is_member`.
fn contains(subject: &Value, value: &Value) -> bool {
    is_member(value, subject)
}

fn regex_match(subject: &Value, pattern: &Value) -> Result<bool, ConditionError> {
    let Value::String(pattern) = pattern else {
        return Err(ConditionError::InvalidPattern(
            "pattern must be a string".to_string(),
        ));
    };
    let regex =
        Regex::new(pattern).map_err(|err| ConditionError::InvalidPattern(err.to_string()))?;
    Ok(subject.as_str().is_some_and(|s| regex.is_match(s)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(
        subject: impl Into<Operand>,
        operator: &str,
        value: impl Into<Operand>,
    ) -> Result<bool, ConditionError> {
        Condition::new(subject, operator, value)?.evaluate(&State::new())
    }

    // -----------------------------------------------------------------------
    // Operator parsing
    // -----------------------------------------------------------------------

    #[test]
    fn symbolic_and_word_spellings_resolve_identically() {
        assert_eq!(
            "===".parse::<Operator>().unwrap(),
            "strict_equals".parse::<Operator>().unwrap()
        );
        assert_eq!(
            "!=".parse::<Operator>().unwrap(),
            "not_equals".parse::<Operator>().unwrap()
        );
        assert_eq!(
            ">=".parse::<Operator>().unwrap(),
            "greater_or_equal".parse::<Operator>().unwrap()
        );
        assert_eq!(
            "=~".parse::<Operator>().unwrap(),
            "regex".parse::<Operator>().unwrap()
        );
    }

    #[test]
    fn unknown_operator_fails_instead_of_defaulting() {
        assert!(matches!(
            "~>".parse::<Operator>(),
            Err(ConditionError::UnknownOperator(_))
        ));
        assert!(matches!(
            eval(1, "almost_equals", 1),
            Err(ConditionError::UnknownOperator(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Equality strictness levels
    // -----------------------------------------------------------------------

    #[test]
    fn strict_vs_loose_equality() {
        assert!(eval("5", "==", 5).unwrap());
        assert!(!eval("5", "===", 5).unwrap());
        assert!(eval(5, "===", 5).unwrap());
        assert!(eval(5.0, "===", 5).unwrap());
        assert!(eval("5", "!==", 5).unwrap());
        assert!(!eval("5", "!=", 5).unwrap());
    }

    #[test]
    fn loose_equality_coerces_booleans() {
        assert!(eval(true, "==", 1).unwrap());
        assert!(eval(false, "==", 0).unwrap());
        assert!(!eval(true, "==", 2).unwrap());
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn ordering_operators() {
        assert!(eval(5, ">=", 5).unwrap());
        assert!(eval(2, ">", 1).unwrap());
        assert!(eval(1, "<", 2).unwrap());
        assert!(eval(2, "<=", 2).unwrap());
        assert!(!eval(1, ">", 2).unwrap());
    }

    #[test]
    fn ordering_strings_lexicographic() {
        assert!(eval("banana", ">", "apple").unwrap());
        assert!(eval("apple", "<", "banana").unwrap());
    }

    #[test]
    fn ordering_numeric_string_coerces() {
        assert!(eval("10", ">", 9).unwrap());
        assert!(eval(9, "<", "10").unwrap());
    }

    #[test]
    fn incomparable_operands_evaluate_false() {
        assert!(!eval(json!({"a": 1}), ">", 1).unwrap());
        assert!(!eval(json!([1]), "<", json!([2])).unwrap());
    }

    // -----------------------------------------------------------------------
    // Emptiness and null
    // -----------------------------------------------------------------------

    #[test]
    fn emptiness() {
        assert!(Condition::unary("", "empty").unwrap().evaluate(&State::new()).unwrap());
        assert!(Condition::unary(Value::Null, "empty")
            .unwrap()
            .evaluate(&State::new())
            .unwrap());
        assert!(Condition::unary(json!([]), "is_empty")
            .unwrap()
            .evaluate(&State::new())
            .unwrap());
        assert!(Condition::unary(json!([1]), "not_empty")
            .unwrap()
            .evaluate(&State::new())
            .unwrap());
        // numbers are never empty
        assert!(!Condition::unary(0, "empty").unwrap().evaluate(&State::new()).unwrap());
    }

    #[test]
    fn null_tests() {
        assert!(Condition::unary(Value::Null, "is_null")
            .unwrap()
            .evaluate(&State::new())
            .unwrap());
        assert!(Condition::unary(0, "not_null")
            .unwrap()
            .evaluate(&State::new())
            .unwrap());
    }

    // -----------------------------------------------------------------------
    // Membership / containment / affixes
    // -----------------------------------------------------------------------

    #[test]
    fn membership() {
        assert!(eval("admin", "in", json!(["admin", "user"])).unwrap());
        assert!(eval("root", "not_in", json!(["admin", "user"])).unwrap());
        assert!(eval("ell", "in", "hello").unwrap());
        assert!(eval("key", "in", json!({"key": 1})).unwrap());
    }

    #[test]
    fn containment_mirrors_membership() {
        assert!(eval("hello", "contains", "ell").unwrap());
        assert!(eval(json!([1, 2, 3]), "contains", 2).unwrap());
        assert!(eval(json!([1, 2, 3]), "not_contains", 9).unwrap());
    }

    #[test]
    fn prefix_and_suffix() {
        assert!(eval("/api/v1/users", "starts_with", "/api").unwrap());
        assert!(eval("report.pdf", "ends_with", ".pdf").unwrap());
        assert!(eval("report.pdf", "suffix", ".pdf").unwrap());
        assert!(!eval("report.pdf", "prefix", "summary").unwrap());
    }

    // -----------------------------------------------------------------------
    // Regex
    // -----------------------------------------------------------------------

    #[test]
    fn regex_match_and_non_match() {
        assert!(eval("error: timeout after 30s", "matches", r"timeout after \d+s").unwrap());
        assert!(eval("all good", "not_matches", r"timeout").unwrap());
        assert!(!eval(42, "matches", r"\d+").unwrap()); // non-string subject
    }

    #[test]
    fn invalid_regex_pattern_fails() {
        assert!(matches!(
            eval("x", "matches", "("),
            Err(ConditionError::InvalidPattern(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Custom predicate
    // -----------------------------------------------------------------------

    #[test]
    fn custom_predicate_receives_subject() {
        let condition = Condition::new(
            7,
            "custom_function",
            Operand::predicate(|value| value.as_i64().is_some_and(|n| n % 7 == 0)),
        )
        .unwrap();
        assert!(condition.evaluate(&State::new()).unwrap());
    }

    #[test]
    fn custom_without_predicate_fails() {
        assert!(matches!(
            eval(7, "custom_function", 7),
            Err(ConditionError::PredicateExpected)
        ));
    }

    // -----------------------------------------------------------------------
    // Operand resolution
    // -----------------------------------------------------------------------

    #[test]
    fn path_operand_reads_fresh_state() {
        let mut state = State::new();
        state.set("count", json!(1)).unwrap();
        let condition = Condition::new(Operand::path("count"), "<", 3).unwrap();
        assert!(condition.evaluate(&state).unwrap());
        state.set("count", json!(5)).unwrap();
        assert!(!condition.evaluate(&state).unwrap());
    }

    #[test]
    fn absent_path_resolves_to_null() {
        let condition = Condition::unary(Operand::path("missing"), "is_null").unwrap();
        assert!(condition.evaluate(&State::new()).unwrap());
    }

    #[test]
    fn compute_operand_runs_each_evaluation() {
        let mut state = State::new();
        state.set("xs", json!([1, 2, 3])).unwrap();
        let condition = Condition::new(
            Operand::compute(|state| {
                json!(state.get_or("xs", json!([])).as_array().map_or(0, Vec::len))
            }),
            ">=",
            3,
        )
        .unwrap();
        assert!(condition.evaluate(&state).unwrap());
    }

    #[test]
    fn predicate_as_subject_fails() {
        let condition = Condition::new(
            Operand::predicate(|_| true),
            "==",
            1,
        )
        .unwrap();
        assert!(matches!(
            condition.evaluate(&State::new()),
            Err(ConditionError::PredicateOperand)
        ));
    }

    // -----------------------------------------------------------------------
    // Validity
    // -----------------------------------------------------------------------

    #[test]
    fn half_configured_condition_fails_fast() {
        let mut condition = Condition::default();
        assert!(matches!(
            condition.validate(),
            Err(ConditionError::Incomplete("subject"))
        ));
        condition.set_subject(1);
        assert!(matches!(
            condition.validate(),
            Err(ConditionError::Incomplete("operator"))
        ));
        condition.set_operator(Operator::Equals);
        assert!(matches!(
            condition.validate(),
            Err(ConditionError::Incomplete("value"))
        ));
        condition.set_value(1);
        assert!(condition.validate().is_ok());
        assert!(condition.evaluate(&State::new()).unwrap());
    }

    #[test]
    fn summary_is_lossy_but_named() {
        let condition = Condition::new(Operand::path("user.age"), ">=", 21).unwrap();
        assert_eq!(condition.summary(), "state:user.age greater_or_equal 21");
    }
}
