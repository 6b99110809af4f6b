//! Pure condition tree evaluator (spec.md §4.2).
//!
//! `evaluate(condition, context)` is a pure, re-entrant function over a
//! [`warden_core::Value`] context: scalar operators, set operators,
//! regex, and composite `all`/`any`/`not` trees, with short-circuit
//! evaluation and dotted field-path resolution through
//! [`warden_core::Value::get_path`]. There is deliberately no shared
//! mutable state anywhere in this crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use regex::Regex;
use serde::{Deserialize, Serialize};
use warden_core::Value;

/// A leaf or composite condition node (spec.md §3 `Condition`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// A single field/operator/literal predicate.
    Leaf {
        /// Dotted field path into the evaluation context.
        field: String,
        /// Comparison operator.
        operator: Operator,
        /// Literal operand compared against the resolved field value.
        /// Absent for unary operators (`exists`, `not_exists`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    /// A boolean combination of child conditions.
    Composite {
        /// `all`, `any`, or `not`.
        combinator: Combinator,
        /// Child conditions. `not` requires exactly one.
        children: Vec<Condition>,
    },
}

/// Boolean combinator for a [`Condition::Composite`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// True iff every child is true; short-circuits on first `false`.
    All,
    /// True iff any child is true; short-circuits on first `true`.
    Any,
    /// Negates its single child.
    Not,
}

/// Leaf comparison operator (spec.md §4.2 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Deep value equality with numeric promotion.
    Equals,
    /// Negation of `equals`.
    NotEquals,
    /// Both sides numeric; else `false`.
    GreaterThan,
    /// Both sides numeric; else `false`.
    LessThan,
    /// Both sides numeric; else `false`.
    GreaterThanOrEqual,
    /// Both sides numeric; else `false`.
    LessThanOrEqual,
    /// Substring (both strings) or element membership (left is a sequence).
    Contains,
    /// Right must be a sequence; membership test.
    In,
    /// Negation of `in`.
    NotIn,
    /// Both sides strings; right compiled as a regex.
    Matches,
    /// Field path resolves to a defined, non-null value.
    Exists,
    /// Negation of `exists`.
    NotExists,
    /// Both sides strings; byte-exact prefix.
    StartsWith,
    /// Both sides strings; byte-exact suffix.
    EndsWith,
}

/// Evaluate a condition tree against `context`. Pure and allocation-minimal
/// for the scalar/leaf path; `O(leaves)` for a tree with no redundant
/// sharing (spec.md §4.2 performance requirement).
#[must_use]
pub fn evaluate(condition: &Condition, context: &Value) -> bool {
    evaluate_traced(condition, context, &mut |_| {})
}

/// Evaluate a condition tree, invoking `on_leaf` with each leaf's field
/// path immediately before it is evaluated. Used by callers that need a
/// trace of which leaves actually ran (spec.md §4.3 step 4 "trace"), and
/// directly by tests asserting short-circuit behaviour (spec.md §8
/// property 3).
pub fn evaluate_traced(
    condition: &Condition,
    context: &Value,
    on_leaf: &mut dyn FnMut(&str),
) -> bool {
    match condition {
        Condition::Leaf { field, operator, value } => {
            on_leaf(field);
            eval_leaf(field, *operator, value.as_ref(), context)
        }
        Condition::Composite { combinator, children } => match combinator {
            Combinator::All => children.iter().all(|c| evaluate_traced(c, context, on_leaf)),
            Combinator::Any => children.iter().any(|c| evaluate_traced(c, context, on_leaf)),
            Combinator::Not => match children.first() {
                Some(child) => !evaluate_traced(child, context, on_leaf),
                None => false,
            },
        },
    }
}

fn eval_leaf(field: &str, op: Operator, literal: Option<&Value>, context: &Value) -> bool {
    let resolved = context.get_path(field);
    match op {
        Operator::Exists => !resolved.is_absent(),
        Operator::NotExists => resolved.is_absent(),
        Operator::Equals => literal.is_some_and(|lit| resolved.deep_eq(lit)),
        Operator::NotEquals => literal.is_some_and(|lit| !resolved.deep_eq(lit)),
        Operator::GreaterThan => numeric_cmp(&resolved, literal, |a, b| a > b),
        Operator::LessThan => numeric_cmp(&resolved, literal, |a, b| a < b),
        Operator::GreaterThanOrEqual => numeric_cmp(&resolved, literal, |a, b| a >= b),
        Operator::LessThanOrEqual => numeric_cmp(&resolved, literal, |a, b| a <= b),
        Operator::Contains => eval_contains(&resolved, literal),
        Operator::In => eval_in(&resolved, literal),
        Operator::NotIn => !eval_in(&resolved, literal),
        Operator::Matches => eval_matches(&resolved, literal),
        Operator::StartsWith => eval_str_pair(&resolved, literal, str::starts_with),
        Operator::EndsWith => eval_str_pair(&resolved, literal, str::ends_with),
    }
}

fn numeric_cmp(left: &Value, right: Option<&Value>, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (left.as_f64(), right.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn eval_contains(left: &Value, right: Option<&Value>) -> bool {
    let Some(right) = right else { return false };
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.contains(b.as_str()),
        (Value::Seq(items), needle) => items.iter().any(|v| v.deep_eq(needle)),
        _ => false,
    }
}

fn eval_in(left: &Value, right: Option<&Value>) -> bool {
    match right.and_then(Value::as_seq) {
        Some(items) => items.iter().any(|v| v.deep_eq(left)),
        None => false,
    }
}

fn eval_matches(left: &Value, right: Option<&Value>) -> bool {
    let (Some(hay), Some(pat)) = (left.as_str(), right.and_then(Value::as_str)) else {
        return false;
    };
    match compile_anchored(pat) {
        Ok(re) => re.is_match(hay),
        Err(_) => false,
    }
}

fn eval_str_pair(left: &Value, right: Option<&Value>, f: impl Fn(&str, &str) -> bool) -> bool {
    match (left.as_str(), right.and_then(Value::as_str)) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

/// Compile `pattern` as a regex, anchoring the left side unless the
/// pattern already contains an explicit `^` or `$` (spec.md §4.2
/// `matches`: "anchored left unless ^/$ present").
fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    if pattern.contains('^') || pattern.contains('$') {
        Regex::new(pattern)
    } else {
        Regex::new(&format!("^(?:{pattern})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(field: &str, op: Operator, value: Option<Value>) -> Condition {
        Condition::Leaf { field: field.into(), operator: op, value }
    }

    fn ctx(v: serde_json::Value) -> Value {
        Value::from(&v)
    }

    #[test]
    fn equals_numeric_promotion() {
        let c = leaf("llm.maxTokens", Operator::Equals, Some(Value::Float(2000.0)));
        let context = ctx(json!({"llm": {"maxTokens": 2000}}));
        assert!(evaluate(&c, &context));
    }

    #[test]
    fn greater_than_requires_numeric() {
        let c = leaf("llm.provider", Operator::GreaterThan, Some(Value::Int(1)));
        let context = ctx(json!({"llm": {"provider": "openai"}}));
        assert!(!evaluate(&c, &context));
    }

    #[test]
    fn contains_substring() {
        let c = leaf("user.email", Operator::Contains, Some(Value::Str("@acme".into())));
        let context = ctx(json!({"user": {"email": "a@acme.com"}}));
        assert!(evaluate(&c, &context));
    }

    #[test]
    fn contains_sequence_membership() {
        let c = leaf("user.roles", Operator::Contains, Some(Value::Str("admin".into())));
        let context = ctx(json!({"user": {"roles": ["admin", "user"]}}));
        assert!(evaluate(&c, &context));
    }

    #[test]
    fn in_requires_sequence_on_right() {
        let c = leaf(
            "llm.provider",
            Operator::In,
            Some(Value::Seq(vec![Value::Str("openai".into()), Value::Str("anthropic".into())])),
        );
        let context = ctx(json!({"llm": {"provider": "anthropic"}}));
        assert!(evaluate(&c, &context));
    }

    #[test]
    fn matches_invalid_regex_is_false() {
        let c = leaf("user.id", Operator::Matches, Some(Value::Str("(".into())));
        let context = ctx(json!({"user": {"id": "abc"}}));
        assert!(!evaluate(&c, &context));
    }

    #[test]
    fn matches_anchors_left_by_default() {
        let c = leaf("user.id", Operator::Matches, Some(Value::Str("abc".into())));
        assert!(evaluate(&c, &ctx(json!({"user": {"id": "abcdef"}}))));
        assert!(!evaluate(&c, &ctx(json!({"user": {"id": "xabc"}}))));
    }

    #[test]
    fn exists_false_for_missing_field() {
        let c = leaf("user.id", Operator::Exists, None);
        assert!(!evaluate(&c, &ctx(json!({}))));
    }

    #[test]
    fn exists_false_for_null() {
        let c = leaf("user.id", Operator::Exists, None);
        assert!(!evaluate(&c, &ctx(json!({"user": {"id": null}}))));
    }

    #[test]
    fn missing_field_equals_is_false() {
        let c = leaf("user.id", Operator::Equals, Some(Value::Str("x".into())));
        assert!(!evaluate(&c, &ctx(json!({}))));
    }

    #[test]
    fn all_short_circuits_on_first_false() {
        let mut visited = Vec::new();
        let c = Condition::Composite {
            combinator: Combinator::All,
            children: vec![
                leaf("a", Operator::Equals, Some(Value::Bool(false))),
                leaf("boom", Operator::Equals, Some(Value::Bool(true))),
            ],
        };
        let context = ctx(json!({"a": false, "boom": true}));
        let result = evaluate_traced(&c, &context, &mut |f| visited.push(f.to_string()));
        assert!(!result);
        assert_eq!(visited, vec!["a"]);
    }

    #[test]
    fn any_short_circuits_on_first_true() {
        let mut visited = Vec::new();
        let c = Condition::Composite {
            combinator: Combinator::Any,
            children: vec![
                leaf("a", Operator::Equals, Some(Value::Bool(true))),
                leaf("boom", Operator::Equals, Some(Value::Bool(true))),
            ],
        };
        let context = ctx(json!({"a": true, "boom": true}));
        let result = evaluate_traced(&c, &context, &mut |f| visited.push(f.to_string()));
        assert!(result);
        assert_eq!(visited, vec!["a"]);
    }

    #[test]
    fn not_negates_single_child() {
        let c = Condition::Composite {
            combinator: Combinator::Not,
            children: vec![leaf("a", Operator::Equals, Some(Value::Bool(true)))],
        };
        assert!(!evaluate(&c, &ctx(json!({"a": true}))));
        assert!(evaluate(&c, &ctx(json!({"a": false}))));
    }

    #[test]
    fn starts_and_ends_with() {
        let sw = leaf("s", Operator::StartsWith, Some(Value::Str("pre".into())));
        let ew = leaf("s", Operator::EndsWith, Some(Value::Str("fix".into())));
        let context = ctx(json!({"s": "prefix"}));
        assert!(evaluate(&sw, &context));
        assert!(evaluate(&ew, &context));
    }
}
