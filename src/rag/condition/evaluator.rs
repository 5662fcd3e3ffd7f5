// SPDX-License-Identifier: MIT

//! Evaluates parsed edge conditions against a state projection

use super::ast::{CompareOp, Expression, Literal};
use serde_json::Value;
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// Evaluate a condition expression against a JSON projection of the state
pub fn evaluate(expr: &Expression, state: &Value) -> bool {
    expr.holds(state)
}

impl Expression {
    /// Whether the condition holds for `state`.
    ///
    /// A missing field reads as `null`; comparing mismatched types is false.
    pub fn holds(&self, state: &Value) -> bool {
        match self {
            Expression::True => true,
            Expression::False => false,
            Expression::Not(inner) => !inner.holds(state),
            Expression::And(l, r) => l.holds(state) && r.holds(state),
            Expression::Or(l, r) => l.holds(state) || r.holds(state),
            Expression::Compare { left, op, right } => compare(lookup(state, left), *op, right),
        }
    }
}

/// Resolve a dotted path such as `user_profile.name` or `trace.0`
fn lookup<'a>(state: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = state;
    for segment in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(fields) => fields.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

fn compare(value: Option<&Value>, op: CompareOp, literal: &Literal) -> bool {
    match op {
        CompareOp::Eq => matches_literal(value, literal),
        CompareOp::NotEq => !matches_literal(value, literal),
        CompareOp::Contains => contains(value, literal),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            let ordering = match (value.and_then(Value::as_f64), literal) {
                (Some(n), Literal::Number(rhs)) => n.partial_cmp(rhs),
                _ => None,
            };
            match ordering {
                Some(Ordering::Less) => matches!(op, CompareOp::Lt | CompareOp::Lte),
                Some(Ordering::Equal) => matches!(op, CompareOp::Gte | CompareOp::Lte),
                Some(Ordering::Greater) => matches!(op, CompareOp::Gt | CompareOp::Gte),
                None => false,
            }
        }
    }
}

fn matches_literal(value: Option<&Value>, literal: &Literal) -> bool {
    let value = value.unwrap_or(&NULL);
    match literal {
        Literal::Null => value.is_null(),
        Literal::String(s) => value.as_str() == Some(s.as_str()),
        Literal::Boolean(b) => value.as_bool() == Some(*b),
        Literal::Number(n) => value.as_f64().is_some_and(|v| v == *n),
    }
}

fn contains(value: Option<&Value>, literal: &Literal) -> bool {
    match (value, literal) {
        (Some(Value::String(haystack)), Literal::String(needle)) => haystack.contains(needle.as_str()),
        (Some(Value::Array(items)), _) => items.iter().any(|item| matches_literal(Some(item), literal)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::condition::parser::parse;
    use serde_json::json;

    fn holds(condition: &str, state: &Value) -> bool {
        evaluate(&parse(condition).unwrap(), state)
    }

    #[test]
    fn test_route_branching() {
        let state = json!({"route": "conversational", "retry_count": 0});
        assert!(holds("route == 'conversational'", &state));
        assert!(!holds("route == 'research'", &state));
        assert!(holds("route != 'research'", &state));
    }

    #[test]
    fn test_retry_guard() {
        let mut state = json!({"usefulness_verdict": "not_useful", "retry_count": 1});
        let guard = "usefulness_verdict == 'not_useful' and retry_count < 2";
        assert!(holds(guard, &state));

        state["retry_count"] = json!(2);
        assert!(!holds(guard, &state));

        state["usefulness_verdict"] = json!("useful");
        state["retry_count"] = json!(0);
        assert!(!holds(guard, &state));
    }

    #[test]
    fn test_unset_verdict_is_null() {
        let state = json!({"grounding_verdict": null});
        assert!(holds("grounding_verdict == null", &state));
        assert!(holds("usefulness_verdict == null", &state));
        assert!(!holds("grounding_verdict == 'hallucinated'", &state));
    }

    #[test]
    fn test_numeric_comparisons() {
        let state = json!({"regeneration_count": 3});
        assert!(holds("regeneration_count >= 3", &state));
        assert!(holds("regeneration_count <= 3", &state));
        assert!(!holds("regeneration_count > 3", &state));
        assert!(!holds("regeneration_count < 3", &state));
        // type mismatch never matches
        assert!(!holds("regeneration_count < 'x'", &state));
    }

    #[test]
    fn test_nested_and_indexed_paths() {
        let state = json!({
            "user_profile": {"name": "Sam"},
            "trace": ["route", "generate"]
        });
        assert!(holds("user_profile.name == 'Sam'", &state));
        assert!(holds("trace.1 == 'generate'", &state));
        assert!(holds("trace contains 'route'", &state));
        assert!(!holds("trace contains 'retrieve'", &state));
    }

    #[test]
    fn test_boolean_and_literal_expressions() {
        let state = json!({"low_confidence": true});
        assert!(holds("low_confidence == true", &state));
        assert!(holds("true", &state));
        assert!(!holds("false", &state));
        assert!(holds("not low_confidence == false", &state));
    }
}
