//! JSON/YAML ingest and schema validation (spec.md §4.1).
//!
//! Failures are never raised as exceptions-as-control-flow: every entry
//! point returns a structured list of [`Violation`]s instead.

use crate::model::{DecisionOutcome, Policy};
use std::path::Path;
use warden_condition::Condition;

/// A single schema or reference-integrity violation (spec.md §4.1
/// "Failure modes").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Machine-readable code, e.g. `"MISSING_FIELD"`, `"DUPLICATE_RULE_ID"`.
    pub code: String,
    /// Dotted path to the offending field, when known.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Violation {
    fn new(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.to_string(), path: path.into(), message: message.into() }
    }
}

/// Parse a policy document from a JSON string. A malformed document
/// (spec.md §4.1 "Parse error") yields a single `PARSE_ERROR` violation;
/// a structurally valid document is still run through [`validate`].
pub fn parse_json(text: &str) -> Result<Policy, Vec<Violation>> {
    let policy: Policy = serde_json::from_str(text)
        .map_err(|e| vec![Violation::new("PARSE_ERROR", "", e.to_string())])?;
    let violations = validate(&policy);
    if violations.is_empty() {
        Ok(policy)
    } else {
        Err(violations)
    }
}

/// Parse a policy document from a YAML string; same contract as
/// [`parse_json`].
pub fn parse_yaml(text: &str) -> Result<Policy, Vec<Violation>> {
    let policy: Policy = serde_yaml::from_str(text)
        .map_err(|e| vec![Violation::new("PARSE_ERROR", "", e.to_string())])?;
    let violations = validate(&policy);
    if violations.is_empty() {
        Ok(policy)
    } else {
        Err(violations)
    }
}

/// Load and parse a policy document from `path`, dispatching on
/// extension (`.yaml`/`.yml` → YAML, everything else → JSON).
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Policy, Vec<Violation>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        vec![Violation::new("IO_ERROR", "", format!("failed to read {}: {e}", path.display()))]
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => parse_yaml(&text),
        _ => parse_json(&text),
    }
}

/// Structural schema validation (spec.md §4.1 "Schema (minimal required)").
///
/// Checks every invariant in the spec.md §3 data model table for `Policy`,
/// `PolicyRule`, `Condition`, and `Action`: non-empty identifying fields,
/// at least one rule, unique rule ids, composite-node child counts, and
/// action/decision consistency. Does not perform the fail-closed semantic
/// checks that gate *activation* — see `warden-governance` for those.
#[must_use]
pub fn validate(policy: &Policy) -> Vec<Violation> {
    let mut v = Vec::new();

    if policy.id.trim().is_empty() {
        v.push(Violation::new("MISSING_FIELD", "id", "policy id must be non-empty"));
    }
    if policy.name.trim().is_empty() {
        v.push(Violation::new("MISSING_FIELD", "name", "policy name must be non-empty"));
    }
    if policy.version.trim().is_empty() {
        v.push(Violation::new("MISSING_FIELD", "version", "policy version must be non-empty"));
    }
    if policy.namespace.trim().is_empty() {
        v.push(Violation::new("MISSING_FIELD", "namespace", "policy namespace must be non-empty"));
    }
    if policy.rules.is_empty() {
        v.push(Violation::new("EMPTY_RULES", "rules", "policy must declare at least one rule"));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (i, rule) in policy.rules.iter().enumerate() {
        let base = format!("rules[{i}]");
        if rule.id.trim().is_empty() {
            v.push(Violation::new("MISSING_FIELD", format!("{base}.id"), "rule id must be non-empty"));
        } else if !seen_ids.insert(rule.id.clone()) {
            v.push(Violation::new(
                "DUPLICATE_RULE_ID",
                format!("{base}.id"),
                format!("rule id '{}' is duplicated within policy '{}'", rule.id, policy.id),
            ));
        }
        validate_condition(&rule.condition, &format!("{base}.condition"), &mut v);

        match rule.action.decision {
            DecisionOutcome::Deny if rule.action.reason.is_none() => {
                v.push(Violation::new(
                    "MISSING_REASON",
                    format!("{base}.action.reason"),
                    "a deny action requires a reason",
                ));
            }
            DecisionOutcome::Modify
                if rule.action.modifications.as_ref().map_or(true, |m| m.is_empty()) =>
            {
                v.push(Violation::new(
                    "EMPTY_MODIFICATIONS",
                    format!("{base}.action.modifications"),
                    "a modify action requires a non-empty modifications map",
                ));
            }
            _ => {}
        }
    }

    v
}

fn validate_condition(condition: &Condition, path: &str, out: &mut Vec<Violation>) {
    match condition {
        Condition::Leaf { field, .. } => {
            if field.trim().is_empty() {
                out.push(Violation::new(
                    "MISSING_CONDITION",
                    format!("{path}.field"),
                    "a leaf condition requires a non-empty field path",
                ));
            }
        }
        Condition::Composite { children, .. } => {
            if children.is_empty() {
                out.push(Violation::new(
                    "EMPTY_COMPOSITE",
                    path.to_string(),
                    "a composite condition requires at least one child",
                ));
            }
            for (i, child) in children.iter().enumerate() {
                validate_condition(child, &format!("{path}.children[{i}]"), out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> &'static str {
        r#"{
            "id": "p1", "name": "P1", "version": "1.0.0", "namespace": "ns",
            "status": "active",
            "rules": [{
                "id": "r1", "name": "R1",
                "condition": {"kind": "leaf", "field": "llm.maxTokens", "operator": "greater_than", "value": 1000},
                "action": {"decision": "deny", "reason": "too many tokens"}
            }]
        }"#
    }

    #[test]
    fn parses_valid_policy() {
        let p = parse_json(valid_json()).expect("should parse");
        assert_eq!(p.id, "p1");
        assert_eq!(p.rules.len(), 1);
    }

    #[test]
    fn rejects_empty_rules() {
        let json = r#"{"id":"p1","name":"P1","version":"1.0.0","namespace":"ns","status":"active","rules":[]}"#;
        let err = parse_json(json).unwrap_err();
        assert!(err.iter().any(|v| v.code == "EMPTY_RULES"));
    }

    #[test]
    fn rejects_duplicate_rule_ids() {
        let json = r#"{
            "id": "p1", "name": "P1", "version": "1.0.0", "namespace": "ns", "status": "active",
            "rules": [
                {"id": "r1", "name": "A", "condition": {"kind":"leaf","field":"a","operator":"exists"}, "action": {"decision": "allow"}},
                {"id": "r1", "name": "B", "condition": {"kind":"leaf","field":"b","operator":"exists"}, "action": {"decision": "allow"}}
            ]
        }"#;
        let err = parse_json(json).unwrap_err();
        assert!(err.iter().any(|v| v.code == "DUPLICATE_RULE_ID"));
    }

    #[test]
    fn rejects_deny_without_reason() {
        let json = r#"{
            "id": "p1", "name": "P1", "version": "1.0.0", "namespace": "ns", "status": "active",
            "rules": [{"id":"r1","name":"R","condition":{"kind":"leaf","field":"a","operator":"exists"},"action":{"decision":"deny"}}]
        }"#;
        let err = parse_json(json).unwrap_err();
        assert!(err.iter().any(|v| v.code == "MISSING_REASON"));
    }

    #[test]
    fn rejects_unknown_operator_as_parse_error() {
        let json = r#"{
            "id": "p1", "name": "P1", "version": "1.0.0", "namespace": "ns", "status": "active",
            "rules": [{"id":"r1","name":"R","condition":{"kind":"leaf","field":"a","operator":"frobnicate"},"action":{"decision":"allow"}}]
        }"#;
        let err = parse_json(json).unwrap_err();
        assert!(err.iter().any(|v| v.code == "PARSE_ERROR"));
    }

    #[test]
    fn rejects_empty_composite() {
        let json = r#"{
            "id": "p1", "name": "P1", "version": "1.0.0", "namespace": "ns", "status": "active",
            "rules": [{"id":"r1","name":"R","condition":{"kind":"composite","combinator":"all","children":[]},"action":{"decision":"allow"}}]
        }"#;
        let err = parse_json(json).unwrap_err();
        assert!(err.iter().any(|v| v.code == "EMPTY_COMPOSITE"));
    }

    #[test]
    fn yaml_round_trip() {
        let p = parse_json(valid_json()).unwrap();
        let yaml = serde_yaml::to_string(&p).unwrap();
        let back = parse_yaml(&yaml).unwrap();
        assert_eq!(back.id, p.id);
        assert_eq!(back.rules.len(), p.rules.len());
    }
}
