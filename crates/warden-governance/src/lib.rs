//! Fail-closed governance validator run over a [`Policy`] before it is
//! allowed to transition into `active` (spec.md §4.4).
//!
//! This is a gate, not an evaluator: it never consults request context,
//! only the policy document's own shape. A policy that fails validation
//! here must not reach [`warden_policy::engine::Engine::load`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use warden_condition::{Combinator, Condition, Operator};
use warden_core::Value;
use warden_policy::{DecisionOutcome, Policy, PolicyRule};

/// Resource-name tokens whose presence in a rule's condition field paths
/// marks the rule as touching a critical resource (spec.md §4.4
/// "deny-without-scope" check). Matched case-insensitively as a substring
/// of the dotted field path.
const CRITICAL_RESOURCE_TOKENS: &[&str] = &[
    "admin",
    "root",
    "system",
    "database",
    "credentials",
    "secret",
    "key",
    "token",
    "password",
    "auth",
    "pii",
    "financial",
    "payment",
    "ssn",
    "health",
    "hipaa",
];

/// Tags that identify a non-production environment. Any tag matching one
/// of these (case-insensitive) counts as an explicit scope, satisfying
/// the deny-without-scope check without needing a condition-level scope.
const ENVIRONMENT_TAGS: &[&str] = &["dev", "development", "staging", "test", "qa"];

/// Classification of a policy's governance domain (spec.md §4.4 "type
/// classification").
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    /// Namespace, tags, or rule field paths reference auth/credentials/PII.
    Security,
    /// Namespace or tags reference regulatory/compliance concerns.
    Compliance,
    /// Namespace, tags, or rule field paths reference spend/budget/tokens.
    Cost,
    /// Namespace or tags reference deployment/operational concerns.
    Operational,
    /// None of the above matched.
    General,
}

/// Escalation level assigned to a [`GovernanceReport`] (spec.md §4.4
/// "risk_level").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    /// No violations of note.
    Low,
    /// Production or compliance context, no hard violations.
    Medium,
    /// Security-typed policy, or any error-severity violation.
    High,
    /// Any critical-severity violation.
    Critical,
}

/// Severity of an individual [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational; does not block activation or raise risk.
    Info,
    /// Blocks activation.
    Error,
    /// Blocks activation and forces `risk_level = critical`.
    Critical,
}

/// A single governance finding against a policy document.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Stable machine-readable code (e.g. `"DENY_WITHOUT_SCOPE"`).
    pub code: &'static str,
    /// Severity, driving both `valid` and `risk_level`.
    pub severity: Severity,
    /// Rule id the violation pertains to, if rule-scoped.
    pub rule_id: Option<String>,
    /// Human-readable explanation.
    pub message: String,
}

/// Result of running [`validate_for_activation`] over a policy.
#[derive(Debug, Clone)]
pub struct GovernanceReport {
    /// `false` iff any violation has [`Severity::Error`] or
    /// [`Severity::Critical`].
    pub valid: bool,
    /// All findings, in check order.
    pub violations: Vec<Violation>,
    /// `true` if a human approval step must precede activation, even when
    /// `valid` is `true`.
    pub requires_approval: bool,
    /// Why approval is required, when `requires_approval` is `true`.
    pub approval_reason: Option<String>,
    /// Overall escalation level.
    pub risk_level: RiskLevel,
    /// Best-effort classification of the policy's domain.
    pub policy_type: PolicyType,
}

/// Run every fail-closed structural and semantic check against `policy`
/// and synthesize a [`GovernanceReport`] (spec.md §4.4).
#[must_use]
pub fn validate_for_activation(policy: &Policy) -> GovernanceReport {
    let mut violations = Vec::new();

    for rule in &policy.rules {
        check_condition_integrity(rule, &rule.condition, &mut violations);
        check_deny_without_scope(policy, rule, &mut violations);
    }
    check_conflicting_rules(policy, &mut violations);

    let policy_type = classify_type(policy);
    let production = is_production(policy);

    let (requires_approval, approval_reason) =
        infer_approval_requirement(policy, policy_type, production);

    let risk_level = escalate_risk(&violations, policy_type, production);
    let valid = violations.iter().all(|v| v.severity == Severity::Info);

    GovernanceReport { valid, violations, requires_approval, approval_reason, risk_level, policy_type }
}

fn check_condition_integrity(rule: &PolicyRule, condition: &Condition, out: &mut Vec<Violation>) {
    match condition {
        Condition::Leaf { field, .. } if field.trim().is_empty() => out.push(Violation {
            code: "MISSING_CONDITION",
            severity: Severity::Error,
            rule_id: Some(rule.id.clone()),
            message: format!("rule {} has a leaf condition with an empty field path", rule.id),
        }),
        Condition::Leaf { .. } => {}
        Condition::Composite { children, .. } if children.is_empty() => out.push(Violation {
            code: "EMPTY_COMPOSITE",
            severity: Severity::Error,
            rule_id: Some(rule.id.clone()),
            message: format!("rule {} has a composite condition with no children", rule.id),
        }),
        Condition::Composite { children, .. } => {
            for child in children {
                check_condition_integrity(rule, child, out);
            }
        }
    }
}

/// A deny rule that touches a critical resource token must also carry an
/// explicit scope: either an environment tag on the policy, or a field
/// path elsewhere in the same condition mentioning `namespace`,
/// `environment`, or `scope` (spec.md §4.4 "deny-without-scope").
fn check_deny_without_scope(policy: &Policy, rule: &PolicyRule, out: &mut Vec<Violation>) {
    if !matches!(rule.action.decision, DecisionOutcome::Deny) {
        return;
    }
    let mut fields = Vec::new();
    collect_fields(&rule.condition, &mut fields);

    let touches_critical = fields.iter().any(|f| is_critical_resource_field(f));
    if !touches_critical {
        return;
    }

    let has_environment_tag =
        policy.tags.iter().any(|t| ENVIRONMENT_TAGS.iter().any(|e| t.eq_ignore_ascii_case(e)));
    let has_scope_field = fields
        .iter()
        .any(|f| ["namespace", "environment", "scope"].iter().any(|s| f.to_ascii_lowercase().contains(s)));

    if !has_environment_tag && !has_scope_field {
        out.push(Violation {
            code: "DENY_WITHOUT_SCOPE",
            severity: Severity::Critical,
            rule_id: Some(rule.id.clone()),
            message: format!(
                "rule {} denies on a critical resource field without an environment tag or scope condition",
                rule.id
            ),
        });
        out.push(Violation {
            code: "CRITICAL_RESOURCE_DENY",
            severity: Severity::Critical,
            rule_id: Some(rule.id.clone()),
            message: format!("rule {} touches a critical resource token unscoped", rule.id),
        });
    }
}

fn is_critical_resource_field(field: &str) -> bool {
    let lower = field.to_ascii_lowercase();
    CRITICAL_RESOURCE_TOKENS.iter().any(|t| lower.contains(t))
}

fn collect_fields(condition: &Condition, out: &mut Vec<String>) {
    match condition {
        Condition::Leaf { field, .. } => out.push(field.clone()),
        Condition::Composite { children, .. } => {
            for child in children {
                collect_fields(child, out);
            }
        }
    }
}

/// Two enabled rules in the same policy that condition on the same field
/// with the same literal but fire opposite `allow`/`deny` decisions can
/// never both apply deterministically — flag as a conflict (spec.md §4.4
/// "conflict detection", literal-only per SPEC_FULL.md Open Question
/// decision).
fn check_conflicting_rules(policy: &Policy, out: &mut Vec<Violation>) {
    let mut seen: Vec<(String, Value, DecisionOutcome, String)> = Vec::new();
    for rule in policy.rules.iter().filter(|r| r.enabled) {
        if !matches!(rule.action.decision, DecisionOutcome::Allow | DecisionOutcome::Deny) {
            continue;
        }
        let mut leaves = Vec::new();
        collect_leaves(&rule.condition, &mut leaves);
        for (field, literal) in &leaves {
            let Some(literal) = literal else { continue };
            for (seen_field, seen_literal, seen_decision, seen_rule_id) in &seen {
                if seen_field == field && seen_literal.deep_eq(literal) && *seen_decision != rule.action.decision {
                    out.push(Violation {
                        code: "CONFLICTING_RULES",
                        severity: Severity::Error,
                        rule_id: Some(rule.id.clone()),
                        message: format!(
                            "rule {} and rule {} both condition on `{field}` with the same literal but disagree ({:?} vs {:?})",
                            rule.id, seen_rule_id, rule.action.decision, seen_decision
                        ),
                    });
                }
            }
        }
        for (field, literal) in leaves {
            if let Some(literal) = literal {
                seen.push((field, literal, rule.action.decision, rule.id.clone()));
            }
        }
    }
}

fn collect_leaves(condition: &Condition, out: &mut Vec<(String, Option<Value>)>) {
    match condition {
        Condition::Leaf { field, operator: Operator::Equals, value } => {
            out.push((field.clone(), value.clone()));
        }
        Condition::Leaf { .. } => {}
        Condition::Composite { combinator: Combinator::Not, .. } => {}
        Condition::Composite { children, .. } => {
            for child in children {
                collect_leaves(child, out);
            }
        }
    }
}

/// Best-effort domain classification from namespace, tags, and rule field
/// paths (spec.md §4.4 "type classification"). First matching category
/// wins in the order security, compliance, cost, operational.
#[must_use]
pub fn classify_type(policy: &Policy) -> PolicyType {
    let haystack = policy_haystack(policy);
    if contains_any(&haystack, &["security", "auth", "credential", "password", "pii", "secret"]) {
        PolicyType::Security
    } else if contains_any(&haystack, &["compliance", "regulatory", "gdpr", "hipaa", "sox", "audit"]) {
        PolicyType::Compliance
    } else if contains_any(&haystack, &["cost", "budget", "spend", "tokens", "quota"]) {
        PolicyType::Cost
    } else if contains_any(&haystack, &["deploy", "operational", "infra", "release", "rollout"]) {
        PolicyType::Operational
    } else {
        PolicyType::General
    }
}

fn policy_haystack(policy: &Policy) -> String {
    let mut s = String::new();
    s.push_str(&policy.namespace);
    s.push(' ');
    s.push_str(&policy.name);
    for tag in &policy.tags {
        s.push(' ');
        s.push_str(tag);
    }
    for rule in &policy.rules {
        let mut fields = Vec::new();
        collect_fields(&rule.condition, &mut fields);
        for f in fields {
            s.push(' ');
            s.push_str(&f);
        }
    }
    s.to_ascii_lowercase()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// `true` if the policy's namespace or tags identify it as governing a
/// production environment: an explicit `prod`/`production` tag, or the
/// absence of any non-production environment tag (spec.md §4.4
/// "production heuristic" — fail closed, treat unlabeled as production).
#[must_use]
pub fn is_production(policy: &Policy) -> bool {
    let lower_tags: Vec<String> = policy.tags.iter().map(|t| t.to_ascii_lowercase()).collect();
    if lower_tags.iter().any(|t| t == "prod" || t == "production") {
        return true;
    }
    if lower_tags.iter().any(|t| ENVIRONMENT_TAGS.iter().any(|e| t == e)) {
        return false;
    }
    !policy.namespace.to_ascii_lowercase().contains("dev")
        && !policy.namespace.to_ascii_lowercase().contains("staging")
        && !policy.namespace.to_ascii_lowercase().contains("test")
}

fn infer_approval_requirement(
    policy: &Policy,
    policy_type: PolicyType,
    production: bool,
) -> (bool, Option<String>) {
    if matches!(policy_type, PolicyType::Security | PolicyType::Compliance) {
        return (
            true,
            Some(format!("{policy_type:?} policies require approval authority before activation")),
        );
    }
    if production && policy.rules.iter().any(|r| r.enabled && matches!(r.action.decision, DecisionOutcome::Deny))
    {
        return (true, Some("production policy carries an enabled deny rule".to_string()));
    }
    (false, None)
}

fn escalate_risk(violations: &[Violation], policy_type: PolicyType, production: bool) -> RiskLevel {
    if violations.iter().any(|v| v.severity == Severity::Critical) {
        return RiskLevel::Critical;
    }
    if violations.iter().any(|v| v.severity == Severity::Error) || policy_type == PolicyType::Security {
        return RiskLevel::High;
    }
    if production || policy_type == PolicyType::Compliance {
        return RiskLevel::Medium;
    }
    RiskLevel::Low
}

impl std::fmt::Debug for PolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PolicyType::Security => "Security",
            PolicyType::Compliance => "Compliance",
            PolicyType::Cost => "Cost",
            PolicyType::Operational => "Operational",
            PolicyType::General => "General",
        };
        f.write_str(s)
    }
}
