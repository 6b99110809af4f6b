//! Constraint Solver (spec.md §4.5): converts matched policy rules into
//! [`AppliedConstraint`]s, detects pairwise conflicts between them, picks
//! a resolution strategy, and computes the effective constraint set.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use warden_policy::{DecisionOutcome, Policy};

/// Kind of constraint an [`AppliedConstraint`] represents (spec.md §3
/// closed set). Only `PolicyRule` is produced by [`from_policies`]; the
/// remaining variants exist for constraints supplied by external
/// collaborators (rate limiters, budget managers, RBAC) that flow into
/// [`resolve_constraints`] alongside policy-derived ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    /// Derived from a matched policy rule.
    PolicyRule,
    /// Derived from an approval router gate.
    ApprovalGate,
    /// Derived from a rate limiter.
    RateLimit,
    /// Derived from a cost/token budget.
    BudgetLimit,
    /// Derived from a security rule external to the policy corpus.
    SecurityRule,
    /// Derived from a governance validator finding.
    GovernanceRule,
}

/// Severity of a constraint or conflict (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// No action required.
    Info,
    /// Surfaced to the caller; does not block.
    Warning,
    /// Blocks the gated action.
    Error,
    /// Blocks and forces the most restrictive resolution strategy.
    Critical,
}

/// Scope a constraint applies at (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Applies across the whole corpus.
    Global,
    /// Applies within one namespace.
    Namespace(String),
    /// Applies within one project.
    Project(String),
    /// Applies to one user.
    User(String),
}

/// A constraint derived from a matched rule or an external collaborator
/// (spec.md §3 `AppliedConstraint`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedConstraint {
    /// Stable id, unique within the solver invocation.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Kind of constraint.
    pub r#type: ConstraintType,
    /// Severity.
    pub severity: Severity,
    /// Scope the constraint applies at.
    pub scope: Scope,
    /// `false` when the constraint's condition demands blocking the action
    /// (a `deny` rule is unsatisfied; `allow`/`warn`/`modify` are satisfied).
    pub satisfied: bool,
    /// Why the constraint fired.
    pub reason: Option<String>,
}

/// Kind of pairwise conflict between two constraints (spec.md §3 closed
/// set). Only `priority_conflict` and `scope_overlap` are produced by
/// [`resolve_constraints`]'s pairwise pass (spec.md §4.5 step 2); the
/// remaining variants are reserved for richer detection over constraint
/// kinds this solver does not yet compare (temporal windows, resource
/// pools, mutually exclusive actions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Two constraints cannot both hold.
    MutualExclusion,
    /// One constraint is satisfied while its pair is not.
    PriorityConflict,
    /// Same scope, same type, different constraint ids.
    ScopeOverlap,
    /// Conflicting time-bounded applicability.
    TemporalConflict,
    /// Contention over a shared limited resource.
    ResourceContention,
}

/// Strategy chosen to resolve one or more conflicts (spec.md §4.5 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The more restrictive (deny/error/critical) side wins.
    MostRestrictive,
    /// The higher-severity constraint wins.
    PriorityBased,
    /// Conflicting scopes are narrowed to their intersection.
    ScopeNarrowing,
    /// Left unresolved pending a human decision.
    ManualRequired,
}

/// A detected pairwise conflict (spec.md §3 `ConstraintConflict`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintConflict {
    /// Stable id, unique within the solver invocation.
    pub id: String,
    /// Kind of conflict.
    pub r#type: ConflictType,
    /// The two constraints in conflict.
    pub pair: (String, String),
    /// Severity of the conflict, the max of its two endpoints.
    pub severity: Severity,
    /// `true` once a strategy has been applied.
    pub resolved: bool,
    /// Strategy applied, when `resolved`.
    pub strategy: Option<Strategy>,
}

/// Overall outcome of a solver invocation (spec.md §4.5 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverOutcome {
    /// No constraints were supplied.
    NoConstraints,
    /// All constraints satisfied, no conflicts detected.
    ConstraintsSatisfied,
    /// All constraints satisfied; conflicts detected but all resolved.
    ConstraintsResolved,
    /// At least one conflict remains unresolved.
    PartialResolution,
    /// Some constraint unsatisfied and no mitigating resolution applies.
    ConstraintsViolated,
}

/// Result of [`resolve_constraints`] / [`from_policies`] then
/// [`resolve_constraints`] (spec.md §4.5 "`resolve(context) →
/// ConstraintSolverOutput`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSolverOutput {
    /// All input constraints, unmodified.
    pub constraints: Vec<AppliedConstraint>,
    /// All detected conflicts.
    pub conflicts: Vec<ConstraintConflict>,
    /// Input constraints minus both endpoints of every unresolved conflict
    /// (spec.md §4.5 step 5).
    pub effective_constraints: Vec<AppliedConstraint>,
    /// Overall classification.
    pub outcome: SolverOutcome,
}

/// Convert every matched, enabled rule across `policies` into an
/// [`AppliedConstraint`] (spec.md §4.5 step 1). Unlike
/// [`warden_policy::engine::Engine::evaluate`], this walks every rule of
/// every active policy rather than stopping at the first match per
/// policy — the solver needs the full constraint set, not just the
/// policy engine's synthesized winner.
#[must_use]
pub fn from_policies(policies: &[Policy], context: &warden_core::Value) -> Vec<AppliedConstraint> {
    let mut constraints = Vec::new();
    for policy in policies.iter().filter(|p| p.is_active()) {
        for rule in policy.rules.iter().filter(|r| r.enabled) {
            if !warden_condition::evaluate(&rule.condition, context) {
                continue;
            }
            constraints.push(AppliedConstraint {
                id: format!("{}:{}", policy.id, rule.id),
                name: rule.name.clone(),
                r#type: ConstraintType::PolicyRule,
                severity: severity_for(rule.action.decision),
                scope: Scope::Namespace(policy.namespace.clone()),
                satisfied: rule.action.decision != DecisionOutcome::Deny,
                reason: rule.action.reason.clone(),
            });
        }
    }
    constraints
}

fn severity_for(decision: DecisionOutcome) -> Severity {
    match decision {
        DecisionOutcome::Allow => Severity::Info,
        DecisionOutcome::Warn | DecisionOutcome::Modify => Severity::Warning,
        DecisionOutcome::Deny => Severity::Error,
    }
}

/// Run the full solver algorithm over an already-derived constraint set
/// (spec.md §4.5 steps 2–6). Exposed separately from [`from_policies`] so
/// constraints sourced from external collaborators (budget, rate limit,
/// RBAC) can be merged in before resolution.
#[must_use]
pub fn resolve_constraints(constraints: Vec<AppliedConstraint>) -> ConstraintSolverOutput {
    if constraints.is_empty() {
        return ConstraintSolverOutput {
            constraints,
            conflicts: Vec::new(),
            effective_constraints: Vec::new(),
            outcome: SolverOutcome::NoConstraints,
        };
    }

    let conflicts = detect_conflicts(&constraints);
    let strategy = select_strategy(&constraints, &conflicts);
    let conflicts: Vec<ConstraintConflict> = conflicts
        .into_iter()
        .map(|mut c| {
            if strategy != Strategy::ManualRequired {
                c.resolved = true;
                c.strategy = Some(strategy);
            }
            c
        })
        .collect();

    let mut removed = std::collections::HashSet::new();
    for c in &conflicts {
        if !c.resolved {
            removed.insert(c.pair.0.clone());
            removed.insert(c.pair.1.clone());
        }
    }
    let effective_constraints: Vec<AppliedConstraint> =
        constraints.iter().filter(|c| !removed.contains(&c.id)).cloned().collect();

    let all_satisfied = constraints.iter().all(|c| c.satisfied);
    let any_unresolved = conflicts.iter().any(|c| !c.resolved);
    let outcome = if any_unresolved {
        SolverOutcome::PartialResolution
    } else if all_satisfied && conflicts.is_empty() {
        SolverOutcome::ConstraintsSatisfied
    } else if all_satisfied {
        SolverOutcome::ConstraintsResolved
    } else {
        SolverOutcome::ConstraintsViolated
    };

    ConstraintSolverOutput { constraints, conflicts, effective_constraints, outcome }
}

fn detect_conflicts(constraints: &[AppliedConstraint]) -> Vec<ConstraintConflict> {
    let mut conflicts = Vec::new();
    for i in 0..constraints.len() {
        for j in (i + 1)..constraints.len() {
            let a = &constraints[i];
            let b = &constraints[j];
            if a.satisfied != b.satisfied {
                conflicts.push(ConstraintConflict {
                    id: format!("conflict:{}:{}", a.id, b.id),
                    r#type: ConflictType::PriorityConflict,
                    pair: (a.id.clone(), b.id.clone()),
                    severity: a.severity.max(b.severity),
                    resolved: false,
                    strategy: None,
                });
            } else if a.scope == b.scope && a.r#type == b.r#type && a.id != b.id {
                conflicts.push(ConstraintConflict {
                    id: format!("conflict:{}:{}", a.id, b.id),
                    r#type: ConflictType::ScopeOverlap,
                    pair: (a.id.clone(), b.id.clone()),
                    severity: a.severity.max(b.severity),
                    resolved: false,
                    strategy: None,
                });
            }
        }
    }
    conflicts
}

fn select_strategy(constraints: &[AppliedConstraint], conflicts: &[ConstraintConflict]) -> Strategy {
    if constraints.iter().any(|c| c.severity == Severity::Critical) {
        Strategy::MostRestrictive
    } else if conflicts.iter().any(|c| c.r#type == ConflictType::PriorityConflict) {
        Strategy::PriorityBased
    } else if conflicts.iter().any(|c| c.r#type == ConflictType::ScopeOverlap) {
        Strategy::ScopeNarrowing
    } else {
        Strategy::PriorityBased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint(id: &str, severity: Severity, scope: Scope, satisfied: bool) -> AppliedConstraint {
        AppliedConstraint {
            id: id.to_string(),
            name: id.to_string(),
            r#type: ConstraintType::PolicyRule,
            severity,
            scope,
            satisfied,
            reason: None,
        }
    }

    #[test]
    fn empty_input_yields_no_constraints() {
        let out = resolve_constraints(Vec::new());
        assert_eq!(out.outcome, SolverOutcome::NoConstraints);
    }

    #[test]
    fn all_satisfied_no_conflicts_is_constraints_satisfied() {
        let out = resolve_constraints(vec![constraint("a", Severity::Info, Scope::Global, true)]);
        assert_eq!(out.outcome, SolverOutcome::ConstraintsSatisfied);
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn mixed_satisfaction_produces_priority_conflict_and_is_resolved() {
        let out = resolve_constraints(vec![
            constraint("a", Severity::Info, Scope::Global, true),
            constraint("b", Severity::Error, Scope::Global, false),
        ]);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].r#type, ConflictType::PriorityConflict);
        assert!(out.conflicts[0].resolved);
        assert_eq!(out.outcome, SolverOutcome::ConstraintsResolved);
    }

    #[test]
    fn critical_severity_forces_most_restrictive_strategy() {
        let out = resolve_constraints(vec![
            constraint("a", Severity::Critical, Scope::Global, true),
            constraint("b", Severity::Critical, Scope::Global, false),
        ]);
        assert_eq!(out.conflicts[0].strategy, Some(Strategy::MostRestrictive));
    }

    #[test]
    fn same_scope_and_type_different_ids_is_scope_overlap() {
        let out = resolve_constraints(vec![
            constraint("a", Severity::Info, Scope::Namespace("billing".into()), true),
            constraint("b", Severity::Info, Scope::Namespace("billing".into()), true),
        ]);
        assert_eq!(out.conflicts.len(), 1);
        assert_eq!(out.conflicts[0].r#type, ConflictType::ScopeOverlap);
        assert_eq!(out.outcome, SolverOutcome::ConstraintsResolved);
    }

    #[test]
    fn violated_constraint_with_no_conflict_is_constraints_violated() {
        let out = resolve_constraints(vec![constraint("a", Severity::Error, Scope::Global, false)]);
        assert!(out.conflicts.is_empty());
        assert_eq!(out.outcome, SolverOutcome::ConstraintsViolated);
    }

    #[test]
    fn from_policies_only_includes_matched_enabled_rules() {
        use serde_json::json;
        use warden_core::Value;

        let policy: Policy = serde_json::from_value(json!({
            "id": "p1", "name": "p1", "version": "1.0.0", "namespace": "billing", "status": "active",
            "rules": [
                {
                    "id": "r1", "name": "r1",
                    "condition": {"kind": "leaf", "field": "x", "operator": "exists"},
                    "action": {"decision": "deny", "reason": "no"}
                },
                {
                    "id": "r2", "name": "r2", "enabled": false,
                    "condition": {"kind": "leaf", "field": "x", "operator": "exists"},
                    "action": {"decision": "allow"}
                }
            ]
        }))
        .unwrap();
        let constraints = from_policies(&[policy], &Value::from(&json!({"x": 1})));
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].id, "p1:r1");
        assert!(!constraints[0].satisfied);
    }
}
