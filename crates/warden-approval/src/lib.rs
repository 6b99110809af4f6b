//! Approval Router (spec.md §4.6): matches approval rules against an
//! action context, checks auto-approve conditions, and builds a
//! sequential chain of parallel/any-of steps with merged escalation
//! ladders.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warden_condition::{evaluate, Condition};
use warden_core::Value;

/// `all`/`any` combinator over an [`ApprovalRule`]'s match conditions
/// (spec.md §3 "match (condition list + all/any combinator)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCombinator {
    /// Every condition must hold.
    All,
    /// At least one condition must hold.
    Any,
}

/// One rung of an escalation ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Ladder position; levels merge across rules by this number.
    pub level: u32,
    /// Approver ids at this level.
    pub approvers: Vec<String>,
    /// Timeout before escalating past this level.
    pub timeout_seconds: u64,
}

/// Escalation configuration on an [`ApprovalRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// When `false`, this rule never contributes `escalation_on_timeout`
    /// nor ladder levels even if `levels` is non-empty.
    pub enabled: bool,
    /// Ladder levels, ascending.
    pub levels: Vec<EscalationLevel>,
}

/// Time-of-day / weekday gate on auto-approval (spec.md §4.6 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRestrictions {
    /// Allowed UTC hours, 0-23.
    pub hours: Vec<u8>,
    /// Allowed weekdays, 0 (Sunday) - 6 (Saturday).
    pub weekdays: Vec<u8>,
}

impl TimeRestrictions {
    fn admits(&self, hour: u8, weekday: u8) -> bool {
        self.hours.contains(&hour) && self.weekdays.contains(&weekday)
    }
}

/// Conditions under which a rule's match is auto-approved without a
/// human chain (spec.md §4.6 step 4). Every populated (non-empty /
/// `Some`) field must be satisfied; an empty/`None` field imposes no
/// restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoApproveConditions {
    /// Requester must hold at least one of these roles.
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    /// `action_context.resource_type` must be one of these.
    #[serde(default)]
    pub allowed_resource_types: Vec<String>,
    /// `action_context.operation` must be one of these.
    #[serde(default)]
    pub allowed_operations: Vec<String>,
    /// `action_context.details.value` must not exceed this.
    #[serde(default)]
    pub max_value: Option<f64>,
    /// Current wall-clock hour and weekday must fall within this window.
    #[serde(default)]
    pub time_restrictions: Option<TimeRestrictions>,
}

/// A configured approval rule (spec.md §3 `ApprovalRule`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Unique id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Match conditions, combined by `combinator`.
    pub match_conditions: Vec<Condition>,
    /// How `match_conditions` combine.
    pub combinator: MatchCombinator,
    /// Approvers required before the step is satisfied.
    pub required_approvers: u32,
    /// Candidate approver ids.
    #[serde(default)]
    pub approver_pool: Vec<String>,
    /// Seconds before this rule's step escalates or times out.
    pub timeout_seconds: u64,
    /// Optional escalation ladder.
    #[serde(default)]
    pub escalation: Option<EscalationConfig>,
    /// Optional auto-approve shortcut.
    #[serde(default)]
    pub auto_approve_conditions: Option<AutoApproveConditions>,
    /// Higher wins tie-break ordering and feeds `justification_required`
    /// and the risk score.
    pub priority: i64,
    /// Inactive rules are never selected.
    pub active: bool,
}

/// Requester identity consulted by the auto-approval check.
#[derive(Debug, Clone)]
pub struct Requester {
    /// Requester id.
    pub id: String,
    /// Roles held by the requester.
    pub roles: Vec<String>,
}

/// Priority of the action being routed (spec.md §4.6 step 7 "Outcome").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    /// Routine.
    Low,
    /// Default when unspecified.
    Medium,
    /// Escalates.
    High,
    /// Escalates.
    Critical,
    /// Escalates.
    Emergency,
}

impl RequestPriority {
    fn escalates(self) -> bool {
        matches!(self, RequestPriority::Critical | RequestPriority::High | RequestPriority::Emergency)
    }
}

/// Step type within an approval chain (spec.md §4.6 step 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Every approver in the step must approve.
    Parallel,
    /// Any one approver in the step suffices.
    AnyOf,
}

/// One step of an approval chain, derived from a single matched rule.
/// Chain steps execute in sequence; approvers within a step per
/// `step_type` (spec.md GLOSSARY "approval chain": "ordered sequence of
/// approval steps (parallel / any-of / sequential)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// Rule this step was derived from.
    pub rule_id: String,
    /// How approvers within the step combine.
    pub step_type: StepType,
    /// Approvers available to act on this step.
    pub approvers: Vec<String>,
    /// Seconds before this step times out.
    pub timeout_seconds: u64,
    /// Whether a timeout escalates rather than simply failing the step.
    pub escalation_on_timeout: bool,
}

/// Final classification of a routing decision (spec.md §6 closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// Auto-approve check succeeded; no chain required.
    AutoApproved,
    /// No rule matched; action proceeds ungated.
    ApprovalBypassed,
    /// A chain was built; priority does not force escalation.
    ApprovalRequired,
    /// A chain was built; priority forces escalation handling.
    EscalationRequired,
    /// Reserved for the external approval-tracking system once a chain's
    /// execution has begun (spec.md §1: storing approval state is out of
    /// scope for this router); never returned by [`route`] itself.
    PendingApproval,
}

/// Output of [`route`] (spec.md §4.6 "Contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRoutingOutput {
    /// Final classification.
    pub outcome: RoutingOutcome,
    /// Ids of rules whose match succeeded, in priority-descending order.
    pub matched_rule_ids: Vec<String>,
    /// Set when `outcome == AutoApproved`.
    pub approving_rule_id: Option<String>,
    /// Per-rule approval steps, to run in sequence.
    pub chain: Vec<ApprovalStep>,
    /// Escalation levels merged across every matched rule's ladder.
    pub escalation_levels: Vec<EscalationLevel>,
    /// `true` iff any matched rule has `priority >= 80`.
    pub justification_required: bool,
    /// `[0, 100]`.
    pub risk_score: u32,
    /// Sum of every step's timeout plus every merged escalation level's
    /// timeout.
    pub total_timeout_seconds: u64,
}

/// Route `action_context` through `rules` for `requester` (spec.md §4.6
/// "Contract"). `now_ms` is the wall-clock instant used to evaluate
/// `time_restrictions`, threaded in rather than read from the system
/// clock so the router stays pure and testable. `available_approvers`,
/// when supplied, narrows every rule's `approver_pool` to this set
/// before chain construction (spec.md step 7 "only available
/// approvers" — the roster of who is currently available is an
/// external concern this router does not own).
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn route(
    rules: &[ApprovalRule],
    action_context: &Value,
    requester: &Requester,
    priority: Option<RequestPriority>,
    rule_filter: Option<&[String]>,
    available_approvers: Option<&[String]>,
    now_ms: u64,
) -> ApprovalRoutingOutput {
    let priority = priority.unwrap_or(RequestPriority::Medium);

    let mut selected: Vec<&ApprovalRule> = rules
        .iter()
        .filter(|r| r.active)
        .filter(|r| rule_filter.is_none_or_contains(&r.id))
        .collect();

    selected.retain(|r| rule_matches(r, action_context));
    selected.sort_by(|a, b| b.priority.cmp(&a.priority));

    let matched_rule_ids: Vec<String> = selected.iter().map(|r| r.id.clone()).collect();

    if let Some(rule) = selected.iter().find(|r| auto_approves(r, action_context, requester, now_ms)) {
        return ApprovalRoutingOutput {
            outcome: RoutingOutcome::AutoApproved,
            matched_rule_ids,
            approving_rule_id: Some(rule.id.clone()),
            chain: Vec::new(),
            escalation_levels: Vec::new(),
            justification_required: false,
            risk_score: risk_score(action_context, &selected),
            total_timeout_seconds: 0,
        };
    }

    if selected.is_empty() {
        return ApprovalRoutingOutput {
            outcome: RoutingOutcome::ApprovalBypassed,
            matched_rule_ids,
            approving_rule_id: None,
            chain: Vec::new(),
            escalation_levels: Vec::new(),
            justification_required: false,
            risk_score: 0,
            total_timeout_seconds: 0,
        };
    }

    let mut chain = Vec::new();
    for rule in &selected {
        let approvers = match available_approvers {
            Some(available) => {
                rule.approver_pool.iter().filter(|a| available.contains(a)).cloned().collect()
            }
            None => rule.approver_pool.clone(),
        };
        if approvers.is_empty() {
            continue;
        }
        chain.push(ApprovalStep {
            rule_id: rule.id.clone(),
            step_type: if rule.required_approvers > 1 { StepType::Parallel } else { StepType::AnyOf },
            approvers,
            timeout_seconds: rule.timeout_seconds,
            escalation_on_timeout: rule.escalation.as_ref().is_some_and(|e| e.enabled),
        });
    }

    let escalation_levels = merge_escalation_ladders(&selected);

    let total_timeout_seconds = chain.iter().map(|s| s.timeout_seconds).sum::<u64>()
        + escalation_levels.iter().map(|l| l.timeout_seconds).sum::<u64>();

    let outcome =
        if priority.escalates() { RoutingOutcome::EscalationRequired } else { RoutingOutcome::ApprovalRequired };

    let justification_required = selected.iter().any(|r| r.priority >= 80);

    ApprovalRoutingOutput {
        outcome,
        matched_rule_ids,
        approving_rule_id: None,
        chain,
        escalation_levels,
        justification_required,
        risk_score: risk_score(action_context, &selected),
        total_timeout_seconds,
    }
}

trait OptionSliceExt {
    fn is_none_or_contains(&self, id: &str) -> bool;
}

impl OptionSliceExt for Option<&[String]> {
    fn is_none_or_contains(&self, id: &str) -> bool {
        match self {
            Some(ids) => ids.iter().any(|i| i == id),
            None => true,
        }
    }
}

fn rule_matches(rule: &ApprovalRule, context: &Value) -> bool {
    if rule.match_conditions.is_empty() {
        return matches!(rule.combinator, MatchCombinator::All);
    }
    match rule.combinator {
        MatchCombinator::All => rule.match_conditions.iter().all(|c| evaluate(c, context)),
        MatchCombinator::Any => rule.match_conditions.iter().any(|c| evaluate(c, context)),
    }
}

fn auto_approves(rule: &ApprovalRule, context: &Value, requester: &Requester, now_ms: u64) -> bool {
    let Some(cond) = &rule.auto_approve_conditions else { return false };

    if !cond.allowed_roles.is_empty()
        && !requester.roles.iter().any(|r| cond.allowed_roles.contains(r))
    {
        return false;
    }
    if !cond.allowed_resource_types.is_empty() {
        match context.get_path("resource_type").as_str() {
            Some(rt) if cond.allowed_resource_types.iter().any(|t| t == rt) => {}
            _ => return false,
        }
    }
    if !cond.allowed_operations.is_empty() {
        match context.get_path("operation").as_str() {
            Some(op) if cond.allowed_operations.iter().any(|o| o == op) => {}
            _ => return false,
        }
    }
    if let Some(max_value) = cond.max_value {
        match context.get_path("details.value").as_f64() {
            Some(v) if v <= max_value => {}
            _ => return false,
        }
    }
    if let Some(restrictions) = &cond.time_restrictions {
        let (hour, weekday) = warden_core::hour_and_weekday(now_ms);
        if !restrictions.admits(hour, weekday) {
            return false;
        }
    }
    true
}

fn merge_escalation_ladders(rules: &[&ApprovalRule]) -> Vec<EscalationLevel> {
    let mut by_level: BTreeMap<u32, (Vec<String>, u64)> = BTreeMap::new();
    for rule in rules {
        let Some(escalation) = &rule.escalation else { continue };
        if !escalation.enabled {
            continue;
        }
        for level in &escalation.levels {
            let entry = by_level.entry(level.level).or_insert_with(|| (Vec::new(), level.timeout_seconds));
            for approver in &level.approvers {
                if !entry.0.contains(approver) {
                    entry.0.push(approver.clone());
                }
            }
            entry.1 = entry.1.min(level.timeout_seconds);
        }
    }
    by_level
        .into_iter()
        .map(|(level, (approvers, timeout_seconds))| EscalationLevel { level, approvers, timeout_seconds })
        .collect()
}

fn risk_score(context: &Value, matched: &[&ApprovalRule]) -> u32 {
    let operation = context.get_path("operation").as_str().map(str::to_string).unwrap_or_default();
    let mut score = match operation.as_str() {
        "delete" => 30.0,
        "execute" => 25.0,
        "update" => 20.0,
        "create" => 15.0,
        _ => 0.0,
    };
    score += 10.0 * matched.len() as f64;
    score += matched.iter().map(|r| r.priority as f64 / 10.0).sum::<f64>();
    score.min(100.0).max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_condition::Operator;

    fn rule(id: &str, priority: i64, active: bool) -> ApprovalRule {
        ApprovalRule {
            id: id.to_string(),
            name: id.to_string(),
            match_conditions: vec![Condition::Leaf {
                field: "resource_type".to_string(),
                operator: Operator::Equals,
                value: Some(Value::Str("database".into())),
            }],
            combinator: MatchCombinator::All,
            required_approvers: 1,
            approver_pool: vec!["alice".to_string()],
            timeout_seconds: 3600,
            escalation: None,
            auto_approve_conditions: None,
            priority,
            active,
        }
    }

    fn context() -> Value {
        Value::from(&json!({"resource_type": "database", "operation": "update", "details": {"value": 10}}))
    }

    #[test]
    fn no_matching_rule_is_bypassed() {
        let out = route(
            &[],
            &context(),
            &Requester { id: "u1".into(), roles: vec![] },
            None,
            None,
            None,
            0,
        );
        assert_eq!(out.outcome, RoutingOutcome::ApprovalBypassed);
    }

    #[test]
    fn matching_rule_with_approver_pool_builds_chain() {
        let rules = vec![rule("r1", 10, true)];
        let out = route(
            &rules,
            &context(),
            &Requester { id: "u1".into(), roles: vec![] },
            None,
            None,
            None,
            0,
        );
        assert_eq!(out.outcome, RoutingOutcome::ApprovalRequired);
        assert_eq!(out.chain.len(), 1);
        assert_eq!(out.chain[0].step_type, StepType::AnyOf);
    }

    #[test]
    fn auto_approve_roles_intersection_short_circuits_chain() {
        let mut r = rule("r1", 10, true);
        r.auto_approve_conditions =
            Some(AutoApproveConditions { allowed_roles: vec!["platform-admin".into()], ..Default::default() });
        let out = route(
            &[r],
            &context(),
            &Requester { id: "u1".into(), roles: vec!["platform-admin".into()] },
            None,
            None,
            None,
            0,
        );
        assert_eq!(out.outcome, RoutingOutcome::AutoApproved);
        assert_eq!(out.approving_rule_id.as_deref(), Some("r1"));
        assert!(out.chain.is_empty());
    }

    #[test]
    fn high_priority_forces_escalation_required() {
        let rules = vec![rule("r1", 10, true)];
        let out = route(
            &rules,
            &context(),
            &Requester { id: "u1".into(), roles: vec![] },
            Some(RequestPriority::Critical),
            None,
            None,
            0,
        );
        assert_eq!(out.outcome, RoutingOutcome::EscalationRequired);
    }

    #[test]
    fn escalation_ladders_merge_by_level_with_min_timeout() {
        let mut r1 = rule("r1", 10, true);
        r1.escalation = Some(EscalationConfig {
            enabled: true,
            levels: vec![EscalationLevel { level: 1, approvers: vec!["alice".into()], timeout_seconds: 600 }],
        });
        let mut r2 = rule("r2", 5, true);
        r2.match_conditions = r1.match_conditions.clone();
        r2.escalation = Some(EscalationConfig {
            enabled: true,
            levels: vec![EscalationLevel { level: 1, approvers: vec!["bob".into()], timeout_seconds: 300 }],
        });
        let out = route(
            &[r1, r2],
            &context(),
            &Requester { id: "u1".into(), roles: vec![] },
            None,
            None,
            None,
            0,
        );
        assert_eq!(out.escalation_levels.len(), 1);
        assert_eq!(out.escalation_levels[0].timeout_seconds, 300);
        assert_eq!(out.escalation_levels[0].approvers.len(), 2);
    }

    #[test]
    fn justification_required_at_high_priority() {
        let rules = vec![rule("r1", 80, true)];
        let out = route(
            &rules,
            &context(),
            &Requester { id: "u1".into(), roles: vec![] },
            None,
            None,
            None,
            0,
        );
        assert!(out.justification_required);
    }

    #[test]
    fn risk_score_reflects_operation_and_matched_count() {
        let rules = vec![rule("r1", 10, true)];
        let out = route(
            &rules,
            &context(),
            &Requester { id: "u1".into(), roles: vec![] },
            None,
            None,
            None,
            0,
        );
        // update=20 + 10*1 matched + priority/10 = 20 + 10 + 1 = 31
        assert_eq!(out.risk_score, 31);
    }
}
