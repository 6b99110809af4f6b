//! Rule & Policy Engine (spec.md §4.3): selection, ordering, matching,
//! and cross-policy synthesis into a single [`Decision`].

use crate::model::{DecisionOutcome, Policy};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use warden_core::Value;

/// Input to a single evaluation (spec.md §4.3 "Contract").
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// Caller-supplied id, echoed into telemetry/audit by upstream callers.
    pub request_id: String,
    /// Evaluation context (spec.md §3 `EvaluationContext`).
    pub context: Value,
    /// Restrict selection to these policy ids, if supplied.
    pub policy_ids: Option<Vec<String>>,
    /// When `true`, no mutating side effects occur (the engine itself is
    /// always side-effect free; `dry_run` is threaded through by callers
    /// that also decide whether to write audit/decision records).
    pub dry_run: bool,
    /// When `true`, populate [`Decision::trace`] with every rule
    /// considered, not just the first match per policy.
    pub trace: bool,
}

impl EvaluationRequest {
    /// Construct a request with all optional fields at their defaults.
    #[must_use]
    pub fn new(request_id: impl Into<String>, context: Value) -> Self {
        Self { request_id: request_id.into(), context, policy_ids: None, dry_run: false, trace: false }
    }
}

/// One entry in a trace, recorded only when [`EvaluationRequest::trace`]
/// is set (spec.md §4.3 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Policy the rule belongs to.
    pub policy_id: String,
    /// Rule considered.
    pub rule_id: String,
    /// Whether this rule's condition matched.
    pub matched: bool,
}

/// The synthesized outcome of evaluating a context against a policy
/// corpus (spec.md §3 `Decision`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Final outcome after cross-policy synthesis.
    pub outcome: DecisionOutcome,
    /// Matched policy ids, in evaluation order.
    pub matched_policies: Vec<String>,
    /// Matched rule ids, in evaluation order.
    pub matched_rules: Vec<String>,
    /// Reason copied from the dominant matched rule.
    pub reason: Option<String>,
    /// Merged modifications (right-bias: later policies win on key collision).
    pub modifications: BTreeMap<String, Value>,
    /// Wall-clock duration of the evaluation, in milliseconds.
    pub evaluation_time_ms: u64,
    /// Present only when the request set `trace`.
    pub trace: Option<Vec<TraceEntry>>,
}

struct Contribution {
    policy_id: String,
    rule_id: String,
    outcome: DecisionOutcome,
    reason: Option<String>,
    modifications: BTreeMap<String, Value>,
}

/// Deterministic, pure rule & policy engine over a replaceable snapshot
/// of the active policy corpus (spec.md §4.3 "State machine": "Engine
/// holds the active policy set as replaceable state (atomic pointer
/// swap on reload)").
#[derive(Clone)]
pub struct Engine {
    snapshot: Arc<ArcSwap<Vec<Policy>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct an engine with an empty active policy set.
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot: Arc::new(ArcSwap::from_pointee(Vec::new())) }
    }

    /// Publish a new active policy set, atomically replacing the
    /// previous snapshot. Readers mid-evaluation keep their own
    /// reference to the old snapshot until they finish.
    pub fn load(&self, policies: Vec<Policy>) {
        self.snapshot.store(Arc::new(policies));
    }

    /// Number of policies in the current snapshot (active or not).
    #[must_use]
    pub fn snapshot_len(&self) -> usize {
        self.snapshot.load().len()
    }

    /// Evaluate `request` against the current snapshot (spec.md §4.3
    /// steps 1–7). Pure given the snapshot: two concurrent calls against
    /// the same snapshot return identical `outcome`/`matched_*`/
    /// `reason`/`modifications` (spec.md §5 ordering guarantee).
    #[must_use]
    pub fn evaluate(&self, request: &EvaluationRequest) -> Decision {
        let started = Instant::now();
        let snapshot = self.snapshot.load();

        // Step 1: selection.
        let mut selected: Vec<&Policy> = snapshot
            .iter()
            .filter(|p| p.is_active())
            .filter(|p| match &request.policy_ids {
                Some(ids) => ids.iter().any(|id| id == &p.id),
                None => true,
            })
            .collect();

        // Step 2: ordering — priority desc, created_at desc, id asc.
        selected.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| {
                    let ca = a.created_at.as_deref().unwrap_or("");
                    let cb = b.created_at.as_deref().unwrap_or("");
                    cb.cmp(ca)
                })
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut contributions = Vec::new();
        let mut trace = request.trace.then(Vec::new);

        // Steps 3–4: per-policy rule walk and matching.
        for policy in &selected {
            let mut policy_matched = false;
            for rule in &policy.rules {
                if !rule.enabled {
                    continue;
                }
                if policy_matched && !request.trace {
                    break;
                }
                let matched = warden_condition::evaluate(&rule.condition, &request.context);
                if let Some(t) = trace.as_mut() {
                    t.push(TraceEntry {
                        policy_id: policy.id.clone(),
                        rule_id: rule.id.clone(),
                        matched,
                    });
                }
                if matched && !policy_matched {
                    policy_matched = true;
                    contributions.push(Contribution {
                        policy_id: policy.id.clone(),
                        rule_id: rule.id.clone(),
                        outcome: rule.action.decision,
                        reason: rule.action.reason.clone(),
                        modifications: rule.action.modifications.clone().unwrap_or_default(),
                    });
                }
            }
        }

        // Step 5: cross-policy synthesis.
        let (outcome, reason, modifications) = synthesize(&contributions);

        let matched_policies = contributions.iter().map(|c| c.policy_id.clone()).collect();
        let matched_rules = contributions.iter().map(|c| c.rule_id.clone()).collect();

        Decision {
            outcome,
            matched_policies,
            matched_rules,
            reason,
            modifications,
            evaluation_time_ms: started.elapsed().as_millis() as u64,
            trace,
        }
    }
}

fn synthesize(
    contributions: &[Contribution],
) -> (DecisionOutcome, Option<String>, BTreeMap<String, Value>) {
    if let Some(c) = contributions.iter().find(|c| c.outcome == DecisionOutcome::Deny) {
        return (DecisionOutcome::Deny, c.reason.clone(), BTreeMap::new());
    }
    if contributions.iter().any(|c| c.outcome == DecisionOutcome::Modify) {
        let reason = contributions
            .iter()
            .find(|c| c.outcome == DecisionOutcome::Modify)
            .and_then(|c| c.reason.clone());
        let mut merged = BTreeMap::new();
        for c in contributions.iter().filter(|c| c.outcome == DecisionOutcome::Modify) {
            merged.extend(c.modifications.clone());
        }
        return (DecisionOutcome::Modify, reason, merged);
    }
    if let Some(c) = contributions.iter().find(|c| c.outcome == DecisionOutcome::Warn) {
        return (DecisionOutcome::Warn, c.reason.clone(), BTreeMap::new());
    }
    if let Some(c) = contributions.iter().find(|c| c.outcome == DecisionOutcome::Allow) {
        return (DecisionOutcome::Allow, c.reason.clone(), BTreeMap::new());
    }
    (DecisionOutcome::Allow, Some("no matching policy".to_string()), BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, PolicyRule, PolicyStatus};
    use serde_json::json;
    use warden_condition::{Combinator, Condition, Operator};

    fn policy(
        id: &str,
        priority: i64,
        rule_id: &str,
        field: &str,
        op: Operator,
        value: Value,
        decision: DecisionOutcome,
        reason: &str,
    ) -> Policy {
        Policy {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            namespace: "ns".to_string(),
            tags: Vec::new(),
            priority,
            status: PolicyStatus::Active,
            internal_version: 1,
            created_at: None,
            rules: vec![PolicyRule {
                id: rule_id.to_string(),
                name: rule_id.to_string(),
                enabled: true,
                condition: Condition::Leaf {
                    field: field.to_string(),
                    operator: op,
                    value: Some(value),
                },
                action: Action {
                    decision,
                    reason: Some(reason.to_string()),
                    modifications: None,
                },
            }],
        }
    }

    #[test]
    fn scenario_a_token_limit_deny() {
        let engine = Engine::new();
        engine.load(vec![policy(
            "p1",
            100,
            "r1",
            "llm.maxTokens",
            Operator::GreaterThan,
            Value::Int(1000),
            DecisionOutcome::Deny,
            "Request exceeds token limit",
        )]);
        let ctx = Value::from(&json!({"llm": {"provider": "openai", "model": "gpt-4", "maxTokens": 2000}}));
        let req = EvaluationRequest::new("req-1", ctx);
        let d = engine.evaluate(&req);
        assert_eq!(d.outcome, DecisionOutcome::Deny);
        assert_eq!(d.matched_policies, vec!["p1"]);
        assert_eq!(d.matched_rules, vec!["r1"]);
        assert!(d.reason.unwrap().contains("token limit"));
    }

    #[test]
    fn scenario_b_allow_default_path() {
        let engine = Engine::new();
        let p1 = policy(
            "p1",
            100,
            "r1",
            "llm.maxTokens",
            Operator::GreaterThan,
            Value::Int(1000),
            DecisionOutcome::Deny,
            "Request exceeds token limit",
        );
        let p2 = policy(
            "p2",
            50,
            "r2",
            "llm.provider",
            Operator::Equals,
            Value::Str("openai".into()),
            DecisionOutcome::Allow,
            "openai allowed",
        );
        engine.load(vec![p1, p2]);
        let ctx = Value::from(&json!({"llm": {"provider": "openai", "model": "gpt-4", "maxTokens": 500}}));
        let req = EvaluationRequest::new("req-2", ctx);
        let d = engine.evaluate(&req);
        assert_eq!(d.outcome, DecisionOutcome::Allow);
        assert!(d.matched_rules.contains(&"r2".to_string()));
        assert!(!d.matched_rules.contains(&"r1".to_string()));
    }

    #[test]
    fn scenario_c_no_matching_policy() {
        let engine = Engine::new();
        let req = EvaluationRequest::new("req-3", Value::from(&json!({})));
        let d = engine.evaluate(&req);
        assert_eq!(d.outcome, DecisionOutcome::Allow);
        assert!(d.matched_policies.is_empty());
        assert_eq!(d.reason.as_deref(), Some("no matching policy"));
    }

    #[test]
    fn scenario_d_priority_respected_deny_wins_regardless_of_order() {
        let engine = Engine::new();
        let allow = policy(
            "p_allow",
            10,
            "ra",
            "x",
            Operator::Exists,
            Value::Bool(true),
            DecisionOutcome::Allow,
            "allowed",
        );
        let deny = policy(
            "p_deny",
            10,
            "rd",
            "x",
            Operator::Exists,
            Value::Bool(true),
            DecisionOutcome::Deny,
            "denied",
        );
        engine.load(vec![allow, deny]);
        let req = EvaluationRequest::new("req-4", Value::from(&json!({"x": 1})));
        let d = engine.evaluate(&req);
        assert_eq!(d.outcome, DecisionOutcome::Deny);
    }

    #[test]
    fn disabled_rule_never_matches() {
        let engine = Engine::new();
        let mut p = policy(
            "p1",
            10,
            "r1",
            "x",
            Operator::Exists,
            Value::Bool(true),
            DecisionOutcome::Deny,
            "denied",
        );
        p.rules[0].enabled = false;
        engine.load(vec![p]);
        let req = EvaluationRequest::new("req-5", Value::from(&json!({"x": 1})));
        let d = engine.evaluate(&req);
        assert_eq!(d.outcome, DecisionOutcome::Allow);
        assert!(d.matched_rules.is_empty());
    }

    #[test]
    fn restricting_policy_set_excludes_others() {
        let engine = Engine::new();
        let p1 = policy(
            "p1", 10, "r1", "x", Operator::Exists, Value::Bool(true), DecisionOutcome::Deny, "denied",
        );
        let p2 = policy(
            "p2", 10, "r2", "x", Operator::Exists, Value::Bool(true), DecisionOutcome::Allow, "ok",
        );
        engine.load(vec![p1, p2]);
        let mut req = EvaluationRequest::new("req-6", Value::from(&json!({"x": 1})));
        req.policy_ids = Some(vec!["p2".to_string()]);
        let d = engine.evaluate(&req);
        assert_eq!(d.outcome, DecisionOutcome::Allow);
        assert_eq!(d.matched_policies, vec!["p2"]);
    }

    #[test]
    fn trace_populates_all_considered_rules() {
        let engine = Engine::new();
        let mut p = policy(
            "p1", 10, "r1", "x", Operator::Exists, Value::Bool(true), DecisionOutcome::Allow, "ok",
        );
        p.rules.push(PolicyRule {
            id: "r2".into(),
            name: "r2".into(),
            enabled: true,
            condition: Condition::Composite { combinator: Combinator::All, children: vec![] },
            action: Action { decision: DecisionOutcome::Allow, reason: None, modifications: None },
        });
        engine.load(vec![p]);
        let mut req = EvaluationRequest::new("req-7", Value::from(&json!({"x": 1})));
        req.trace = true;
        let d = engine.evaluate(&req);
        let trace = d.trace.unwrap();
        assert_eq!(trace.len(), 2);
    }
}
