//! Policy Enforcement Agent (spec.md §1, §4.3): evaluates rules over a
//! context and produces the primary [`DecisionEvent`].

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::instrument;
use warden_audit::{Artifact, SpanRecorder};
use warden_core::Value;
use warden_decision::{
    build_event, cache_key, confidence, ConfidenceInputs, DecisionEvent, DecisionType, ExecutionRef,
};
use warden_policy::EvaluationRequest;

use crate::context::ExecutionContext;
use crate::environment::AgentEnvironment;
use crate::error::ExecutionError;

/// Wire-level outcome set for the Policy Enforcement Agent (spec.md §6
/// "Decision outcomes").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEnforcementOutcome {
    /// The engine's synthesized outcome was `allow`.
    PolicyAllow,
    /// The engine's synthesized outcome was `deny`.
    PolicyDeny,
    /// Neither allow nor deny; governance inference flagged the matched
    /// policies as requiring human approval before the action proceeds.
    ApprovalRequired,
    /// The engine's outcome was `warn` or `modify` and no approval was
    /// required: permitted, but conditionally.
    ConditionalAllow,
    /// The constraint solver, run over the same matched rules, found an
    /// unsatisfied constraint with no mitigating resolution.
    ConstraintViolation,
}

/// Input to [`evaluate`].
#[derive(Debug, Clone)]
pub struct EnforcementRequest {
    /// Caller-supplied request id.
    pub request_id: String,
    /// Evaluation context.
    pub context: serde_json::Value,
    /// Restrict selection to these policy ids, if supplied.
    pub policy_ids: Option<Vec<String>>,
    /// Populate a full rule trace.
    pub trace: bool,
}

/// Output of [`evaluate`]: the wire-level outcome plus the underlying
/// engine decision and the event built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementResult {
    /// Wire-level outcome.
    pub outcome: PolicyEnforcementOutcome,
    /// `true` iff `outcome` is `policy_allow` or `conditional_allow`.
    pub allowed: bool,
    /// The engine's synthesized decision.
    pub decision: warden_policy::Decision,
    /// The built, fingerprinted event.
    pub event: DecisionEvent,
    /// Repo + agent spans for this invocation (spec.md §6 wire format
    /// `execution.repo_span` / `execution.agent_spans`).
    pub spans: Vec<warden_audit::ExecutionSpan>,
}

/// Evaluate `request` against the active policy snapshot, cache the
/// result by `(context, policy subset)` fingerprint, emit spans and
/// best-effort records, and return the synthesized outcome (spec.md
/// §4.3, §4.7, §4.9).
#[instrument(skip_all, fields(request_id = %request.request_id))]
pub async fn evaluate(
    env: &AgentEnvironment,
    ctx: &ExecutionContext,
    request: EnforcementRequest,
) -> Result<EnforcementResult, ExecutionError> {
    let now_ms = env.clock.now_ms();
    let mut spans = SpanRecorder::new();
    let repo_span =
        spans.start_repo_span(env.ids.new_id(), ctx.parent_span_id.clone(), "policy-enforcement", now_ms);
    let agent_span = spans.start_agent_span(
        env.ids.new_id(),
        &repo_span,
        "policy-enforcement",
        "policy-enforcement-agent",
        now_ms,
    );

    let context_value = Value::from(&request.context);
    let eval_request = {
        let mut r = EvaluationRequest::new(request.request_id.clone(), context_value.clone());
        r.policy_ids = request.policy_ids.clone();
        r.trace = request.trace;
        r
    };

    let context_fp = warden_core::fingerprint::inputs_hash(&request.context);
    let policy_ids_fp = warden_core::fingerprint::inputs_hash(&json!(eval_request
        .policy_ids
        .clone()
        .unwrap_or_default()
        .into_iter()
        .collect::<std::collections::BTreeSet<_>>()));
    let key = cache_key(&context_fp, &policy_ids_fp);

    let env_for_compute = env.clone();
    let ctx_for_compute = ctx.clone();
    let event = env
        .cache
        .get_or_compute(&key, now_ms, move || async move {
            compute_event(&env_for_compute, &ctx_for_compute, &eval_request, now_ms).await
        })
        .await;

    spans.attach_artifact(
        &agent_span,
        Artifact {
            id: env.ids.new_id(),
            r#type: "decision_event".to_string(),
            reference: event.event_id.clone(),
            producer_span_id: agent_span.clone(),
        },
    );
    spans.finish(&agent_span, env.clock.now_ms(), None);
    spans.finish(&repo_span, env.clock.now_ms(), None);
    let execution_spans = spans.finalize_repo(&repo_span)?;

    env.telemetry.emit("policy_enforcement.decision", serde_json::to_value(&event).unwrap_or_default()).await;
    env.record_sink.persist("decision_event", serde_json::to_value(&event).unwrap_or_default()).await;

    let decision: warden_policy::Decision =
        serde_json::from_value(event.outputs.get("decision").cloned().unwrap_or_default())
            .unwrap_or_else(|_| warden_policy::Decision {
                outcome: warden_policy::DecisionOutcome::Allow,
                matched_policies: Vec::new(),
                matched_rules: Vec::new(),
                reason: None,
                modifications: BTreeMap::new(),
                evaluation_time_ms: 0,
                trace: None,
            });
    let outcome: PolicyEnforcementOutcome =
        serde_json::from_value(event.outputs.get("wire_outcome").cloned().unwrap_or_default())
            .unwrap_or(PolicyEnforcementOutcome::PolicyAllow);

    Ok(EnforcementResult {
        allowed: matches!(
            outcome,
            PolicyEnforcementOutcome::PolicyAllow | PolicyEnforcementOutcome::ConditionalAllow
        ),
        outcome,
        decision,
        event,
        spans: execution_spans,
    })
}

async fn compute_event(
    env: &AgentEnvironment,
    ctx: &ExecutionContext,
    eval_request: &EvaluationRequest,
    now_ms: u64,
) -> DecisionEvent {
    let decision = env.engine.evaluate(eval_request);
    warden_policy::observer::record("policy_enforcement", &decision);

    let policies = env.policy_source.list_active().await;
    let matched: Vec<_> =
        policies.iter().filter(|p| decision.matched_policies.contains(&p.id)).cloned().collect();

    let constraints = warden_constraint::from_policies(&matched, &eval_request.context);
    let solver_output = warden_constraint::resolve_constraints(constraints);

    let requires_approval = matched
        .iter()
        .any(|p| warden_governance::validate_for_activation(p).requires_approval);

    let wire_outcome = if decision.outcome == warden_policy::DecisionOutcome::Deny {
        PolicyEnforcementOutcome::PolicyDeny
    } else if matches!(
        solver_output.outcome,
        warden_constraint::SolverOutcome::ConstraintsViolated
            | warden_constraint::SolverOutcome::PartialResolution
    ) {
        PolicyEnforcementOutcome::ConstraintViolation
    } else if requires_approval {
        PolicyEnforcementOutcome::ApprovalRequired
    } else if matches!(
        decision.outcome,
        warden_policy::DecisionOutcome::Warn | warden_policy::DecisionOutcome::Modify
    ) {
        PolicyEnforcementOutcome::ConditionalAllow
    } else {
        PolicyEnforcementOutcome::PolicyAllow
    };

    let inputs = json!({
        "context": eval_request.context,
        "policy_ids": eval_request.policy_ids,
    });
    let outputs = json!({
        "decision": decision,
        "wire_outcome": wire_outcome,
        "constraints": solver_output,
    });

    let conf = confidence(ConfidenceInputs {
        no_policies_matched: decision.matched_policies.is_empty(),
        constraints_mixed_satisfaction: matches!(
            solver_output.outcome,
            warden_constraint::SolverOutcome::PartialResolution
                | warden_constraint::SolverOutcome::ConstraintsResolved
        ),
        outcome: Some(decision.outcome),
        is_error: false,
    });

    build_event(
        env.ids.new_id(),
        "policy-enforcement-agent",
        env!("CARGO_PKG_VERSION"),
        DecisionType::PolicyEnforcementDecision,
        &inputs,
        outputs,
        conf,
        matched.iter().map(|p| p.id.clone()).collect(),
        ExecutionRef {
            request_id: eval_request.request_id.clone(),
            trace_id: ctx.execution_id.clone(),
            span_id: ctx.parent_span_id.clone(),
            environment: env.config.env.as_str().to_string(),
            session_id: None,
        },
        warden_core::ids::iso8601_from_ms(now_ms),
        BTreeMap::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryPolicySource, NullRecordSink};
    use serde_json::json;
    use std::sync::Arc;
    use warden_core::facade::{SystemClock, UuidSource};
    use warden_policy::{Policy, PolicyStatus};

    fn deny_policy() -> Policy {
        serde_json::from_value(json!({
            "id": "p1", "name": "p1", "version": "1.0.0", "namespace": "ns", "status": "active",
            "priority": 100,
            "rules": [{
                "id": "r1", "name": "r1",
                "condition": {"kind": "leaf", "field": "llm.maxTokens", "operator": "greater_than", "value": 1000},
                "action": {"decision": "deny", "reason": "Request exceeds token limit"}
            }]
        }))
        .unwrap()
    }

    async fn env() -> AgentEnvironment {
        AgentEnvironment::new(
            Arc::new(InMemoryPolicySource::new(vec![deny_policy()])),
            Arc::new(NullRecordSink),
            Arc::new(warden_telemetry::TracingTelemetrySink),
            Arc::new(SystemClock),
            Arc::new(UuidSource),
            crate::config::EngineConfig::default(),
        )
        .await
    }

    #[tokio::test]
    async fn scenario_a_token_limit_deny() {
        let env = env().await;
        let ctx = ExecutionContext {
            execution_id: "exec-1".into(),
            parent_span_id: "parent-1".into(),
            correlation_id: "corr-1".into(),
        };
        let req = EnforcementRequest {
            request_id: "req-1".into(),
            context: json!({"llm": {"provider": "openai", "model": "gpt-4", "maxTokens": 2000}}),
            policy_ids: None,
            trace: false,
        };
        let result = evaluate(&env, &ctx, req).await.unwrap();
        assert_eq!(result.outcome, PolicyEnforcementOutcome::PolicyDeny);
        assert!(!result.allowed);
        assert!(result.event.confidence > 0.0);
    }

    #[tokio::test]
    async fn empty_corpus_allows_with_reduced_confidence() {
        let env = AgentEnvironment::new(
            Arc::new(InMemoryPolicySource::new(vec![])),
            Arc::new(NullRecordSink),
            Arc::new(warden_telemetry::TracingTelemetrySink),
            Arc::new(SystemClock),
            Arc::new(UuidSource),
            crate::config::EngineConfig::default(),
        )
        .await;
        let ctx = ExecutionContext {
            execution_id: "exec-2".into(),
            parent_span_id: "parent-2".into(),
            correlation_id: "corr-2".into(),
        };
        let req = EnforcementRequest {
            request_id: "req-2".into(),
            context: json!({}),
            policy_ids: None,
            trace: false,
        };
        let result = evaluate(&env, &ctx, req).await.unwrap();
        assert_eq!(result.outcome, PolicyEnforcementOutcome::PolicyAllow);
        assert!((result.event.confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn repeated_evaluation_is_served_from_cache() {
        let env = env().await;
        let ctx = ExecutionContext {
            execution_id: "exec-3".into(),
            parent_span_id: "parent-3".into(),
            correlation_id: "corr-3".into(),
        };
        let make_req = || EnforcementRequest {
            request_id: "req-3".into(),
            context: json!({"llm": {"provider": "openai", "model": "gpt-4", "maxTokens": 2000}}),
            policy_ids: None,
            trace: false,
        };
        let first = evaluate(&env, &ctx, make_req()).await.unwrap();
        let second = evaluate(&env, &ctx, make_req()).await.unwrap();
        assert_eq!(first.event.event_id, second.event.event_id);
    }
}
