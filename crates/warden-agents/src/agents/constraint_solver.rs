//! Constraint Solver Agent (spec.md §1, §4.5): detects and resolves
//! conflicts between simultaneously-applied constraints.

use serde_json::json;
use std::collections::BTreeMap;
use tracing::instrument;
use warden_audit::{Artifact, SpanRecorder};
use warden_constraint::{resolve_constraints, AppliedConstraint, ConstraintSolverOutput, SolverOutcome};
use warden_core::Value;
use warden_decision::{build_event, confidence, ConfidenceInputs, DecisionEvent, DecisionType, ExecutionRef};

use crate::context::ExecutionContext;
use crate::environment::AgentEnvironment;
use crate::error::ExecutionError;

/// Input to [`resolve`].
#[derive(Debug, Clone)]
pub struct ConstraintSolverRequest {
    /// Caller-supplied request id.
    pub request_id: String,
    /// Evaluation context used to re-derive policy-sourced constraints.
    pub context: serde_json::Value,
    /// Constraints supplied by external collaborators (rate limiter,
    /// budget manager, RBAC) to merge alongside policy-derived ones
    /// (spec.md §4.5 step 1, "AppliedConstraint ... external
    /// collaborators").
    pub external_constraints: Vec<AppliedConstraint>,
}

/// Output of [`resolve`].
#[derive(Debug, Clone)]
pub struct ConstraintSolverResult {
    /// Solver output (conflicts, effective constraints, outcome).
    pub output: ConstraintSolverOutput,
    /// The built, fingerprinted event.
    pub event: DecisionEvent,
    /// Repo + agent spans for this invocation.
    pub spans: Vec<warden_audit::ExecutionSpan>,
}

/// Derive constraints from the active policy snapshot plus
/// `request.external_constraints`, resolve conflicts, and emit a
/// [`DecisionEvent`] of type [`DecisionType::ConstraintResolution`]
/// (spec.md §4.5 steps 1–6).
#[instrument(skip_all, fields(request_id = %request.request_id))]
pub async fn resolve(
    env: &AgentEnvironment,
    ctx: &ExecutionContext,
    request: ConstraintSolverRequest,
) -> Result<ConstraintSolverResult, ExecutionError> {
    let now_ms = env.clock.now_ms();
    let mut spans = SpanRecorder::new();
    let repo_span =
        spans.start_repo_span(env.ids.new_id(), ctx.parent_span_id.clone(), "constraint-solver", now_ms);
    let agent_span = spans.start_agent_span(
        env.ids.new_id(),
        &repo_span,
        "constraint-solver",
        "constraint-solver-agent",
        now_ms,
    );

    let context_value = Value::from(&request.context);
    let policies = env.policy_source.list_active().await;
    let mut constraints = warden_constraint::from_policies(&policies, &context_value);
    constraints.extend(request.external_constraints.clone());

    let output = resolve_constraints(constraints);

    let inputs = json!({
        "context": request.context,
        "external_constraints": request.external_constraints,
    });
    let outputs = serde_json::to_value(&output).unwrap_or_default();

    let conf = confidence(ConfidenceInputs {
        no_policies_matched: output.constraints.is_empty(),
        constraints_mixed_satisfaction: matches!(
            output.outcome,
            SolverOutcome::PartialResolution | SolverOutcome::ConstraintsResolved
        ),
        outcome: None,
        is_error: false,
    });

    let event = build_event(
        env.ids.new_id(),
        "constraint-solver-agent",
        env!("CARGO_PKG_VERSION"),
        DecisionType::ConstraintResolution,
        &inputs,
        outputs,
        conf,
        output.effective_constraints.iter().map(|c| c.id.clone()).collect(),
        ExecutionRef {
            request_id: request.request_id.clone(),
            trace_id: ctx.execution_id.clone(),
            span_id: ctx.parent_span_id.clone(),
            environment: env.config.env.as_str().to_string(),
            session_id: None,
        },
        warden_core::ids::iso8601_from_ms(now_ms),
        BTreeMap::new(),
    );

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

    env.telemetry.emit("constraint_solver.decision", serde_json::to_value(&event).unwrap_or_default()).await;
    env.record_sink.persist("decision_event", serde_json::to_value(&event).unwrap_or_default()).await;

    Ok(ConstraintSolverResult { output, event, spans: execution_spans })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryPolicySource, NullRecordSink};
    use serde_json::json;
    use std::sync::Arc;
    use warden_core::facade::{SystemClock, UuidSource};
    use warden_policy::Policy;

    fn deny_policy() -> Policy {
        serde_json::from_value(json!({
            "id": "p1", "name": "p1", "version": "1.0.0", "namespace": "ns", "status": "active",
            "rules": [{
                "id": "r1", "name": "r1",
                "condition": {"kind": "leaf", "field": "x", "operator": "exists"},
                "action": {"decision": "deny", "reason": "no"}
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn no_constraints_from_empty_corpus() {
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
            execution_id: "e1".into(),
            parent_span_id: "p1".into(),
            correlation_id: "c1".into(),
        };
        let req = ConstraintSolverRequest {
            request_id: "req-1".into(),
            context: json!({}),
            external_constraints: vec![],
        };
        let result = resolve(&env, &ctx, req).await.unwrap();
        assert_eq!(result.output.outcome, SolverOutcome::NoConstraints);
    }

    #[tokio::test]
    async fn violated_policy_rule_yields_constraints_violated() {
        let env = AgentEnvironment::new(
            Arc::new(InMemoryPolicySource::new(vec![deny_policy()])),
            Arc::new(NullRecordSink),
            Arc::new(warden_telemetry::TracingTelemetrySink),
            Arc::new(SystemClock),
            Arc::new(UuidSource),
            crate::config::EngineConfig::default(),
        )
        .await;
        let ctx = ExecutionContext {
            execution_id: "e2".into(),
            parent_span_id: "p2".into(),
            correlation_id: "c2".into(),
        };
        let req = ConstraintSolverRequest {
            request_id: "req-2".into(),
            context: json!({"x": 1}),
            external_constraints: vec![],
        };
        let result = resolve(&env, &ctx, req).await.unwrap();
        assert_eq!(result.output.outcome, SolverOutcome::ConstraintsViolated);
    }
}
