//! Approval Routing Agent (spec.md §1, §4.6): builds an approval chain
//! for an action and classifies the routing outcome.

use serde_json::json;
use std::collections::BTreeMap;
use tracing::instrument;
use warden_approval::{route, ApprovalRoutingOutput, ApprovalRule, Requester, RequestPriority, RoutingOutcome};
use warden_audit::{Artifact, SpanRecorder};
use warden_core::Value;
use warden_decision::{build_event, confidence, ConfidenceInputs, DecisionEvent, DecisionType, ExecutionRef};

use crate::context::ExecutionContext;
use crate::environment::AgentEnvironment;
use crate::error::ExecutionError;

/// Input to [`route_request`].
#[derive(Debug, Clone)]
pub struct ApprovalRoutingRequest {
    /// Caller-supplied request id.
    pub request_id: String,
    /// Rules to match against.
    pub rules: Vec<ApprovalRule>,
    /// Action context consulted by rule matching and auto-approval.
    pub action_context: serde_json::Value,
    /// Requester identity.
    pub requester: Requester,
    /// Action priority; defaults to `Medium` when absent.
    pub priority: Option<RequestPriority>,
    /// Restrict matching to these rule ids.
    pub rule_filter: Option<Vec<String>>,
    /// Approvers currently available to act.
    pub available_approvers: Option<Vec<String>>,
}

/// Output of [`route_request`].
#[derive(Debug, Clone)]
pub struct ApprovalRoutingResult {
    /// Wire-level outcome; identical in shape to [`RoutingOutcome`]
    /// (spec.md §6 "Decision outcomes"), `pending_approval` excluded
    /// since [`route`] never returns it.
    pub outcome: RoutingOutcome,
    /// The full routing output (chain, escalation ladder, risk score).
    pub output: ApprovalRoutingOutput,
    /// The built, fingerprinted event.
    pub event: DecisionEvent,
    /// Repo + agent spans for this invocation.
    pub spans: Vec<warden_audit::ExecutionSpan>,
}

/// Route `request.action_context` through `request.rules`, emit a
/// [`DecisionEvent`] of type [`DecisionType::ApprovalRoutingDecision`],
/// and return the classification (spec.md §4.6 steps 1-7).
#[instrument(skip_all, fields(request_id = %request.request_id))]
pub async fn route_request(
    env: &AgentEnvironment,
    ctx: &ExecutionContext,
    request: ApprovalRoutingRequest,
) -> Result<ApprovalRoutingResult, ExecutionError> {
    let now_ms = env.clock.now_ms();
    let mut spans = SpanRecorder::new();
    let repo_span =
        spans.start_repo_span(env.ids.new_id(), ctx.parent_span_id.clone(), "approval-router", now_ms);
    let agent_span = spans.start_agent_span(
        env.ids.new_id(),
        &repo_span,
        "approval-router",
        "approval-routing-agent",
        now_ms,
    );

    let action_context = Value::from(&request.action_context);
    let rule_filter = request.rule_filter.clone();
    let available_approvers = request.available_approvers.clone();
    let output = route(
        &request.rules,
        &action_context,
        &request.requester,
        request.priority,
        rule_filter.as_deref(),
        available_approvers.as_deref(),
        now_ms,
    );

    let inputs = json!({
        "action_context": request.action_context,
        "requester_id": request.requester.id,
        "requester_roles": request.requester.roles,
        "priority": request.priority,
        "rule_filter": request.rule_filter,
        "available_approvers": request.available_approvers,
    });
    let outputs = serde_json::to_value(&output).unwrap_or_default();

    let conf = confidence(ConfidenceInputs {
        no_policies_matched: output.matched_rule_ids.is_empty(),
        constraints_mixed_satisfaction: false,
        outcome: None,
        is_error: false,
    });

    let event = build_event(
        env.ids.new_id(),
        "approval-routing-agent",
        env!("CARGO_PKG_VERSION"),
        DecisionType::ApprovalRoutingDecision,
        &inputs,
        outputs,
        conf,
        output.matched_rule_ids.clone(),
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

    env.telemetry.emit("approval_routing.decision", serde_json::to_value(&event).unwrap_or_default()).await;
    env.record_sink.persist("decision_event", serde_json::to_value(&event).unwrap_or_default()).await;

    Ok(ApprovalRoutingResult { outcome: output.outcome, output, event, spans: execution_spans })
}
