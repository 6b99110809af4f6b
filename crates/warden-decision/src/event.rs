//! Decision event envelope and confidence scoring (spec.md §4.7).

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use warden_core::fingerprint::inputs_hash;
use warden_policy::DecisionOutcome;

/// Which of the three agents produced a [`DecisionEvent`] (spec.md §4.7
/// "Event envelope").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// Policy Enforcement Agent.
    PolicyEnforcementDecision,
    /// Constraint Solver Agent.
    ConstraintResolution,
    /// Approval Routing Agent.
    ApprovalRoutingDecision,
}

/// Where a decision occurred in the caller's tracing topology (spec.md
/// §3 `DecisionEvent.execution_ref`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRef {
    /// Caller-supplied request id.
    pub request_id: String,
    /// Distributed trace id.
    pub trace_id: String,
    /// Span this decision was produced within.
    pub span_id: String,
    /// Deployment environment (`"production"`, `"staging"`, …).
    pub environment: String,
    /// Optional user/session correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// The canonical, hash-fingerprinted, auditable record of one agent
/// decision (spec.md §3 `DecisionEvent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// Unique id for this event.
    pub event_id: String,
    /// Agent instance identifier.
    pub agent_id: String,
    /// Agent build/version string.
    pub agent_version: String,
    /// Which agent kind produced this event.
    pub decision_type: DecisionType,
    /// 16-hex-char fingerprint of the evaluation inputs.
    pub inputs_hash: String,
    /// Agent-specific output payload.
    pub outputs: Json,
    /// `[0, 1]`.
    pub confidence: f64,
    /// Ids of constraints that contributed to this decision.
    #[serde(default)]
    pub constraints_applied: Vec<String>,
    /// Tracing/correlation context.
    pub execution_ref: ExecutionRef,
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Json>,
}

/// Inputs to [`confidence`] (spec.md §4.7 "Confidence").
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceInputs {
    /// No policy matched this evaluation.
    pub no_policies_matched: bool,
    /// The constraint solver saw a mix of satisfied and unsatisfied
    /// constraints.
    pub constraints_mixed_satisfaction: bool,
    /// The decision outcome, when applicable (absent for events that
    /// don't carry one, e.g. a pure constraint-resolution event).
    pub outcome: Option<DecisionOutcome>,
    /// This event represents a failure, not a decision.
    pub is_error: bool,
}

/// Multiplicative confidence score starting from `1.0`, clamped to
/// `[0, 1]` (spec.md §4.7 "Confidence"). `0.0` for an error event,
/// regardless of the other inputs.
#[must_use]
pub fn confidence(inputs: ConfidenceInputs) -> f64 {
    if inputs.is_error {
        return 0.0;
    }
    let mut score = 1.0_f64;
    if inputs.no_policies_matched {
        score *= 0.8;
    }
    if inputs.constraints_mixed_satisfaction {
        score *= 0.9;
    }
    match inputs.outcome {
        Some(DecisionOutcome::Modify) => score *= 0.95,
        Some(DecisionOutcome::Warn) => score *= 0.9,
        _ => {}
    }
    score.clamp(0.0, 1.0)
}

/// Build a [`DecisionEvent`], fingerprinting `inputs` via
/// [`warden_core::fingerprint::inputs_hash`] (spec.md §4.7
/// "Fingerprinting").
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn build_event(
    event_id: impl Into<String>,
    agent_id: impl Into<String>,
    agent_version: impl Into<String>,
    decision_type: DecisionType,
    inputs: &Json,
    outputs: Json,
    confidence: f64,
    constraints_applied: Vec<String>,
    execution_ref: ExecutionRef,
    timestamp: impl Into<String>,
    metadata: BTreeMap<String, Json>,
) -> DecisionEvent {
    DecisionEvent {
        event_id: event_id.into(),
        agent_id: agent_id.into(),
        agent_version: agent_version.into(),
        decision_type,
        inputs_hash: inputs_hash(inputs),
        outputs,
        confidence,
        constraints_applied,
        execution_ref,
        timestamp: timestamp.into(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exec_ref() -> ExecutionRef {
        ExecutionRef {
            request_id: "req-1".into(),
            trace_id: "trace-1".into(),
            span_id: "span-1".into(),
            environment: "production".into(),
            session_id: None,
        }
    }

    #[test]
    fn default_confidence_is_one() {
        assert_eq!(confidence(ConfidenceInputs::default()), 1.0);
    }

    #[test]
    fn error_events_are_zero_confidence_regardless_of_other_inputs() {
        let inputs = ConfidenceInputs { is_error: true, no_policies_matched: false, ..Default::default() };
        assert_eq!(confidence(inputs), 0.0);
    }

    #[test]
    fn no_match_and_warn_compose_multiplicatively() {
        let inputs = ConfidenceInputs {
            no_policies_matched: true,
            outcome: Some(DecisionOutcome::Warn),
            ..Default::default()
        };
        assert!((confidence(inputs) - 0.72).abs() < 1e-9);
    }

    #[test]
    fn identical_inputs_hash_identically() {
        let a = build_event(
            "e1", "agent-1", "1.0.0",
            DecisionType::PolicyEnforcementDecision,
            &json!({"x": 1}),
            json!({}),
            1.0,
            vec![],
            exec_ref(),
            "2024-01-01T00:00:00.000Z",
            BTreeMap::new(),
        );
        let b = build_event(
            "e2", "agent-1", "1.0.0",
            DecisionType::PolicyEnforcementDecision,
            &json!({"x": 1}),
            json!({}),
            1.0,
            vec![],
            exec_ref(),
            "2024-01-01T00:00:01.000Z",
            BTreeMap::new(),
        );
        assert_eq!(a.inputs_hash, b.inputs_hash);
        assert_ne!(a.event_id, b.event_id);
    }
}
