//! Error taxonomy (spec.md §7): every variant maps to exactly one of
//! the six failure classes the propagation policy distinguishes.

use warden_audit::MissingAgentSpanError;
use warden_governance::Violation as GovernanceViolation;
use warden_policy::Violation as StructuralViolation;

/// Required execution headers were missing from the inbound call
/// (spec.md §6 "Headers required", §7 `ExecutionContextError`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionContextError {
    /// `x-execution-id` was missing.
    #[error("missing required header x-execution-id")]
    MissingExecutionId,
    /// `x-parent-span-id` was missing.
    #[error("missing required header x-parent-span-id")]
    MissingParentSpanId,
}

/// A policy document failed structural or parse validation (spec.md §7
/// `StructuralError`). Fail-closed: evaluation never proceeds.
#[derive(Debug, Clone, thiserror::Error)]
#[error("structural validation failed: {} violation(s)", violations.len())]
pub struct StructuralError {
    /// Every violation found.
    pub violations: Vec<StructuralViolation>,
}

/// A policy mutation was rejected by the fail-closed governance
/// validator (spec.md §7 `GovernanceError`).
#[derive(Debug, Clone, thiserror::Error)]
#[error("governance validation rejected activation: {} violation(s), risk={risk_level:?}", violations.len())]
pub struct GovernanceError {
    /// Every violation found.
    pub violations: Vec<GovernanceViolation>,
    /// Escalated risk level at rejection time.
    pub risk_level: warden_governance::RiskLevel,
}

/// Top-level error surfaced by an agent entry point (spec.md §7
/// taxonomy, minus `DecisionError` and `SinkError` — those are absorbed
/// into a well-formed [`warden_decision::DecisionEvent`] rather than
/// propagated, per the propagation policy).
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// spec.md §7 `ExecutionContextError`.
    #[error(transparent)]
    Context(#[from] ExecutionContextError),
    /// spec.md §7 `StructuralError`.
    #[error(transparent)]
    Structural(#[from] StructuralError),
    /// spec.md §7 `GovernanceError`.
    #[error(transparent)]
    Governance(#[from] GovernanceError),
    /// spec.md §7 `ExecutionInvariantError` — a bug in the wrapping
    /// code, not a caller error; always a 500-equivalent.
    #[error(transparent)]
    Invariant(#[from] MissingAgentSpanError),
}
