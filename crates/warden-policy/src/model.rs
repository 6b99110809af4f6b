//! Policy document model (spec.md §3, §4.1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use warden_condition::Condition;
use warden_core::Value;

/// Lifecycle status of a [`Policy`] (spec.md §3: "status ∈ {draft, active,
/// deprecated, archived}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// Authored but not yet eligible for selection.
    Draft,
    /// Eligible for selection during evaluation.
    Active,
    /// Superseded by a newer version; retained for audit history.
    Deprecated,
    /// Soft-deleted.
    Archived,
}

/// Outcome a rule's action (or a synthesized [`crate::engine::Decision`])
/// can produce (spec.md §3 `Action.decision` / `Decision.outcome`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Permit the action.
    Allow,
    /// Block the action.
    Deny,
    /// Permit but surface a warning.
    Warn,
    /// Permit with modifications applied.
    Modify,
}

/// The action fired when a rule's condition matches (spec.md §3 `Action`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// The outcome this action contributes.
    pub decision: DecisionOutcome,
    /// Required when `decision == Deny` (spec.md §3 invariant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Required non-empty when `decision == Modify`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<BTreeMap<String, Value>>,
}

/// A condition/action pair within a [`Policy`] (spec.md §3 `PolicyRule`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Unique within the owning policy.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Disabled rules are inert: never matched, never appear in
    /// `matched_rules` (spec.md §4.3 boundary behaviour).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Condition tree evaluated against the request context.
    pub condition: Condition,
    /// Action fired when `condition` evaluates to `true`.
    pub action: Action,
}

fn default_true() -> bool {
    true
}

/// A named, versioned bundle of rules governing permissible actions in a
/// namespace (spec.md §3 `Policy`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique within the corpus.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Semantic version string (e.g. `"1.2.0"`).
    pub version: String,
    /// Logical grouping used by selection, conflict detection, and the
    /// governance validator's production heuristic.
    pub namespace: String,
    /// Free-form labels, also consulted by the governance validator.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Higher priority wins during cross-policy selection ordering.
    #[serde(default)]
    pub priority: i64,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Must contain at least one rule (spec.md §3 invariant).
    pub rules: Vec<PolicyRule>,
    /// Strictly increases on every accepted mutation (spec.md §3
    /// invariant); not part of the author-facing document, defaulted to
    /// `1` on first parse and bumped by the storage layer thereafter.
    #[serde(default = "default_internal_version")]
    pub internal_version: u64,
    /// ISO-8601 creation timestamp, used as the policy-ordering tiebreak
    /// (spec.md §4.3 step 2: "newer wins on tie").
    #[serde(default)]
    pub created_at: Option<String>,
}

fn default_internal_version() -> u64 {
    1
}

impl Policy {
    /// `true` if this policy is eligible for selection (spec.md §4.3 step 1).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }
}
