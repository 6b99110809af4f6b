//! Persistent state layout (spec.md §6 "Persistent state layout").
//!
//! These are plain Rust row types a host's persistence adapter maps to
//! actual tables; no SQL layer is implemented here (persistence is out
//! of scope, spec.md §1).

use serde::{Deserialize, Serialize};
use warden_policy::{Policy, PolicyStatus};

/// One row of the `policies` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesTableRow {
    /// Primary key.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Semantic version string.
    pub version: String,
    /// Logical grouping.
    pub namespace: String,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Selection-ordering priority.
    pub priority: i64,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Opaque JSON blob: the serialized rule set.
    pub rules: serde_json::Value,
    /// Actor that created this policy.
    pub created_by: String,
    /// Strictly-increasing mutation counter.
    pub internal_version: i64,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// ISO-8601 last-update timestamp.
    pub updated_at: String,
}

impl PoliciesTableRow {
    /// Project a [`Policy`] plus the storage-only metadata a write path
    /// supplies into a row.
    #[must_use]
    pub fn from_policy(
        policy: &Policy,
        created_by: impl Into<String>,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        Self {
            id: policy.id.clone(),
            name: policy.name.clone(),
            description: None,
            version: policy.version.clone(),
            namespace: policy.namespace.clone(),
            tags: policy.tags.clone(),
            priority: policy.priority,
            status: policy.status,
            rules: serde_json::to_value(&policy.rules).unwrap_or(serde_json::Value::Null),
            created_by: created_by.into(),
            internal_version: policy.internal_version as i64,
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }
}

/// One row of the `policy_versions` table: a full snapshot per archived
/// version. Unique on `(policy_id, internal_version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVersionsRow {
    /// Policy this snapshot belongs to.
    pub policy_id: String,
    /// Monotonic version number at the time of this snapshot.
    pub internal_version: i64,
    /// The full policy document as of this version.
    pub snapshot: serde_json::Value,
    /// ISO-8601 timestamp this snapshot was archived.
    pub archived_at: String,
}

/// One row of the append-only `policy_audit_trail` table. The database
/// rule blocks `UPDATE`/`DELETE` against this table (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAuditTrailRow {
    /// Entry id.
    pub id: String,
    /// Policy this entry pertains to.
    pub policy_id: String,
    /// Which lifecycle action occurred.
    pub action: warden_audit::AuditAction,
    /// Actor that performed the action.
    pub actor: String,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

/// One row of the `policy_evaluations` table: one row per decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluationsRow {
    /// Caller-supplied request id.
    pub request_id: String,
    /// Policy ids considered for this evaluation.
    pub policy_ids: Vec<String>,
    /// Synthesized outcome.
    pub outcome: warden_policy::DecisionOutcome,
    /// `true` iff `outcome` permits the action.
    pub allowed: bool,
    /// Reason copied from the dominant matched rule.
    pub reason: Option<String>,
    /// Matched policy ids.
    pub matched_policies: Vec<String>,
    /// Matched rule ids.
    pub matched_rules: Vec<String>,
    /// Evaluation context, as submitted.
    pub context: serde_json::Value,
    /// Wall-clock evaluation duration, in milliseconds.
    pub evaluation_time_ms: u64,
    /// `true` iff this result was served from the decision cache.
    pub cached: bool,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}
