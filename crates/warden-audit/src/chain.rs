//! Append-only, hash-chained policy audit log, backed by a JSONL-append
//! write-ahead pattern: one record per line, opened once, appended
//! under an exclusive open-for-append handle.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;
use warden_core::fingerprint::{canonical_json, sha256_hex};
use warden_policy::Policy;

/// Errors raised by [`AuditLog`].
#[derive(Debug, Error)]
pub enum AuditLogError {
    /// Underlying file I/O failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// A record failed to serialize or an existing line failed to parse.
    #[error("serialize: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Kind of policy mutation an [`AuditEntry`] records (spec.md §3
/// `AuditEntry.action`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// First version of a policy.
    Create,
    /// Content change to an existing policy.
    Edit,
    /// `status` transitioned to `active`.
    Enable,
    /// `status` transitioned away from `active`.
    Disable,
    /// `status` transitioned to `archived`.
    Delete,
    /// `internal_version` bumped without a status change.
    VersionUpdate,
}

/// One entry in the append-only audit log (spec.md §3 `AuditEntry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique id, assigned by the caller or an [`warden_core::IdSource`].
    pub id: String,
    /// Policy this mutation applies to.
    pub policy_id: String,
    /// Policy version string after the mutation.
    pub policy_version: String,
    /// Kind of mutation.
    pub action: AuditAction,
    /// Actor identity (user id, service account, etc.).
    pub actor: String,
    /// ISO-8601 timestamp.
    pub timestamp: String,
    /// `hash(prior_state)`; `"null"` for a `create`.
    pub before_hash: String,
    /// `hash(new_state)`.
    pub after_hash: String,
    /// Correlation id linking this entry to the triggering request.
    pub correlation_id: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Json>,
}

/// `hash(null)` per spec.md §4.8.
#[must_use]
pub fn hash_null() -> String {
    "null".to_string()
}

/// `hash(policy) = sha256(canonical_json(id, name, version, namespace,
/// status, rules))` (spec.md §4.8). Deliberately excludes `priority`,
/// `tags`, `created_at`, and `internal_version` — fields the hash is not
/// specified to cover.
#[must_use]
pub fn hash_policy(policy: &Policy) -> String {
    let projection = serde_json::json!({
        "id": policy.id,
        "name": policy.name,
        "version": policy.version,
        "namespace": policy.namespace,
        "status": policy.status,
        "rules": policy.rules,
    });
    sha256_hex(canonical_json(&projection).as_bytes())
}

/// One gap found by [`AuditLog::verify`]: two consecutive entries for a
/// policy whose hashes don't chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainGap {
    /// Entry id immediately preceding the gap.
    pub before_entry_id: String,
    /// Entry id immediately after the gap.
    pub after_entry_id: String,
}

/// An append-only, JSONL-backed audit log (spec.md §6 "audit table").
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: String,
}

impl AuditLog {
    /// Open or create the log at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuditLogError> {
        let p = path.as_ref();
        if !p.exists() {
            OpenOptions::new().create(true).write(true).truncate(true).open(p)?;
        }
        Ok(Self { path: p.to_string_lossy().into_owned() })
    }

    /// Append `entry`. The log never rewrites or deletes existing lines.
    pub fn append(&self, entry: &AuditEntry) -> Result<(), AuditLogError> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    /// Read every entry in append order.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>, AuditLogError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }

    /// Verify the hash chain for `policy_id`: entries ordered by
    /// timestamp must have `after_hash(n) == before_hash(n+1)` except
    /// where a `create` begins a new chain. Gaps are reported, not
    /// rejected (spec.md §4.8 "the chain is verifiable").
    pub fn verify(&self, policy_id: &str) -> Result<Vec<ChainGap>, AuditLogError> {
        let mut entries: Vec<AuditEntry> =
            self.read_all()?.into_iter().filter(|e| e.policy_id == policy_id).collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let mut gaps = Vec::new();
        for pair in entries.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.action == AuditAction::Create {
                continue;
            }
            if prev.after_hash != next.before_hash {
                gaps.push(ChainGap {
                    before_entry_id: prev.id.clone(),
                    after_entry_id: next.id.clone(),
                });
            }
        }
        Ok(gaps)
    }
}
