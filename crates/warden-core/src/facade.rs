//! Integration façade: the interfaces the core consumes from its host
//! (spec.md §4.10). These are trait definitions only — concrete adapters
//! (database-backed policy source, HTTP record sink, Prometheus
//! telemetry sink, ...) are out of scope (spec.md §1) and live outside
//! this workspace. `warden-agents::testing` provides in-memory
//! implementations for tests.

use crate::ids::{new_uuid, now_ms};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by a best-effort sink write (spec.md §4.10).
/// A sink failure never aborts a decision; the caller only logs `reason`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the sink accepted the write.
    pub accepted: bool,
    /// Human-readable explanation when `accepted` is `false`.
    pub reason: Option<String>,
}

impl Ack {
    /// Construct an accepted acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self { accepted: true, reason: None }
    }

    /// Construct a rejected acknowledgement with a reason.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { accepted: false, reason: Some(reason.into()) }
    }
}

/// Source of the active policy corpus (spec.md §4.10).
///
/// Implementations are expected to serve a stable, read-mostly snapshot;
/// the core never mutates policies through this trait.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// The concrete policy type served by this source. Left generic at
    /// the facade layer so `warden-core` does not depend on
    /// `warden-policy`; `warden-agents` instantiates this with
    /// `warden_policy::model::Policy`.
    type Policy: Send + Sync + Clone;

    /// List all currently active policies.
    async fn list_active(&self) -> Vec<Self::Policy>;

    /// Find a policy by id, optionally pinned to a version.
    async fn find(&self, id: &str, version: Option<&str>) -> Option<Self::Policy>;

    /// Monotonically increasing generation counter, bumped on every
    /// accepted mutation. Used by the decision cache (spec.md §4.9) to
    /// invalidate entries keyed against a stale snapshot.
    async fn generation(&self) -> u64;
}

/// Best-effort sink for `DecisionEvent`s and `AuditEntry`s (spec.md §4.10).
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist a JSON-encoded record. Implementations should apply their
    /// own timeout (spec.md §6 `record_sink.timeout_ms`) and degrade to a
    /// logged warning rather than propagate an error.
    async fn persist(&self, kind: &str, record: serde_json::Value) -> Ack;
}

/// Best-effort sink for spans and events destined for telemetry export
/// (spec.md §4.10). Distinct from [`RecordSink`] because telemetry export
/// (e.g. OTLP) and durable persistence are different failure domains.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Emit a span or event. Best-effort; failures are logged, never
    /// propagated.
    async fn emit(&self, kind: &str, payload: serde_json::Value);
}

/// Clock abstraction: monotonic ids plus wall-clock ISO-8601 timestamps
/// (spec.md §4.10), so evaluation and test code can inject a fixed clock.
pub trait Clock: Send + Sync {
    /// Milliseconds since UNIX epoch.
    fn now_ms(&self) -> u64;

    /// Wall-clock time as an ISO-8601 / RFC-3339 UTC string.
    fn now_iso8601(&self) -> String {
        crate::ids::iso8601_from_ms(self.now_ms())
    }
}

/// Source of fresh identifiers for events and spans (spec.md §4.10:
/// "UUIDv4 for event/span ids").
pub trait IdSource: Send + Sync {
    /// Generate a new unique id.
    fn new_id(&self) -> String;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        now_ms()
    }
}

/// [`IdSource`] backed by UUIDv4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn new_id(&self) -> String {
        new_uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let c = SystemClock;
        let a = c.now_ms();
        let b = c.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn uuid_source_is_unique() {
        let s = UuidSource;
        assert_ne!(s.new_id(), s.new_id());
    }

    #[test]
    fn ack_helpers() {
        assert!(Ack::ok().accepted);
        assert!(!Ack::rejected("nope").accepted);
    }
}
