//! In-memory façade implementations for tests and examples, shipped as
//! concrete defaults alongside the abstract façade traits.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use warden_core::facade::{Ack, PolicySource, RecordSink};
use warden_policy::Policy;

/// A [`PolicySource`] backed by an in-memory `Vec<Policy>`, with a
/// generation counter bumped on every [`InMemoryPolicySource::set`].
#[derive(Default)]
pub struct InMemoryPolicySource {
    policies: Mutex<Vec<Policy>>,
    generation: AtomicU64,
}

impl InMemoryPolicySource {
    /// Construct a source seeded with `policies`.
    #[must_use]
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies: Mutex::new(policies), generation: AtomicU64::new(0) }
    }

    /// Replace the full policy set and bump the generation counter.
    pub fn set(&self, policies: Vec<Policy>) {
        *self.policies.lock().expect("policy lock poisoned") = policies;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PolicySource for InMemoryPolicySource {
    type Policy = Policy;

    async fn list_active(&self) -> Vec<Policy> {
        self.policies.lock().expect("policy lock poisoned").iter().filter(|p| p.is_active()).cloned().collect()
    }

    async fn find(&self, id: &str, version: Option<&str>) -> Option<Policy> {
        self.policies
            .lock()
            .expect("policy lock poisoned")
            .iter()
            .find(|p| p.id == id && version.is_none_or(|v| v == p.version))
            .cloned()
    }

    async fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// A [`RecordSink`] that discards every write and always acknowledges
/// success. Used where a test cares about the decision, not persistence.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecordSink;

#[async_trait]
impl RecordSink for NullRecordSink {
    async fn persist(&self, _kind: &str, _record: serde_json::Value) -> Ack {
        Ack::ok()
    }
}

trait OptionExt<T> {
    fn is_none_or(&self, f: impl FnOnce(T) -> bool) -> bool;
}

impl<T: Copy> OptionExt<T> for Option<T> {
    fn is_none_or(&self, f: impl FnOnce(T) -> bool) -> bool {
        match self {
            Some(v) => f(*v),
            None => true,
        }
    }
}
