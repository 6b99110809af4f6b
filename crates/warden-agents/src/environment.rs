//! Agent environment: the concrete wiring of the façade traits
//! (spec.md §4.10) plus the shared policy engine and decision cache
//! every agent entry point runs against.

use std::sync::Arc;
use warden_core::facade::{Clock, IdSource, PolicySource, RecordSink, TelemetrySink};
use warden_decision::DecisionCache;
use warden_policy::{Engine, Policy};

use crate::config::EngineConfig;

/// Everything an agent entry point needs beyond its request: the policy
/// source, best-effort sinks, clock/id sources, config, the shared
/// policy engine, and the decision cache. Holds these as concrete state
/// rather than threading them through every call.
#[derive(Clone)]
pub struct AgentEnvironment {
    /// Source of the active policy corpus.
    pub policy_source: Arc<dyn PolicySource<Policy = Policy>>,
    /// Best-effort decision/audit record sink.
    pub record_sink: Arc<dyn RecordSink>,
    /// Best-effort telemetry sink.
    pub telemetry: Arc<dyn TelemetrySink>,
    /// Wall clock.
    pub clock: Arc<dyn Clock>,
    /// Id generator.
    pub ids: Arc<dyn IdSource>,
    /// Recognised configuration (spec.md §6).
    pub config: EngineConfig,
    /// Rule & policy engine (spec.md §4.3), holding the active snapshot.
    pub engine: Engine,
    /// Decision cache (spec.md §4.9), shared across agent invocations.
    pub cache: Arc<DecisionCache>,
}

impl AgentEnvironment {
    /// Build an environment, seeding the engine's snapshot from
    /// `policy_source` and the decision cache's TTL from `config`.
    pub async fn new(
        policy_source: Arc<dyn PolicySource<Policy = Policy>>,
        record_sink: Arc<dyn RecordSink>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
        config: EngineConfig,
    ) -> Self {
        let engine = Engine::new();
        engine.load(policy_source.list_active().await);
        let cache = Arc::new(DecisionCache::new(config.policy_cache_ttl_seconds * 1_000));
        Self { policy_source, record_sink, telemetry, clock, ids, config, engine, cache }
    }

    /// Refresh the engine's snapshot from `policy_source` and
    /// invalidate the decision cache (spec.md §8 property 8 "cache
    /// coherence"). Callers invoke this after an accepted mutation.
    pub async fn refresh(&self) {
        self.engine.load(self.policy_source.list_active().await);
        self.cache.invalidate_all();
    }
}
