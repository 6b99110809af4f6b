//! In-process decision observability: a low-cardinality counter plus an
//! installable observer hook, generalizing the `PolicyMetrics` /
//! `PolicyObserver` global-counter pattern to this engine's
//! `{phase, outcome}` shape (ambient observability, not a governed
//! feature).

use crate::engine::Decision;
use crate::model::DecisionOutcome;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Observer invoked for each synthesized decision. Implementations must
/// be cheap and non-blocking.
pub trait EngineObserver: Send + Sync {
    /// Called once per `Engine::evaluate` call, after synthesis.
    fn on_decision(&self, phase: &str, decision: &Decision);
}

static OBSERVER: OnceLock<RwLock<Option<Arc<dyn EngineObserver>>>> = OnceLock::new();

/// Install or clear the global engine observer.
pub fn set_observer(observer: Option<Box<dyn EngineObserver>>) {
    let cell = OBSERVER.get_or_init(|| RwLock::new(None));
    let mut w = cell.write().expect("observer lock poisoned");
    *w = observer.map(Arc::from);
}

/// In-process counters for decisions, keyed by `{phase, outcome}`.
#[derive(Default)]
pub struct EngineMetrics {
    inner: Mutex<HashMap<(String, &'static str), u64>>,
}

impl EngineMetrics {
    /// Current count for a given `{phase, outcome}` pair.
    #[must_use]
    pub fn count(&self, phase: &str, outcome: DecisionOutcome) -> u64 {
        let key = (phase.to_string(), outcome_str(outcome));
        self.inner.lock().expect("metrics lock poisoned").get(&key).copied().unwrap_or(0)
    }

    fn inc(&self, phase: &str, outcome: DecisionOutcome) {
        let key = (phase.to_string(), outcome_str(outcome));
        let mut g = self.inner.lock().expect("metrics lock poisoned");
        *g.entry(key).or_insert(0) += 1;
    }
}

fn outcome_str(outcome: DecisionOutcome) -> &'static str {
    match outcome {
        DecisionOutcome::Allow => "allow",
        DecisionOutcome::Deny => "deny",
        DecisionOutcome::Warn => "warn",
        DecisionOutcome::Modify => "modify",
    }
}

static METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Access the global engine metrics registry.
pub fn engine_metrics() -> &'static EngineMetrics {
    METRICS.get_or_init(EngineMetrics::default)
}

/// Record a decision against the global metrics and notify the installed
/// observer, if any. Called by `warden-agents` after each evaluation
/// (kept out of `Engine::evaluate` itself so the pure evaluation path has
/// no global state dependency).
pub fn record(phase: &str, decision: &Decision) {
    engine_metrics().inc(phase, decision.outcome);
    if let Some(lock) = OBSERVER.get() {
        if let Ok(r) = lock.read() {
            if let Some(obs) = r.as_ref() {
                obs.on_decision(phase, decision);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn decision(outcome: DecisionOutcome) -> Decision {
        Decision {
            outcome,
            matched_policies: vec![],
            matched_rules: vec![],
            reason: None,
            modifications: BTreeMap::new(),
            evaluation_time_ms: 0,
            trace: None,
        }
    }

    #[test]
    fn counts_by_phase_and_outcome() {
        let before = engine_metrics().count("test_phase_1", DecisionOutcome::Deny);
        record("test_phase_1", &decision(DecisionOutcome::Deny));
        let after = engine_metrics().count("test_phase_1", DecisionOutcome::Deny);
        assert_eq!(after, before + 1);
    }
}
