//! Engine configuration: recognised keys, each overridable via
//! environment (spec.md §6 "Configuration").

use serde::{Deserialize, Serialize};

/// Deployment environment, embedded in every event's `execution_ref`
/// (spec.md §6 `env ∈ {dev, staging, prod}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local/developer environment.
    Dev,
    /// Pre-production environment.
    Staging,
    /// Production environment.
    Prod,
}

impl Environment {
    fn from_env_str(s: &str) -> Option<Self> {
        match s {
            "dev" => Some(Self::Dev),
            "staging" => Some(Self::Staging),
            "prod" => Some(Self::Prod),
            _ => None,
        }
    }

    /// Lowercase wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }
}

/// Recognised configuration keys, each loaded from a default and
/// overlaid by a `WARDEN_*` environment variable, following a direct
/// `std::env::var` lookup style rather than a layered config-file
/// loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `policy.cache.ttl_seconds` (`WARDEN_POLICY_CACHE_TTL_SECONDS`).
    pub policy_cache_ttl_seconds: u64,
    /// `policy.cache.max_entries` (`WARDEN_POLICY_CACHE_MAX_ENTRIES`).
    pub policy_cache_max_entries: usize,
    /// `governance.warning_threshold_percent`
    /// (`WARDEN_GOVERNANCE_WARNING_THRESHOLD_PERCENT`).
    pub governance_warning_threshold_percent: u8,
    /// `governance.critical_threshold_percent`
    /// (`WARDEN_GOVERNANCE_CRITICAL_THRESHOLD_PERCENT`).
    pub governance_critical_threshold_percent: u8,
    /// `record_sink.timeout_ms` (`WARDEN_RECORD_SINK_TIMEOUT_MS`).
    pub record_sink_timeout_ms: u64,
    /// `telemetry.enabled` (`WARDEN_TELEMETRY_ENABLED`).
    pub telemetry_enabled: bool,
    /// `telemetry.endpoint` (`WARDEN_TELEMETRY_ENDPOINT`).
    pub telemetry_endpoint: Option<String>,
    /// `env` (`WARDEN_ENV`).
    pub env: Environment,
    /// Timezone approval time-of-day windows are evaluated in
    /// (`WARDEN_APPROVAL_TIMEZONE`). spec.md §9 Open Question: resolved
    /// to UTC-only (see DESIGN.md) — this field is carried for forward
    /// compatibility but [`warden_approval::route`] always interprets
    /// `now_ms` as UTC regardless of its value.
    pub approval_timezone: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            policy_cache_ttl_seconds: 60,
            policy_cache_max_entries: 10_000,
            governance_warning_threshold_percent: 75,
            governance_critical_threshold_percent: 90,
            record_sink_timeout_ms: 2_000,
            telemetry_enabled: true,
            telemetry_endpoint: None,
            env: Environment::Dev,
            approval_timezone: "UTC".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build a config from defaults overlaid with `WARDEN_*` environment
    /// variables, leaving any unset/unparsable variable at its default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("WARDEN_POLICY_CACHE_TTL_SECONDS") {
            if let Ok(n) = v.parse() {
                cfg.policy_cache_ttl_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_POLICY_CACHE_MAX_ENTRIES") {
            if let Ok(n) = v.parse() {
                cfg.policy_cache_max_entries = n;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_GOVERNANCE_WARNING_THRESHOLD_PERCENT") {
            if let Ok(n) = v.parse() {
                cfg.governance_warning_threshold_percent = n;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_GOVERNANCE_CRITICAL_THRESHOLD_PERCENT") {
            if let Ok(n) = v.parse() {
                cfg.governance_critical_threshold_percent = n;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_RECORD_SINK_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.record_sink_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_TELEMETRY_ENABLED") {
            if let Ok(b) = v.parse() {
                cfg.telemetry_enabled = b;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_TELEMETRY_ENDPOINT") {
            cfg.telemetry_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("WARDEN_ENV") {
            if let Some(env) = Environment::from_env_str(&v) {
                cfg.env = env;
            }
        }
        if let Ok(v) = std::env::var("WARDEN_APPROVAL_TIMEZONE") {
            cfg.approval_timezone = v;
        }
        cfg
    }
}
