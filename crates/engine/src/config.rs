//! Engine configuration.
//!
//! Defaults suit embedding; [`EngineConfig::from_env`] lets a container
//! deployment override them without code changes.

use serde::{Deserialize, Serialize};

/// Depth guard bound: how many times one node may appear in a lineage's
/// call stack before the next attempt is refused.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 32;

/// Size of the shared worker pool.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Tuning knobs for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of blocks executing at once, across every run driven
    /// by one engine.
    pub max_workers: usize,
    /// Depth guard bound.
    pub max_call_depth: usize,
    /// Session the run ids are derived from.
    pub session_id: String,
    /// Whether run summaries are written to the audit sink.
    pub audit_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            session_id: "default".to_string(),
            audit_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `BLUEPRINT_*` environment variables. Absent or
    /// unparsable values keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_workers: env_parse("BLUEPRINT_MAX_WORKERS").unwrap_or(defaults.max_workers),
            max_call_depth: env_parse("BLUEPRINT_MAX_CALL_DEPTH")
                .unwrap_or(defaults.max_call_depth),
            session_id: std::env::var("BLUEPRINT_SESSION_ID").unwrap_or(defaults.session_id),
            audit_enabled: env_parse("BLUEPRINT_AUDIT_ENABLED").unwrap_or(defaults.audit_enabled),
        }
    }

    /// Pool size actually used; a pool needs at least one slot.
    pub fn worker_slots(&self) -> usize {
        self.max_workers.max(1)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
