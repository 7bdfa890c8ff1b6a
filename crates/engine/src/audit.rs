//! Run identity and the audit trail handed to an external sink.
//!
//! The engine keeps nothing once a run ends; when auditing is enabled it
//! writes exactly one [`AuditEntry`] per run to the configured
//! [`AuditSink`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use uuid::Uuid;

/// Length of a run id in hex characters.
pub const RUN_ID_LEN: usize = 16;

/// Entries kept per list or map level by [`summarize_for_log`].
pub const SUMMARY_MAX_ENTRIES: usize = 100;

/// Stand-in for values the sink cannot represent.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "<unserializable>";

/// Derive a fixed-length, non-guessable run id from the session, the
/// current time and a random salt.
pub fn generate_run_id(session_id: &str) -> String {
    let now = Utc::now();
    let salt = Uuid::new_v4();

    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(salt.as_bytes());

    let mut id = hex::encode(hasher.finalize());
    id.truncate(RUN_ID_LEN);
    id
}

/// Copy `value` for the audit sink: at most [`SUMMARY_MAX_ENTRIES`] entries
/// are kept per list or map level, and a value that cannot be serialized is
/// replaced by [`UNSERIALIZABLE_PLACEHOLDER`].
pub fn summarize_for_log<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(value) => truncate(value),
        Err(_) => Value::String(UNSERIALIZABLE_PLACEHOLDER.to_owned()),
    }
}

fn truncate(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .take(SUMMARY_MAX_ENTRIES)
                .map(truncate)
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .take(SUMMARY_MAX_ENTRIES)
                .map(|(k, v)| (k, truncate(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Kind of audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntryType {
    /// The run drained or returned early.
    Info,
    /// The run was aborted.
    Error,
}

impl std::fmt::Display for AuditEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One node's line in an audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub node_id: String,
    pub block_type: String,
    pub outcome: String,
    pub message: String,
    pub execution_time_in_seconds: f64,
    pub result: Value,
    pub return_value: Option<Value>,
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub title: String,
    pub entry_type: AuditEntryType,
    pub message: String,
    pub run_id: String,
    /// Per-node summaries in readiness order.
    pub nodes: Vec<NodeSummary>,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Write-only consumer of run summaries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Emits every entry as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        let nodes = serde_json::to_string(&entry.nodes)
            .unwrap_or_else(|_| UNSERIALIZABLE_PLACEHOLDER.to_owned());
        match entry.entry_type {
            AuditEntryType::Info => info!(
                run_id = %entry.run_id,
                title = %entry.title,
                nodes = %nodes,
                "{}", entry.message
            ),
            AuditEntryType::Error => error!(
                run_id = %entry.run_id,
                title = %entry.title,
                nodes = %nodes,
                "{}", entry.message
            ),
        }
    }
}

/// Keeps entries in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries recorded so far, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}
