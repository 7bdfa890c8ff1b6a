//! `engine` crate: reachability filtering, the blueprint scheduler, the
//! depth guard, run identity and auditing, and pooled runs.

pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod guard;
pub mod models;
pub mod pool;
pub mod run;

pub use audit::{AuditEntry, AuditEntryType, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use config::EngineConfig;
pub use error::EngineError;
pub use executor::{Engine, EngineBuilder, RunResult};
pub use graph::filter_branch;
pub use models::{Blueprint, GraphSource, InMemoryGraphSource};
