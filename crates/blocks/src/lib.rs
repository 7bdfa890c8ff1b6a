//! `blocks` crate: the `Block` trait and built-in block implementations.
//!
//! Every block, built-in or integration, must implement [`Block`].
//! The engine crate resolves a node's `type` through a [`BlockRegistry`] and
//! dispatches execution through this trait object.

pub mod builtin;
pub mod environment;
pub mod error;
pub mod mock;
pub mod models;
pub mod registry;
pub mod traits;

pub use environment::ExecutionEnvironment;
pub use error::BlockError;
pub use models::{Node, Out};
pub use registry::BlockRegistry;
pub use traits::{Block, BlockOutput, BranchRunner, RunContext};

/// Outcome of a block that finished normally.
pub const OUTCOME_SUCCESS: &str = "success";
/// Outcome recorded for a failure that named nothing more specific.
pub const OUTCOME_ERROR: &str = "error";
