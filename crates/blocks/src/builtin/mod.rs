//! Built-in block variants.
//!
//! Integration blocks (HTTP, AI completions, data sources) live outside this
//! crate and register themselves alongside these.

mod classify;
mod data;
mod flow;
mod log_message;

use std::sync::Arc;

pub use classify::ClassifyBlock;
pub use data::{AddBlock, ConstBlock, ReturnBlock};
pub use flow::{LoopBlock, RunBranchBlock};
pub use log_message::LogMessageBlock;

use crate::BlockRegistry;

/// Register every built-in block under its type key.
pub fn register_all(registry: &mut BlockRegistry) {
    registry
        .register(ConstBlock::TYPE, Arc::new(ConstBlock))
        .register(AddBlock::TYPE, Arc::new(AddBlock))
        .register(ReturnBlock::TYPE, Arc::new(ReturnBlock))
        .register(ClassifyBlock::TYPE, Arc::new(ClassifyBlock))
        .register(LogMessageBlock::TYPE, Arc::new(LogMessageBlock))
        .register(RunBranchBlock::TYPE, Arc::new(RunBranchBlock))
        .register(LoopBlock::TYPE, Arc::new(LoopBlock));
}
