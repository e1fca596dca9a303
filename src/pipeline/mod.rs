//! Batch processing pipeline — claim, classify, match, respond, dispatch.

pub mod processor;
pub mod sweep;

pub use processor::{BatchOutcome, CommentProcessor};
pub use sweep::{run_sweep, spawn_sweep_task, SweepStats};
