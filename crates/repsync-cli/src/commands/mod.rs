pub mod common;
pub mod completions;
pub mod conflicts;
pub mod enqueue;
pub mod metrics;
pub mod queue;
pub mod sync;
