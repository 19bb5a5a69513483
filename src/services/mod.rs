//! Service modules for the upload coordinator
//!
//! The coordinator owns batch-level concerns (validation, fan-out,
//! aggregation, callbacks); per-task work lives here.

pub mod task_runner;

pub use task_runner::TaskRunner;
