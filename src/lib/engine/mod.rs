//! Parallel execution engine: task runners and the split/combine driver.

pub mod runner;
pub mod split;

pub use runner::{LocalRunner, ParallelRunner, TaskFn, TaskRegistry};
pub use split::{grouped_parallel_split_combine, parallel_split_combine};
