//! varsplit: split, process in parallel, and recombine pipeline work.
//!
//! Inputs (sample items with their files) are split into independent parts by
//! a caller-supplied function, the parts run concurrently through a named
//! task, and the per-part outputs are combined back into one output per
//! original input. Results are routed by output path, so nothing depends on
//! the order in which parallel work completes.
//!
//! # Modules
//!
//! - [`engine`]: the split/combine driver and the task runners
//! - [`variation`]: VCF handling and variant tasks built on the engine
//! - [`config`]: pipeline configuration carried by items and tasks
//! - [`core`]: shared filesystem, I/O, process and concurrency helpers
//! - [`utils`]: flat re-exports of the most used helpers

pub mod config;
pub mod core;
pub mod engine;
pub mod utils;
pub mod variation;

pub mod prelude {
    pub use crate::config::{load_config, PipelineConfig, Programs};
    pub use crate::engine::runner::{LocalRunner, ParallelRunner, TaskRegistry};
    pub use crate::engine::split::{
        grouped_parallel_split_combine, parallel_split_combine, CombineArgKeys, CombineInfo,
        Item, OutfileIndex, SplitError, SplitOutcome, TaskArg, TaskArgs,
    };
    pub use crate::variation::register_variant_tasks;
}
