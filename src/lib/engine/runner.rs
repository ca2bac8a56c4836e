//! Execution of named tasks over many argument lists.
//!
//! The split/combine engine only sees [`ParallelRunner`]. [`LocalRunner`] is
//! the multicore implementation used by the command line: it looks tasks up
//! in a [`TaskRegistry`] and fans argument lists out over a Rayon pool.

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::split::error::{Result, SplitError};
use super::split::types::{Item, TaskArg, TaskArgs};

/// A task function: one argument list in, any number of result items out.
pub type TaskFn = dyn Fn(&[TaskArg]) -> anyhow::Result<Vec<Item>> + Send + Sync;

/// Runs a named task once per argument list.
///
/// Implementations return only when every invocation has finished. Results
/// are the concatenation of each invocation's items in no guaranteed order.
pub trait ParallelRunner {
    fn run_parallel(&self, task: &str, args: Vec<TaskArgs>) -> Result<Vec<Item>>;
}

impl<R: ParallelRunner + ?Sized> ParallelRunner for &R {
    fn run_parallel(&self, task: &str, args: Vec<TaskArgs>) -> Result<Vec<Item>> {
        (**self).run_parallel(task, args)
    }
}

/// Task functions addressable by name.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: FxHashMap<String, Arc<TaskFn>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S, F>(&mut self, name: S, task: F) -> &mut Self
    where
        S: Into<String>,
        F: Fn(&[TaskArg]) -> anyhow::Result<Vec<Item>> + Send + Sync + 'static,
    {
        self.tasks.insert(name.into(), Arc::new(task));
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<TaskFn>> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| SplitError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.tasks.keys().collect();
        names.sort();
        f.debug_struct("TaskRegistry").field("tasks", &names).finish()
    }
}

/// Multicore runner backed by a dedicated Rayon pool.
pub struct LocalRunner {
    registry: TaskRegistry,
    pool: rayon::ThreadPool,
}

impl LocalRunner {
    pub fn new(registry: TaskRegistry, cores: usize) -> anyhow::Result<Self> {
        let pool = crate::core::concurrency::build_pool(cores)?;
        info!("Local runner using {} cores", pool.current_num_threads());
        Ok(Self { registry, pool })
    }

    pub fn cores(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl ParallelRunner for LocalRunner {
    fn run_parallel(&self, task: &str, args: Vec<TaskArgs>) -> Result<Vec<Item>> {
        let task_fn = self.registry.get(task)?;
        if args.is_empty() {
            debug!("Nothing to run for {}", task);
            return Ok(Vec::new());
        }
        info!("Running {} on {} argument sets", task, args.len());

        let outputs = self.pool.install(|| {
            args.par_iter()
                .map(|a| {
                    (*task_fn)(a.as_slice()).map_err(|source| SplitError::Task {
                        task: task.to_string(),
                        source,
                    })
                })
                .collect::<Result<Vec<Vec<Item>>>>()
        })?;
        Ok(outputs.into_iter().flatten().collect())
    }
}
