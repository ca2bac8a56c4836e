//! Split inputs into parts, process them in parallel, combine the results.
//!
//! A run goes through the following stages, each in its own module:
//!
//! 1. [`planner`]: a split function turns every input into part argument
//!    lists plus a combine map (`part output -> combined output`).
//! 2. [`group`] (optional): parts of related samples are merged into group
//!    items for joint processing, then routed back out for ungrouping.
//! 3. [`organize`]: processed results are re-keyed by combined output to
//!    build the combine task's argument lists.
//! 4. [`extras`]: inputs that were never processed are merged back in.
//!
//! Parallel execution itself goes through a [`ParallelRunner`]. Results are
//! matched back to their outputs purely by path, never by position.

pub mod error;
pub mod extras;
pub mod group;
pub mod organize;
pub mod planner;
pub mod types;

use log::{debug, info};

use super::runner::ParallelRunner;
pub use error::{Result, SplitError};
pub use extras::reconcile;
pub use group::{check_group_status, group_combine_parts};
pub use organize::{add_combine_info, organize};
pub use planner::{plan, SplitPlan};
pub use types::{
    Batch, CombineArgKeys, CombineInfo, CombineMap, GroupInfo, GroupMember, Item, Metadata,
    OutfileIndex, SplitOutcome, TaskArg, TaskArgs,
};

/// Split, run parts with `parallel_name`, then combine with `combine_name`.
///
/// Without a combine task, results are returned individually with their
/// pending combine target recorded for a later stage.
#[allow(clippy::too_many_arguments)]
pub fn parallel_split_combine<R, F>(
    args: Vec<TaskArgs>,
    split_fn: F,
    runner: &R,
    parallel_name: &str,
    combine_name: Option<&str>,
    file_key: &str,
    combine_arg_keys: &CombineArgKeys,
    outfile_index: OutfileIndex,
) -> Result<Vec<Vec<Item>>>
where
    R: ParallelRunner + ?Sized,
    F: FnMut(&[TaskArg]) -> anyhow::Result<SplitOutcome>,
{
    let SplitPlan {
        parts,
        combine_map,
        finished,
        extras,
    } = plan(args, split_fn, file_key, outfile_index)?;

    let split_output = run_nonempty(runner, parallel_name, parts)?;

    let final_args = match combine_name {
        Some(combine_name) => {
            let (combine_args, final_args) =
                organize(split_output, &combine_map, file_key, combine_arg_keys)?;
            run_nonempty(runner, combine_name, combine_args)?;
            final_args
        }
        None => add_combine_info(split_output, &combine_map, file_key)?,
    };

    let mut out = finished;
    out.extend(final_args);
    reconcile(out, extras)
}

/// Like [`parallel_split_combine`], but lets `group_fn` merge related parts
/// for joint processing. Group results are pulled apart again with
/// `ungroup_name` before combination.
#[allow(clippy::too_many_arguments)]
pub fn grouped_parallel_split_combine<R, F, G>(
    args: Vec<TaskArgs>,
    split_fn: F,
    group_fn: G,
    runner: &R,
    parallel_name: &str,
    ungroup_name: &str,
    combine_name: &str,
    file_key: &str,
    combine_arg_keys: &CombineArgKeys,
    outfile_index: OutfileIndex,
) -> Result<Vec<Vec<Item>>>
where
    R: ParallelRunner + ?Sized,
    F: FnMut(&[TaskArg]) -> anyhow::Result<SplitOutcome>,
    G: FnOnce(Vec<TaskArgs>) -> anyhow::Result<(Vec<TaskArgs>, GroupInfo)>,
{
    let SplitPlan {
        parts,
        combine_map,
        finished,
        extras,
    } = plan(args, split_fn, file_key, outfile_index)?;

    let (grouped_args, group_info) = group::group(parts, group_fn)?;
    let split_output = run_nonempty(runner, parallel_name, grouped_args)?;
    let (mut final_output, grouped_output) = check_group_status(split_output, &group_info)?;
    final_output.extend(run_nonempty(runner, ungroup_name, grouped_output)?);

    let (combine_args, final_args) =
        organize(final_output, &combine_map, file_key, combine_arg_keys)?;
    run_nonempty(runner, combine_name, combine_args)?;

    let mut out = finished;
    out.extend(final_args);
    reconcile(out, extras)
}

fn run_nonempty<R>(runner: &R, task: &str, args: Vec<TaskArgs>) -> Result<Vec<Item>>
where
    R: ParallelRunner + ?Sized,
{
    if args.is_empty() {
        debug!("Skipping {}: no work", task);
        return Ok(Vec::new());
    }
    info!("Dispatching {} x {}", args.len(), task);
    runner.run_parallel(task, args)
}
