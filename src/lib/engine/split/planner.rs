//! Turn input argument lists into parallel parts.

use indexmap::IndexMap;
use log::debug;
use std::path::PathBuf;

use super::error::{Result, SplitError};
use super::organize::add_combine_parts;
use super::types::{CombineMap, Item, OutfileIndex, SplitOutcome, TaskArg, TaskArgs};

/// Everything the split pass decided about a set of inputs.
#[derive(Debug, Clone, Default)]
pub struct SplitPlan {
    /// Argument lists to run in parallel: input arguments plus part arguments.
    pub parts: Vec<TaskArgs>,
    /// Part output path to the combined output it belongs to.
    pub combine_map: CombineMap,
    /// Inputs with nothing to parallelize, one singleton per final output,
    /// in first-seen order.
    pub finished: Vec<Vec<Item>>,
    /// Inputs that produced neither parts nor a final output.
    pub extras: Vec<Item>,
}

/// Split every input with `split_fn`.
///
/// `outfile_index` picks the output path from each part's own arguments.
pub fn plan<F>(
    args: Vec<TaskArgs>,
    mut split_fn: F,
    file_key: &str,
    outfile_index: OutfileIndex,
) -> Result<SplitPlan>
where
    F: FnMut(&[TaskArg]) -> anyhow::Result<SplitOutcome>,
{
    let mut parts = Vec::new();
    let mut combine_map = CombineMap::default();
    let mut finished: IndexMap<PathBuf, Item> = IndexMap::new();
    let mut extras = Vec::new();

    for data in args {
        let SplitOutcome { out_final, parts: out_parts } =
            split_fn(&data).map_err(SplitError::Split)?;

        if !out_parts.is_empty() {
            let out_final = out_final.ok_or_else(|| {
                SplitError::contract("split function returned parts without a final output")
            })?;
            for part in out_parts {
                let part_out = outfile_index
                    .select(&part)
                    .and_then(TaskArg::as_path)
                    .ok_or_else(|| {
                        SplitError::contract(format!(
                            "part arguments have no output path at {:?}",
                            outfile_index
                        ))
                    })?
                    .to_path_buf();
                combine_map.insert(part_out, out_final.clone());

                let mut full = data.clone();
                full.extend(part);
                parts.push(full);
            }
            continue;
        }

        match out_final {
            Some(out_final) => {
                let mut item = first_item(data)?;
                if let Some(base) = finished.get_mut(&out_final) {
                    if item.has_combine() {
                        add_combine_parts(base, &item)?;
                    } else {
                        extras.push(item);
                    }
                } else {
                    item.set_file(file_key, out_final.clone());
                    finished.insert(out_final, item);
                }
            }
            None => {
                if data.len() != 1 {
                    return Err(SplitError::contract(format!(
                        "input without output or parts must be a single item, got {} arguments",
                        data.len()
                    )));
                }
                extras.push(first_item(data)?);
            }
        }
    }

    debug!(
        "Split into {} parts across {} outputs; {} finished, {} extras",
        parts.len(),
        combine_map.values().collect::<rustc_hash::FxHashSet<_>>().len(),
        finished.len(),
        extras.len()
    );

    Ok(SplitPlan {
        parts,
        combine_map,
        finished: finished.into_values().map(|item| vec![item]).collect(),
        extras,
    })
}

fn first_item(data: TaskArgs) -> Result<Item> {
    data.into_iter()
        .next()
        .and_then(TaskArg::into_item)
        .ok_or_else(|| SplitError::contract("first argument of an input must be an item"))
}
