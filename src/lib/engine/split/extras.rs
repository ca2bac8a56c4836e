//! Bring never-processed items back alongside combined outputs.

use log::debug;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

use super::error::{Result, SplitError};
use super::types::Item;

/// Merge `extras` into the finished/combined argument lists.
///
/// Extras without combine metadata are emitted first as standalone items.
/// Extras with combine metadata are attached to every argument item that
/// combines into the same output, via that item's combine extras.
pub fn reconcile(args: Vec<Vec<Item>>, extras: Vec<Item>) -> Result<Vec<Vec<Item>>> {
    if extras.is_empty() {
        return Ok(args);
    }
    if args.is_empty() {
        return Ok(extras.into_iter().map(|x| vec![x]).collect());
    }

    let total = extras.len();
    let mut out = Vec::with_capacity(args.len() + total);
    let mut bucketed = Vec::new();
    for extra in extras {
        if extra.has_combine() {
            bucketed.push(extra);
        } else {
            out.push(vec![extra]);
        }
    }
    let standalone = out.len();

    if bucketed.is_empty() {
        out.extend(args);
        return Ok(out);
    }

    let file_key = args[0]
        .first()
        .ok_or_else(|| SplitError::contract("empty argument list while reconciling extras"))?
        .combine_key()?
        .to_string();

    let mut by_out: FxHashMap<PathBuf, Vec<PathBuf>> = FxHashMap::default();
    for extra in &bucketed {
        let info = extra.combine.get(&file_key).ok_or_else(|| {
            SplitError::contract(format!("extra has no combine information for '{}'", file_key))
        })?;
        let file = extra
            .file(&file_key)
            .ok_or_else(|| SplitError::contract(format!("extra has no '{}' file", file_key)))?;
        by_out
            .entry(info.out.clone())
            .or_default()
            .push(file.to_path_buf());
    }

    let mut attached = 0;
    for mut arg in args {
        if let Some(info) = arg.first_mut().and_then(|x| x.combine.get_mut(&file_key)) {
            if let Some(to_add) = by_out.get(&info.out) {
                attached += to_add.len();
                info.extras.extend(to_add.iter().cloned());
            }
        }
        out.push(arg);
    }

    debug!(
        "Reconciled {} extras: {} attached, {} standalone",
        total, attached, standalone
    );
    if attached + standalone < total {
        return Err(SplitError::ReconciliationShortfall {
            attached,
            standalone,
            total,
        });
    }
    Ok(out)
}
