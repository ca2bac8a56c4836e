//! Variant task functions, addressable by name through a [`TaskRegistry`].
//!
//! Each task decodes its positional arguments, delegates to the matching
//! library function and reports its outputs as items.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::combine::{
    concat_variant_files, merge_variant_files, BGZIP_TASK, CONCAT_TASK, MERGE_TASK, SOURCE_FIELD,
    VCF_FILES_KEY,
};
use super::item_config;
use super::multi::split_variants_by_sample;
use super::vcf::bgzip_and_index;
use crate::config::PipelineConfig;
use crate::engine::runner::TaskRegistry;
use crate::engine::split::{Item, TaskArg};

pub const SPLIT_BY_SAMPLE_TASK: &str = "split_variants_by_sample";

static VARIANT_TASKS: Lazy<TaskRegistry> = Lazy::new(|| {
    let mut registry = TaskRegistry::new();
    register_variant_tasks(&mut registry);
    registry
});

fn arg<'a>(args: &'a [TaskArg], i: usize, task: &str) -> Result<&'a TaskArg> {
    args.get(i)
        .ok_or_else(|| anyhow!("{}: missing argument {}", task, i))
}

fn path_arg<'a>(args: &'a [TaskArg], i: usize, task: &str) -> Result<&'a Path> {
    arg(args, i, task)?
        .as_path()
        .ok_or_else(|| anyhow!("{}: argument {} is not a path", task, i))
}

fn config_arg(args: &[TaskArg], i: usize, task: &str) -> Result<PipelineConfig> {
    match arg(args, i, task)? {
        TaskArg::Value(value) => PipelineConfig::from_value(value),
        _ => Err(anyhow!("{}: argument {} is not a configuration", task, i)),
    }
}

/// `[in_file, config]`
fn run_bgzip(args: &[TaskArg]) -> Result<Vec<Item>> {
    let in_file = path_arg(args, 0, BGZIP_TASK)?;
    let config = config_arg(args, 1, BGZIP_TASK)?;
    let out = bgzip_and_index(in_file, &config.programs)?;
    Ok(vec![Item::new()
        .with_file(VCF_FILES_KEY, out)
        .with_field(SOURCE_FIELD, in_file.to_string_lossy().into_owned())])
}

/// `[item | paths, out_file, ref_file, config, region]`
fn run_merge(args: &[TaskArg]) -> Result<Vec<Item>> {
    let files: Vec<PathBuf> = match arg(args, 0, MERGE_TASK)? {
        TaskArg::Item(item) => item.paths(VCF_FILES_KEY),
        other => other
            .to_paths()
            .ok_or_else(|| anyhow!("{}: argument 0 holds no input files", MERGE_TASK))?,
    };
    let out_file = path_arg(args, 1, MERGE_TASK)?;
    let ref_file = path_arg(args, 2, MERGE_TASK)?;
    let config_value = arg(args, 3, MERGE_TASK)?
        .as_value()
        .cloned()
        .ok_or_else(|| anyhow!("{}: argument 3 is not a configuration", MERGE_TASK))?;
    let config = PipelineConfig::from_value(&config_value)?;
    let region = args.get(4).and_then(TaskArg::as_value).cloned();

    let out = merge_variant_files(
        &files,
        out_file,
        region.as_ref().and_then(Value::as_str),
        &config.programs,
    )?;
    let mut item = Item::new()
        .with_file(VCF_FILES_KEY, out)
        .with_file("sam_ref", ref_file)
        .with_field("config", config_value);
    if let Some(region) = region {
        item.fields.insert("region".to_string(), region);
    }
    Ok(vec![item])
}

/// `[files, out_file, regions, ref_file, config]`
fn run_concat(args: &[TaskArg]) -> Result<Vec<Item>> {
    let files = arg(args, 0, CONCAT_TASK)?
        .to_paths()
        .ok_or_else(|| anyhow!("{}: argument 0 holds no input files", CONCAT_TASK))?;
    let out_file = path_arg(args, 1, CONCAT_TASK)?;
    let regions = match arg(args, 2, CONCAT_TASK)?.as_value() {
        Some(Value::Array(regions)) => regions.clone(),
        Some(region) => vec![region.clone()],
        None => return Err(anyhow!("{}: argument 2 holds no regions", CONCAT_TASK)),
    };
    let ref_file = path_arg(args, 3, CONCAT_TASK)?;
    let config = config_arg(args, 4, CONCAT_TASK)?;

    let out = concat_variant_files(&files, out_file, &regions, ref_file, &config.programs)?;
    Ok(vec![Item::new().with_file(VCF_FILES_KEY, out)])
}

/// `[grouped item]`
fn run_split_by_sample(args: &[TaskArg]) -> Result<Vec<Item>> {
    let item = arg(args, 0, SPLIT_BY_SAMPLE_TASK)?
        .as_item()
        .ok_or_else(|| anyhow!("{}: argument 0 is not an item", SPLIT_BY_SAMPLE_TASK))?;
    let config = item_config(item)?;
    split_variants_by_sample(item, &config.programs)
}

/// Register every variant task on `registry`.
pub fn register_variant_tasks(registry: &mut TaskRegistry) -> &mut TaskRegistry {
    registry
        .register(BGZIP_TASK, run_bgzip)
        .register(MERGE_TASK, run_merge)
        .register(CONCAT_TASK, run_concat)
        .register(SPLIT_BY_SAMPLE_TASK, run_split_by_sample)
}

/// A registry holding just the variant tasks.
pub fn variant_registry() -> TaskRegistry {
    VARIANT_TASKS.clone()
}
