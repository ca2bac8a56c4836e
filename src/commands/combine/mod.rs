mod args;

use anyhow::{bail, Result};
use log::info;
use varsplit_lib::engine::LocalRunner;
use varsplit_lib::utils;
use varsplit_lib::variation::{parallel_combine_variants, variant_registry};

use crate::commands::common;

pub use args::CombineArgs;

/// Execute the `combine` command end-to-end.
pub fn run_combine(args: CombineArgs) -> Result<()> {
    for input in &args.inputs {
        if !input.exists() {
            bail!("Input {} does not exist", input.display());
        }
    }
    let mut config = common::resolve_config(args.config.as_deref())?;
    config.cores = utils::determine_allowed_cpus(args.threads)?;

    let output = common::ensure_gz_path(&args.output);
    utils::make_parent_dirs(&output)?;

    info!(
        "Running varsplit combine on {} inputs with {} threads",
        args.inputs.len(),
        config.cores
    );
    let runner = LocalRunner::new(variant_registry(), config.cores)?;
    let combined =
        parallel_combine_variants(&args.inputs, &output, &args.reference, &config, &runner)?;
    info!("Combine complete -> {:?}", combined);
    Ok(())
}
