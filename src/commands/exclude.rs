use anyhow::Result;
use log::info;
use std::path::PathBuf;
use structopt::StructOpt;
use varsplit_lib::variation::exclude_samples;

use crate::commands::common;

/// CLI arguments for the `exclude` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "exclude")]
pub struct ExcludeArgs {
    /// Input VCF (plain or bgzipped).
    pub input: PathBuf,

    /// Output VCF without the excluded samples.
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// Sample to drop; repeat or comma-separate for several.
    #[structopt(long = "sample", short = "s", required = true, use_delimiter = true)]
    pub samples: Vec<String>,

    /// JSON pipeline configuration (tool paths).
    #[structopt(long, short = "c")]
    pub config: Option<PathBuf>,
}

/// Execute the `exclude` command, printing the file holding the result.
///
/// When none of the samples are present the input path itself is printed.
pub fn run_exclude(args: ExcludeArgs) -> Result<()> {
    let config = common::resolve_config(args.config.as_deref())?;
    let result = exclude_samples(&args.input, &args.output, &args.samples, &config.programs)?;
    if result == args.input {
        info!("No listed samples in {:?}; input left as is", args.input);
    }
    println!("{}", result.display());
    Ok(())
}
