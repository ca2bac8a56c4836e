use std::path::PathBuf;
use structopt::StructOpt;

use crate::commands::common::DEFAULT_CORES_STR;

/// CLI arguments for the `combine` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "combine")]
pub struct CombineArgs {
    /// VCF files to merge (plain or bgzipped).
    #[structopt(required = true, min_values = 1)]
    pub inputs: Vec<PathBuf>,

    /// Combined output VCF (`.gz` will be appended when missing).
    #[structopt(long, short = "o")]
    pub output: PathBuf,

    /// Reference FASTA; its `.fai` index defines the contigs merged in parallel.
    #[structopt(long, short = "r")]
    pub reference: PathBuf,

    /// JSON pipeline configuration (tool paths, algorithm settings).
    #[structopt(long, short = "c")]
    pub config: Option<PathBuf>,

    /// Number of worker threads to use.
    #[structopt(long, short = "t", default_value = DEFAULT_CORES_STR.as_str())]
    pub threads: usize,
}
