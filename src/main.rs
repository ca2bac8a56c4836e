//! varsplit - parallel split/combine for variant-calling pipelines
//!
//! Work on genomic files is split into independent parts (per contig or
//! region), processed concurrently and recombined into one output per input.
//!
//! # Tools
//!
//! - `combine`: merge VCF files in parallel by contig into one file
//! - `exclude`: drop samples from a VCF
//! - `samples`: list the sample columns of a VCF
//!
//! # Usage
//!
//! ```bash
//! # Merge per-sample calls into a cohort VCF, one contig per worker
//! varsplit combine S1.vcf.gz S2.vcf.gz -r hg19.fa -o cohort.vcf.gz -t 8
//!
//! # Remove a contaminated sample
//! varsplit exclude cohort.vcf.gz -s S2 -o cohort-clean.vcf.gz
//!
//! # Inspect sample names
//! varsplit samples cohort.vcf.gz
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

extern crate varsplit_lib;
pub mod commands;
use anyhow::Result;
use env_logger::Env;
use log::*;
use structopt::StructOpt;
use varsplit_lib::utils;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Parallel split/combine tools for variant-calling pipelines
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Merge VCF files in parallel by contig
    Combine(commands::CombineArgs),
    /// Remove samples from a VCF
    Exclude(commands::ExcludeArgs),
    /// List the samples in a VCF
    Samples(commands::SamplesArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Combine(args) => commands::run_combine(args)?,
            Subcommand::Exclude(args) => commands::run_exclude(args)?,
            Subcommand::Samples(args) => commands::run_samples(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if utils::is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
