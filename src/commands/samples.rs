use anyhow::Result;
use log::info;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use structopt::StructOpt;
use varsplit_lib::variation::{sample_names, vcf};

/// CLI arguments for the `samples` subcommand.
#[derive(Debug, Clone, StructOpt)]
#[structopt(author, name = "samples")]
pub struct SamplesArgs {
    /// VCF to inspect (plain or bgzipped).
    pub input: PathBuf,

    /// Also report whether the file holds any variant records.
    #[structopt(long, short = "v")]
    pub variants: bool,
}

/// Print the sample columns of a VCF, one per line.
pub fn run_samples(args: SamplesArgs) -> Result<()> {
    let names = sample_names(&args.input)?;
    info!("{:?} holds {} samples", args.input, names.len());

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    for name in &names {
        writeln!(writer, "{}", name)?;
    }
    if args.variants {
        writeln!(writer, "# has_variants\t{}", vcf::has_variants(&args.input)?)?;
    }
    writer.flush()?;
    Ok(())
}
