//! Region-parallel merging of VCF files.
//!
//! Inputs are bgzipped and indexed, merged contig by contig through the
//! split/combine engine and finally concatenated back in reference order.

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use noodles::fasta::fai;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::{PipelineConfig, Programs};
use crate::core::fs::{
    file_exists, is_bgzipped, make_parent_dirs, splitext_plus, with_transaction,
};
use crate::core::io::write_text;
use crate::core::programs::run_program;
use crate::engine::runner::ParallelRunner;
use crate::engine::split::{
    parallel_split_combine, CombineArgKeys, Item, OutfileIndex, SplitOutcome, TaskArg, TaskArgs,
};
use crate::variation::vcf::bgzip_and_index;

/// File key the combine run tracks its inputs and outputs under.
pub const VCF_FILES_KEY: &str = "vcf_files";

pub const BGZIP_TASK: &str = "bgzip_and_index";
/// Field naming the input a prepared (bgzipped and indexed) file came from.
pub const SOURCE_FIELD: &str = "source";
pub const MERGE_TASK: &str = "merge_variant_files";
pub const CONCAT_TASK: &str = "concat_variant_files";

/// One reference sequence as listed in a FASTA index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub length: u64,
}

/// Contigs of a reference, in file order, from its `.fai` index.
pub fn file_contigs<P: AsRef<Path>>(ref_file: P) -> Result<Vec<Contig>> {
    let fai_path = PathBuf::from(format!("{}.fai", ref_file.as_ref().display()));
    let index = fai::fs::read(&fai_path)
        .with_context(|| format!("Failed to read FAI index: {}", fai_path.display()))?;
    let records: &[fai::Record] = index.as_ref();
    Ok(records
        .iter()
        .map(|record| Contig {
            name: String::from_utf8_lossy(record.name().as_ref()).into_owned(),
            length: record.length(),
        })
        .collect())
}

/// A region argument: a bare contig name or `[contig, start, end]`.
fn region_sort_key(region: &Value, contig_order: &FxHashMap<&str, usize>) -> Result<(usize, u64, u64)> {
    let (contig, start, end) = match region {
        Value::String(contig) => (contig.as_str(), 0, 0),
        Value::Array(parts) => match parts.as_slice() {
            [Value::String(contig), start, end] => match (start.as_u64(), end.as_u64()) {
                (Some(start), Some(end)) => (contig.as_str(), start, end),
                _ => bail!("Region {} has non-integer bounds", region),
            },
            _ => bail!("Unexpected region {}", region),
        },
        _ => bail!("Unexpected region {}", region),
    };
    let index = contig_order
        .get(contig)
        .ok_or_else(|| anyhow!("Region contig {} not in reference", contig))?;
    Ok((*index, start, end))
}

/// Order per-region files by reference position of their regions.
pub fn sort_by_region(files: &[PathBuf], regions: &[Value], contigs: &[Contig]) -> Result<Vec<PathBuf>> {
    if files.len() != regions.len() {
        bail!(
            "{} files but {} regions to order them by",
            files.len(),
            regions.len()
        );
    }
    let contig_order: FxHashMap<&str, usize> = contigs
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();
    let mut keyed = files
        .iter()
        .zip(regions)
        .map(|(file, region)| Ok((region_sort_key(region, &contig_order)?, file.clone())))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, file)| file).collect())
}

fn output_type(out_file: &Path) -> &'static str {
    if is_bgzipped(out_file) {
        "z"
    } else {
        "v"
    }
}

/// Merge sample columns of several VCFs into `out_file`, restricted to
/// `region` when given. Existing outputs are reused.
pub fn merge_variant_files(
    files: &[PathBuf],
    out_file: &Path,
    region: Option<&str>,
    programs: &Programs,
) -> Result<PathBuf> {
    if !file_exists(out_file) {
        let prepped = files
            .iter()
            .map(|f| bgzip_and_index(f, programs))
            .collect::<Result<Vec<_>>>()?;
        with_transaction(out_file, |tx| {
            // bcftools merge needs two inputs; a lone file is subset instead
            let verb = if prepped.len() == 1 { "view" } else { "merge" };
            let mut args = vec![
                OsStr::new(verb),
                OsStr::new("-O"),
                OsStr::new(output_type(out_file)),
            ];
            if let Some(region) = region {
                args.push(OsStr::new("-r"));
                args.push(OsStr::new(region));
            }
            args.push(OsStr::new("-o"));
            args.push(tx.as_os_str());
            args.extend(prepped.iter().map(|p| p.as_os_str()));
            run_program(&programs.bcftools, args, "Merge variants")
        })?;
    }
    if is_bgzipped(out_file) {
        bgzip_and_index(out_file, programs)?;
    }
    Ok(out_file.to_path_buf())
}

/// Concatenate region-split VCFs sharing the same samples, in reference
/// order, into `out_file`.
pub fn concat_variant_files(
    files: &[PathBuf],
    out_file: &Path,
    regions: &[Value],
    ref_file: &Path,
    programs: &Programs,
) -> Result<PathBuf> {
    if file_exists(out_file) {
        return Ok(out_file.to_path_buf());
    }
    let sorted = sort_by_region(files, regions, &file_contigs(ref_file)?)?;
    let (base, _) = splitext_plus(out_file);
    let list_file = PathBuf::from(format!("{}-files.txt", base));
    let listing: String = sorted
        .iter()
        .map(|f| format!("{}\n", f.display()))
        .collect();
    write_text(&list_file, &listing)?;

    with_transaction(out_file, |tx| {
        run_program(
            &programs.bcftools,
            [
                OsStr::new("concat"),
                OsStr::new("-O"),
                OsStr::new(output_type(out_file)),
                OsStr::new("-f"),
                list_file.as_os_str(),
                OsStr::new("-o"),
                tx.as_os_str(),
            ],
            "Concatenate variants",
        )
    })?;
    Ok(out_file.to_path_buf())
}

/// Merge `files` into `out_file` in parallel by contig.
pub fn parallel_combine_variants<R>(
    files: &[PathBuf],
    out_file: &Path,
    ref_file: &Path,
    config: &PipelineConfig,
    runner: &R,
) -> Result<PathBuf>
where
    R: ParallelRunner + ?Sized,
{
    let config_value = config.to_value()?;
    info!(
        "Combining {} variant files into {}",
        files.len(),
        out_file.display()
    );

    let prep_args: Vec<TaskArgs> = files
        .iter()
        .map(|f| vec![TaskArg::Path(f.clone()), TaskArg::Value(config_value.clone())])
        .collect();
    let prepared = runner.run_parallel(BGZIP_TASK, prep_args)?;
    let by_source: FxHashMap<PathBuf, PathBuf> = prepared
        .iter()
        .filter_map(|item| {
            let source = item.field(SOURCE_FIELD)?.as_str()?;
            Some((PathBuf::from(source), item.file(VCF_FILES_KEY)?.to_path_buf()))
        })
        .collect();
    let prep_files = files
        .iter()
        .map(|f| {
            by_source
                .get(f)
                .map(|gz| Value::String(gz.to_string_lossy().into_owned()))
                .ok_or_else(|| anyhow!("No prepared file returned for {}", f.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let contigs = file_contigs(ref_file)?;
    let file_name = out_file
        .file_name()
        .ok_or_else(|| anyhow!("Output {} has no file name", out_file.display()))?;
    let (base, ext) = splitext_plus(file_name);
    let region_dir = out_file
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{}-regions", base));

    let split_by_region = |_: &[TaskArg]| -> Result<SplitOutcome> {
        let mut parts = Vec::with_capacity(contigs.len());
        for contig in &contigs {
            let region_out = region_dir.join(format!("{}-{}{}", base, contig.name, ext));
            make_parent_dirs(&region_out)?;
            parts.push(vec![
                TaskArg::Path(region_out),
                TaskArg::Path(ref_file.to_path_buf()),
                TaskArg::Value(config_value.clone()),
                TaskArg::Value(Value::String(contig.name.clone())),
            ]);
        }
        Ok(SplitOutcome::new(out_file, parts))
    };

    let input = Item::new()
        .with_field(VCF_FILES_KEY, Value::Array(prep_files))
        .with_field("config", config_value.clone());
    parallel_split_combine(
        vec![vec![TaskArg::Item(input)]],
        split_by_region,
        runner,
        MERGE_TASK,
        Some(CONCAT_TASK),
        VCF_FILES_KEY,
        &CombineArgKeys::reference_and_config(["region", "sam_ref", "config"]),
        OutfileIndex::At(0),
    )?;
    Ok(out_file.to_path_buf())
}
