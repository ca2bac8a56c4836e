//! VCF header inspection, sample exclusion and bgzip/tabix preparation.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use noodles::vcf;
use serde_json::Value;
use std::ffi::OsStr;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::config::Programs;
use crate::core::fs::{file_exists, is_bgzipped, symlink_plus, with_transaction};
use crate::core::io::{get_reader, write_text};
use crate::core::programs::{run_program, run_program_to_file};
use crate::engine::split::Item;

const EMPTY_VCF: &str = "##fileformat=VCFv4.1\n\
##source=No variants; no reads aligned in region\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

/// Sample columns from the header of a plain or bgzipped VCF.
pub fn sample_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = vcf::io::reader::Builder::default()
        .build_from_path(path)
        .with_context(|| format!("Failed to open VCF: {}", path.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read VCF header: {}", path.display()))?;
    Ok(header.sample_names().iter().cloned().collect())
}

pub fn is_multisample<P: AsRef<Path>>(path: P) -> Result<bool> {
    Ok(sample_names(path)?.len() > 1)
}

/// Whether a VCF holds at least one record. Missing files hold none.
pub fn has_variants<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(false);
    }
    for line in get_reader(path)?.lines() {
        let line = line?;
        if !line.trim().is_empty() && !line.starts_with('#') {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn write_empty_vcf<P: AsRef<Path>>(path: P) -> Result<()> {
    write_text(path, EMPTY_VCF)
}

/// Role of a sample in a tumor/normal analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phenotype {
    Tumor,
    Normal,
}

/// Only `tumor` and `normal` phenotypes take part in paired analysis.
pub fn paired_phenotype(item: &Item) -> Option<Phenotype> {
    match item.phenotype()? {
        "tumor" => Some(Phenotype::Tumor),
        "normal" => Some(Phenotype::Normal),
        _ => None,
    }
}

/// Alignment inputs of a tumor/normal pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedData {
    pub tumor_bam: PathBuf,
    pub tumor_name: Option<String>,
    pub normal_bam: Option<PathBuf>,
    pub normal_name: Option<String>,
    /// Panel of normals for tumor-only calling.
    pub normal_panel: Option<PathBuf>,
}

/// Pair up alignments by phenotype. Tumor-only inputs still pair; inputs
/// without a tumor do not.
pub fn paired_bams(bams: &[PathBuf], items: &[Item]) -> Option<PairedData> {
    let mut tumor: Option<(PathBuf, Option<String>, Option<PathBuf>)> = None;
    let mut normal: Option<(PathBuf, Option<String>)> = None;
    for (bam, item) in bams.iter().zip(items) {
        let name = item.sample_name().map(str::to_string);
        match paired_phenotype(item) {
            Some(Phenotype::Normal) => normal = Some((bam.clone(), name)),
            Some(Phenotype::Tumor) => {
                let panel = item
                    .field("config")
                    .and_then(|c| c.pointer("/algorithm/background"))
                    .and_then(Value::as_str)
                    .map(PathBuf::from);
                tumor = Some((bam.clone(), name, panel));
            }
            None => {}
        }
    }
    let (tumor_bam, tumor_name, normal_panel) = tumor?;
    let (normal_bam, normal_name) = match normal {
        Some((bam, name)) => (Some(bam), name),
        None => (None, None),
    };
    Some(PairedData {
        tumor_bam,
        tumor_name,
        normal_bam,
        normal_name,
        normal_panel,
    })
}

pub fn is_paired_analysis(bams: &[PathBuf], items: &[Item]) -> bool {
    paired_bams(bams, items).is_some()
}

/// Partition the samples of a VCF into those kept and those excluded.
///
/// Names in `to_exclude` that are absent from the file are ignored. A file
/// without a readable sample header has nothing to exclude.
pub fn exclude_plan<P: AsRef<Path>>(
    path: P,
    to_exclude: &[String],
) -> Result<(Vec<String>, Vec<String>)> {
    let path = path.as_ref();
    let samples = match sample_names(path) {
        Ok(samples) => samples,
        Err(err) if path.is_file() => {
            debug!("No sample header in {}: {:#}", path.display(), err);
            Vec::new()
        }
        Err(err) => return Err(err),
    };
    Ok(samples.into_iter().partition(|s| !to_exclude.contains(s)))
}

/// Write `in_file` without the samples in `to_exclude` to `out_file`.
///
/// When none of the samples are present the input is already the answer and
/// is returned unchanged. An existing `out_file` is reused.
pub fn exclude_samples(
    in_file: &Path,
    out_file: &Path,
    to_exclude: &[String],
    programs: &Programs,
) -> Result<PathBuf> {
    let (include, exclude) = exclude_plan(in_file, to_exclude)?;
    if exclude.is_empty() {
        debug!("No samples to exclude from {}", in_file.display());
        return Ok(in_file.to_path_buf());
    }
    if file_exists(out_file) {
        return Ok(out_file.to_path_buf());
    }
    if include.is_empty() {
        bail!(
            "Excluding {:?} would remove every sample from {}",
            exclude,
            in_file.display()
        );
    }
    info!("Excluding {} samples from {}", exclude.len(), in_file.display());
    let output_type = if is_bgzipped(out_file) { "z" } else { "v" };
    let samples = include.join(",");
    with_transaction(out_file, |tx| {
        run_program(
            &programs.bcftools,
            [
                OsStr::new("view"),
                OsStr::new("-O"),
                OsStr::new(output_type),
                OsStr::new("-s"),
                OsStr::new(&samples),
                OsStr::new("-o"),
                tx.as_os_str(),
                in_file.as_os_str(),
            ],
            &format!("Exclude samples: {}", exclude.join(",")),
        )
    })?;
    Ok(out_file.to_path_buf())
}

/// bgzip a VCF or BED file (removing the plain input) and tabix index it.
///
/// Returns the compressed path. Already compressed inputs are only indexed.
pub fn bgzip_and_index(in_file: &Path, programs: &Programs) -> Result<PathBuf> {
    let out_file = if is_bgzipped(in_file) {
        in_file.to_path_buf()
    } else {
        PathBuf::from(format!("{}.gz", in_file.display()))
    };
    if !file_exists(&out_file) {
        let result = with_transaction(&out_file, |tx| {
            run_program_to_file(
                &programs.bgzip,
                [OsStr::new("-c"), in_file.as_os_str()],
                tx,
                &format!("bgzip {}", in_file.display()),
            )
        });
        // Another worker may already have compressed and removed the input.
        if let Err(err) = result {
            if in_file.exists() || !out_file.exists() {
                return Err(err);
            }
        }
        std::fs::remove_file(in_file).ok();
    }
    tabix_index(&out_file, programs, None)?;
    Ok(out_file)
}

/// tabix preset for a compressed file, from its extension.
pub fn guess_preset(path: &Path) -> Result<&'static str> {
    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".vcf.gz") {
        Ok("vcf")
    } else if name.ends_with(".bed.gz") {
        Ok("bed")
    } else if name.ends_with(".gff.gz") {
        Ok("gff")
    } else {
        bail!("Unexpected tabix input: {}", path.display())
    }
}

/// Index `in_file` with tabix unless a non-empty `.tbi` already exists.
pub fn tabix_index(in_file: &Path, programs: &Programs, preset: Option<&str>) -> Result<PathBuf> {
    let preset = match preset {
        Some(preset) => preset,
        None => guess_preset(in_file)?,
    };
    let index = PathBuf::from(format!("{}.tbi", in_file.display()));
    if file_exists(&index) {
        return Ok(index);
    }
    // tabix writes next to its input, so index a link placed at the
    // transaction path's data name.
    with_transaction(&index, |tx_index| {
        let tx_in = tx_index.with_extension("");
        symlink_plus(in_file, &tx_in)?;
        let result = run_program(
            &programs.tabix,
            [OsStr::new("-p"), OsStr::new(preset), tx_in.as_os_str()],
            &format!("tabix index {}", in_file.display()),
        );
        std::fs::remove_file(&tx_in).ok();
        result
    })?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::split::Metadata;
    use noodles::bgzf;
    use serde_json::json;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const TWO_SAMPLES: &str = "##fileformat=VCFv4.1\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n\
chr1\t100\t.\tA\tG\t50\tPASS\t.\tGT\t0/1\t0/0\n";

    fn sample(name: &str, phenotype: Option<&str>) -> Item {
        Item::new().with_field("name", name).with_metadata(Metadata {
            phenotype: phenotype.map(str::to_string),
            ..Metadata::default()
        })
    }

    #[test]
    fn reads_sample_columns_from_plain_and_gzipped_headers() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("calls.vcf");
        std::fs::write(&plain, TWO_SAMPLES).unwrap();
        let gz = dir.path().join("calls.vcf.gz");
        let mut writer = bgzf::io::Writer::new(File::create(&gz).unwrap());
        writer.write_all(TWO_SAMPLES.as_bytes()).unwrap();
        writer.finish().unwrap();

        for path in [&plain, &gz] {
            assert_eq!(sample_names(path).unwrap(), vec!["S1", "S2"]);
            assert!(is_multisample(path).unwrap());
            assert!(has_variants(path).unwrap());
        }
    }

    #[test]
    fn empty_vcf_has_no_samples_or_variants() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.vcf");
        write_empty_vcf(&path).unwrap();
        assert!(sample_names(&path).unwrap().is_empty());
        assert!(!is_multisample(&path).unwrap());
        assert!(!has_variants(&path).unwrap());
        assert!(!has_variants(dir.path().join("missing.vcf")).unwrap());
    }

    #[test]
    fn headerless_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.vcf");
        std::fs::write(&path, "chr1\t1\t.\tA\tG\n").unwrap();
        assert!(sample_names(&path).is_err());
    }

    #[test]
    fn headerless_file_has_nothing_to_exclude() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.vcf");
        std::fs::write(&path, "chr1\t1\t.\tA\tG\n").unwrap();
        let (include, exclude) = exclude_plan(&path, &["S1".to_string()]).unwrap();
        assert!(include.is_empty() && exclude.is_empty());

        let programs = Programs {
            bcftools: "varsplit-no-such-bcftools".to_string(),
            ..Programs::default()
        };
        let out = dir.path().join("filtered.vcf");
        assert_eq!(
            exclude_samples(&path, &out, &["S1".to_string()], &programs).unwrap(),
            path
        );
        assert!(exclude_plan(dir.path().join("missing.vcf"), &[]).is_err());
    }

    #[test]
    fn exclusion_splits_present_samples_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calls.vcf");
        std::fs::write(&path, TWO_SAMPLES).unwrap();
        let (include, exclude) =
            exclude_plan(&path, &["S2".to_string(), "S9".to_string()]).unwrap();
        assert_eq!(include, vec!["S1"]);
        assert_eq!(exclude, vec!["S2"]);
    }

    #[test]
    fn excluding_absent_samples_returns_the_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calls.vcf");
        std::fs::write(&path, TWO_SAMPLES).unwrap();
        let out = dir.path().join("filtered.vcf");
        let programs = Programs {
            bcftools: "varsplit-no-such-bcftools".to_string(),
            ..Programs::default()
        };

        let first = exclude_samples(&path, &out, &["S9".to_string()], &programs).unwrap();
        let second = exclude_samples(&first, &out, &["S9".to_string()], &programs).unwrap();
        assert_eq!(first, path);
        assert_eq!(second, path);
        assert!(!out.exists());
    }

    #[test]
    fn existing_exclusion_output_is_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calls.vcf");
        std::fs::write(&path, TWO_SAMPLES).unwrap();
        let out = dir.path().join("filtered.vcf");
        std::fs::write(&out, "##fileformat=VCFv4.1\n").unwrap();
        let programs = Programs {
            bcftools: "varsplit-no-such-bcftools".to_string(),
            ..Programs::default()
        };
        assert_eq!(
            exclude_samples(&path, &out, &["S2".to_string()], &programs).unwrap(),
            out
        );
    }

    #[test]
    fn phenotype_only_counts_tumor_and_normal() {
        assert_eq!(paired_phenotype(&sample("T", Some("tumor"))), Some(Phenotype::Tumor));
        assert_eq!(paired_phenotype(&sample("N", Some("normal"))), Some(Phenotype::Normal));
        assert_eq!(paired_phenotype(&sample("X", Some("control"))), None);
        assert_eq!(paired_phenotype(&Item::new()), None);
    }

    #[test]
    fn pairs_tumor_with_optional_normal() {
        let bams = vec![PathBuf::from("N.bam"), PathBuf::from("T.bam")];
        let tumor = sample("T", Some("tumor"))
            .with_field("config", json!({"algorithm": {"background": "pon.vcf.gz"}}));
        let items = vec![sample("N", Some("normal")), tumor.clone()];

        let paired = paired_bams(&bams, &items).unwrap();
        assert_eq!(paired.tumor_bam, PathBuf::from("T.bam"));
        assert_eq!(paired.tumor_name.as_deref(), Some("T"));
        assert_eq!(paired.normal_bam, Some(PathBuf::from("N.bam")));
        assert_eq!(paired.normal_name.as_deref(), Some("N"));
        assert_eq!(paired.normal_panel, Some(PathBuf::from("pon.vcf.gz")));

        let tumor_only = paired_bams(&bams[1..], &[tumor]).unwrap();
        assert!(tumor_only.normal_bam.is_none());

        assert!(!is_paired_analysis(&bams[..1], &items[..1]));
    }

    #[test]
    fn tabix_presets_follow_extensions() {
        assert_eq!(guess_preset(Path::new("a.vcf.gz")).unwrap(), "vcf");
        assert_eq!(guess_preset(Path::new("A.BED.GZ")).unwrap(), "bed");
        assert!(guess_preset(Path::new("a.vcf")).is_err());
    }
}
