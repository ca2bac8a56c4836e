//! Coordinated calling of batched samples.
//!
//! [`group_batches`] is the group function for a grouped split/combine run:
//! region parts of samples sharing a batch and caller are merged so the
//! caller sees every alignment of the batch at once. [`split_variants_by_sample`]
//! is the matching ungroup task that hands each sample its own calls again.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::item_config;
use super::vcf::{is_multisample, paired_phenotype, Phenotype};
use crate::config::Programs;
use crate::core::fs::{append_stem, file_exists, symlink_plus, with_transaction};
use crate::core::programs::run_program;
use crate::engine::split::{GroupInfo, GroupMember, Item, TaskArg, TaskArgs};

/// Item field holding the list of alignments a group item calls jointly.
pub const WORK_BAMS_FIELD: &str = "work_bams";
const WORK_BAM_KEY: &str = "work_bam";
const VRN_FILE_KEY: &str = "vrn_file";

type GroupKey = (String, String, String);

/// Group `[item, region, out]` parts by batch, region and variant caller.
///
/// Parts without a batch pass through unchanged ahead of the group parts.
/// A sample in several batches joins each of them.
pub fn group_batches(parts: Vec<TaskArgs>) -> Result<(Vec<TaskArgs>, GroupInfo)> {
    let mut singles = Vec::new();
    let mut groups: IndexMap<GroupKey, (Value, Vec<GroupMember>)> = IndexMap::new();

    for part in parts {
        let (item, region, out) = match part.as_slice() {
            [TaskArg::Item(item), TaskArg::Value(region), out] => (
                item,
                region,
                out.as_path()
                    .ok_or_else(|| anyhow!("calling part has no output path"))?,
            ),
            _ => bail!("calling parts must be [item, region, output], got {:?}", part),
        };
        let batches: Vec<String> = item.batches().into_iter().map(str::to_string).collect();
        if batches.is_empty() {
            singles.push(part);
            continue;
        }
        let caller = item_config(item)?.variant_caller().to_string();
        let region_key = region.to_string();
        for batch in batches {
            let key = (batch, region_key.clone(), caller.clone());
            groups
                .entry(key)
                .or_insert_with(|| (region.clone(), Vec::new()))
                .1
                .push(GroupMember {
                    item: item.clone(),
                    out: Some(out.to_path_buf()),
                });
        }
    }

    let mut info = GroupInfo::default();
    let n_singles = singles.len();
    let mut out = singles;
    for ((batch, _, _), (region, members)) in groups {
        let (first, first_out) = match members.first() {
            Some(GroupMember {
                item,
                out: Some(member_out),
            }) => (item, member_out),
            _ => continue,
        };
        let group_file = append_stem(first_out, &format!("-{}", batch));
        let group_name = group_file.to_string_lossy().into_owned();

        let mut group_item = first.clone();
        group_item.group = Some(group_name.clone());
        let bams: Vec<Value> = members
            .iter()
            .filter_map(|m| m.item.file(WORK_BAM_KEY))
            .map(|p| Value::String(p.to_string_lossy().into_owned()))
            .collect();
        group_item
            .fields
            .insert(WORK_BAMS_FIELD.to_string(), Value::Array(bams));

        out.push(vec![
            TaskArg::Item(group_item),
            TaskArg::Value(region),
            TaskArg::Path(group_file),
        ]);
        info.insert(group_name, members);
    }
    debug!(
        "Batched calling: {} single parts, {} group parts",
        n_singles,
        info.len()
    );
    Ok((out, info))
}

/// Ungroup a jointly called result into one item per original sample.
///
/// In tumor/normal analyses the tumor samples receive the joint calls while
/// normals lose their variant file; otherwise each sample gets its own file,
/// selected out of a multi-sample result or linked from a single-sample one.
pub fn split_variants_by_sample(item: &Item, programs: &Programs) -> Result<Vec<Item>> {
    let vrn_file = item
        .file(VRN_FILE_KEY)
        .ok_or_else(|| anyhow!("grouped result has no {}", VRN_FILE_KEY))?;

    if paired_phenotype(item).is_some() {
        return split_paired(item, vrn_file);
    }

    let multisample = vrn_file.exists() && is_multisample(vrn_file)?;
    let mut out = Vec::with_capacity(item.group_orig.len());
    for member in &item.group_orig {
        let sub_vrn_file = match &member.out {
            Some(path) => path,
            None => continue,
        };
        if multisample {
            let sample = member
                .item
                .sample_name()
                .ok_or_else(|| anyhow!("group member without a sample name"))?;
            select_sample_from_vcf(vrn_file, sample, sub_vrn_file, programs)?;
        } else if !sub_vrn_file.exists() {
            symlink_plus(vrn_file, sub_vrn_file)?;
        }
        let mut sub = member.item.clone();
        sub.set_file(VRN_FILE_KEY, sub_vrn_file.clone());
        out.push(sub);
    }
    Ok(out)
}

fn split_paired(item: &Item, vrn_file: &Path) -> Result<Vec<Item>> {
    if let [only] = item.group_orig.as_slice() {
        if paired_phenotype(&only.item) == Some(Phenotype::Normal) {
            let mut sub = only.item.clone();
            sub.remove_file(VRN_FILE_KEY);
            return Ok(vec![sub]);
        }
    }

    let mut has_tumor = false;
    let mut out = Vec::with_capacity(item.group_orig.len());
    for member in &item.group_orig {
        let mut sub = member.item.clone();
        match (paired_phenotype(&sub), &member.out) {
            (Some(Phenotype::Tumor), Some(sub_vrn_file)) => {
                has_tumor = true;
                if !sub_vrn_file.exists() {
                    symlink_plus(vrn_file, sub_vrn_file)?;
                }
                sub.set_file(VRN_FILE_KEY, sub_vrn_file.clone());
            }
            _ => {
                sub.remove_file(VRN_FILE_KEY);
            }
        }
        out.push(sub);
    }
    if !has_tumor {
        bail!("Did not find tumor sample in paired analysis");
    }
    Ok(out)
}

/// Extract a single sample from a multi-sample VCF with `bcftools view`.
pub fn select_sample_from_vcf(
    in_file: &Path,
    sample: &str,
    out_file: &Path,
    programs: &Programs,
) -> Result<PathBuf> {
    if file_exists(out_file) {
        return Ok(out_file.to_path_buf());
    }
    info!("Selecting {} from {}", sample, in_file.display());
    let output_type = if crate::core::fs::is_bgzipped(out_file) {
        "z"
    } else {
        "v"
    };
    with_transaction(out_file, |tx| {
        run_program(
            &programs.bcftools,
            [
                OsStr::new("view"),
                OsStr::new("-O"),
                OsStr::new(output_type),
                OsStr::new("-s"),
                OsStr::new(sample),
                OsStr::new("-o"),
                tx.as_os_str(),
                in_file.as_os_str(),
            ],
            &format!("Select sample {}", sample),
        )
    })
    .with_context(|| format!("Failed to select {} from {}", sample, in_file.display()))?;
    Ok(out_file.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::split::{Batch, Metadata};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample(name: &str, batch: Option<Batch>, phenotype: Option<&str>) -> Item {
        Item::new()
            .with_field("name", name)
            .with_file(WORK_BAM_KEY, format!("{}.bam", name))
            .with_metadata(Metadata {
                batch,
                phenotype: phenotype.map(str::to_string),
                ..Metadata::default()
            })
    }

    fn part(item: Item, region: &str) -> TaskArgs {
        let out = format!(
            "calls/{}-{}.vcf",
            item.sample_name().unwrap_or("x"),
            region
        );
        vec![
            TaskArg::Item(item),
            TaskArg::Value(json!(region)),
            TaskArg::Path(PathBuf::from(out)),
        ]
    }

    fn one(batch: &str) -> Option<Batch> {
        Some(Batch::One(batch.to_string()))
    }

    #[test]
    fn batched_parts_are_grouped_per_region() {
        let parts = vec![
            part(sample("S1", one("b1"), None), "chr1"),
            part(sample("S2", one("b1"), None), "chr1"),
            part(sample("S3", None, None), "chr1"),
            part(sample("S1", one("b1"), None), "chr2"),
        ];
        let (grouped, info) = group_batches(parts).unwrap();

        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0][0].as_item().unwrap().sample_name(), Some("S3"));

        let group = grouped[1][0].as_item().unwrap();
        assert_eq!(group.group.as_deref(), Some("calls/S1-chr1-b1.vcf"));
        assert_eq!(grouped[1][2], TaskArg::Path(PathBuf::from("calls/S1-chr1-b1.vcf")));
        assert_eq!(group.field(WORK_BAMS_FIELD), Some(&json!(["S1.bam", "S2.bam"])));
        assert_eq!(info["calls/S1-chr1-b1.vcf"].len(), 2);
        assert_eq!(
            info["calls/S1-chr1-b1.vcf"][1].out,
            Some(PathBuf::from("calls/S2-chr1.vcf"))
        );
        assert_eq!(info["calls/S1-chr2-b1.vcf"].len(), 1);
    }

    #[test]
    fn callers_and_multiple_batches_separate_groups() {
        let freebayes = sample("S2", one("b1"), None)
            .with_field("config", json!({"algorithm": {"variantcaller": "freebayes"}}));
        let both = sample(
            "S3",
            Some(Batch::Many(vec!["b1".to_string(), "b2".to_string()])),
            None,
        );
        let parts = vec![
            part(sample("S1", one("b1"), None), "chr1"),
            part(freebayes, "chr1"),
            part(both, "chr1"),
        ];
        let (grouped, info) = group_batches(parts).unwrap();

        // (b1, gatk), (b1, freebayes), (b2, gatk)
        assert_eq!(grouped.len(), 3);
        assert_eq!(info["calls/S1-chr1-b1.vcf"].len(), 2);
        assert_eq!(info["calls/S2-chr1-b1.vcf"].len(), 1);
        assert_eq!(info["calls/S3-chr1-b2.vcf"].len(), 1);
    }

    #[test]
    fn malformed_parts_are_rejected() {
        let bad = vec![vec![TaskArg::Value(json!("chr1"))]];
        assert!(group_batches(bad).is_err());
    }

    fn grouped_result(vrn_file: &Path, members: Vec<(Item, PathBuf)>, phenotype: Option<&str>) -> Item {
        let mut item = sample("group", one("b1"), phenotype).with_file(VRN_FILE_KEY, vrn_file);
        item.group_orig = members
            .into_iter()
            .map(|(item, out)| GroupMember {
                item,
                out: Some(out),
            })
            .collect();
        item
    }

    #[cfg(unix)]
    #[test]
    fn single_sample_results_are_linked_per_member() {
        let dir = tempdir().unwrap();
        let joint = dir.path().join("joint.vcf");
        std::fs::write(
            &joint,
            "##fileformat=VCFv4.1\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n",
        )
        .unwrap();
        let s1_out = dir.path().join("S1-chr1.vcf");
        let item = grouped_result(
            &joint,
            vec![(sample("S1", one("b1"), None), s1_out.clone())],
            None,
        );

        let out = split_variants_by_sample(&item, &Programs::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file(VRN_FILE_KEY), Some(s1_out.as_path()));
        assert!(s1_out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn tumor_receives_joint_calls_and_normal_loses_its_file() {
        let dir = tempdir().unwrap();
        let joint = dir.path().join("paired.vcf");
        std::fs::write(&joint, "##fileformat=VCFv4.1\n").unwrap();
        let tumor_out = dir.path().join("T.vcf");
        let normal = sample("N", one("b1"), Some("normal")).with_file(VRN_FILE_KEY, "stale.vcf");
        let item = grouped_result(
            &joint,
            vec![
                (sample("T", one("b1"), Some("tumor")), tumor_out.clone()),
                (normal, dir.path().join("N.vcf")),
            ],
            Some("tumor"),
        );

        let out = split_variants_by_sample(&item, &Programs::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].file(VRN_FILE_KEY), Some(tumor_out.as_path()));
        assert!(tumor_out.exists());
        assert_eq!(out[1].file(VRN_FILE_KEY), None);
    }

    #[test]
    fn lone_normal_is_returned_without_calls() {
        let normal = sample("N", one("b1"), Some("normal")).with_file(VRN_FILE_KEY, "N.vcf");
        let item = grouped_result(
            Path::new("joint.vcf"),
            vec![(normal, PathBuf::from("N-chr1.vcf"))],
            Some("normal"),
        );
        let out = split_variants_by_sample(&item, &Programs::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].sample_name(), Some("N"));
        assert!(out[0].file(VRN_FILE_KEY).is_none());
    }

    #[test]
    fn paired_group_without_tumor_is_an_error() {
        let item = grouped_result(
            Path::new("joint.vcf"),
            vec![
                (sample("N1", one("b1"), Some("normal")), PathBuf::from("N1.vcf")),
                (sample("N2", one("b1"), Some("normal")), PathBuf::from("N2.vcf")),
            ],
            Some("normal"),
        );
        let err = split_variants_by_sample(&item, &Programs::default()).unwrap_err();
        assert!(err.to_string().contains("tumor"));
    }
}
