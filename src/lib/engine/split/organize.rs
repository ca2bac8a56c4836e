//! Re-key processed parts by their combined output.

use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use std::path::PathBuf;

use super::error::{Result, SplitError};
use super::types::{CombineArgKeys, CombineInfo, CombineMap, Item, TaskArg, TaskArgs};

struct Bucket {
    members: Vec<PathBuf>,
    extra_args: Vec<Vec<Value>>,
    representative: Item,
}

/// Fold `data` into `base`'s pending combination.
///
/// Both must target the same combined output under `base`'s combine key;
/// `data`'s file for that key is appended to `base`'s extras.
pub(crate) fn add_combine_parts(base: &mut Item, data: &Item) -> Result<()> {
    let key = base.combine_key()?.to_string();
    let data_out = data
        .combine
        .get(&key)
        .map(|info| info.out.clone())
        .ok_or_else(|| {
            SplitError::contract(format!("merged item has no combine information for '{}'", key))
        })?;
    let file = data
        .file(&key)
        .ok_or_else(|| SplitError::contract(format!("merged item has no '{}' file", key)))?
        .to_path_buf();

    let info = base
        .combine
        .get_mut(&key)
        .ok_or_else(|| SplitError::contract(format!("base item lost combine key '{}'", key)))?;
    if info.out != data_out {
        return Err(SplitError::contract(format!(
            "cannot merge items combining into {:?} and {:?}",
            info.out, data_out
        )));
    }
    info.extras.push(file);
    Ok(())
}

/// Group processed results by combined output.
///
/// Returns the argument lists for the combine task, one per combined output
/// as `[member paths, combined path, extra args...]`, and the pass-through
/// items: one representative per combined output in first-seen order,
/// followed by results that could not be merged.
pub fn organize(
    results: Vec<Item>,
    combine_map: &CombineMap,
    file_key: &str,
    arg_keys: &CombineArgKeys,
) -> Result<(Vec<TaskArgs>, Vec<Vec<Item>>)> {
    let mut buckets: IndexMap<PathBuf, Bucket> = IndexMap::new();
    let mut extras = Vec::new();

    for mut data in results {
        let cur_file = match data.file(file_key) {
            Some(path) => path.to_path_buf(),
            None => {
                extras.push(vec![data]);
                continue;
            }
        };
        let cur_out = combine_map
            .get(&cur_file)
            .cloned()
            .ok_or_else(|| SplitError::UnmappedOutput(cur_file.clone()))?;
        let values = arg_keys
            .keys()
            .iter()
            .map(|key| {
                data.arg_value(key).ok_or_else(|| {
                    SplitError::contract(format!(
                        "result for {:?} lacks combine argument '{}'",
                        cur_file, key
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(bucket) = buckets.get_mut(&cur_out) {
            bucket.members.push(cur_file);
            bucket.extra_args.push(values);
            if data.has_combine() {
                add_combine_parts(&mut bucket.representative, &data)?;
            } else {
                data.set_file(file_key, cur_out);
                extras.push(vec![data]);
            }
        } else {
            data.set_file(file_key, cur_out.clone());
            buckets.insert(
                cur_out,
                Bucket {
                    members: vec![cur_file],
                    extra_args: vec![values],
                    representative: data,
                },
            );
        }
    }

    debug!(
        "Organized results into {} combined outputs with {} unmerged extras",
        buckets.len(),
        extras.len()
    );

    let mut combine_args = Vec::with_capacity(buckets.len());
    let mut passthrough = Vec::with_capacity(buckets.len() + extras.len());
    for (out, bucket) in buckets {
        let mut args = vec![TaskArg::Paths(bucket.members), TaskArg::Path(out)];
        args.extend(collapse_extra_args(&bucket.extra_args, arg_keys));
        combine_args.push(args);
        passthrough.push(vec![bucket.representative]);
    }
    passthrough.extend(extras);
    Ok((combine_args, passthrough))
}

/// Per-key values across a bucket: single-valued keys keep the last value,
/// the rest become a list parallel to the members.
fn collapse_extra_args(extra_args: &[Vec<Value>], arg_keys: &CombineArgKeys) -> Vec<TaskArg> {
    arg_keys
        .keys()
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let mut values = extra_args.iter().map(|xs| xs[i].clone());
            if arg_keys.is_single(key) {
                TaskArg::Value(values.last().unwrap_or(Value::Null))
            } else {
                TaskArg::Value(Value::Array(values.collect()))
            }
        })
        .collect()
}

/// Record where each processed result should eventually be combined without
/// running a combine step now.
pub fn add_combine_info(
    results: Vec<Item>,
    combine_map: &CombineMap,
    file_key: &str,
) -> Result<Vec<Vec<Item>>> {
    results
        .into_iter()
        .map(|mut data| {
            let cur_file = data.file(file_key).map(|p| p.to_path_buf()).ok_or_else(|| {
                SplitError::contract(format!("processed result has no '{}' file", file_key))
            })?;
            let out = combine_map
                .get(&cur_file)
                .cloned()
                .ok_or(SplitError::UnmappedOutput(cur_file))?;
            data.combine.insert(file_key.to_string(), CombineInfo::new(out));
            Ok(vec![data])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn region_result(sample: &str, region: &str) -> Item {
        Item::new()
            .with_file("vrn_file", format!("{}-{}.vcf", sample, region))
            .with_file("sam_ref", "hg19.fa")
            .with_field("region", region)
            .with_field("config", json!({"cores": 1}))
            .with_field("name", sample)
    }

    fn map_for(results: &[Item], out: &str) -> CombineMap {
        results
            .iter()
            .map(|x| (x.file("vrn_file").unwrap().to_path_buf(), PathBuf::from(out)))
            .collect()
    }

    #[test]
    fn one_combine_call_per_output_with_collapsed_arguments() {
        let results: Vec<Item> = ["chr1", "chr2", "chr3"]
            .iter()
            .map(|r| region_result("S1", r))
            .collect();
        let combine_map = map_for(&results, "S1.vcf");
        let keys = CombineArgKeys::reference_and_config(["region", "sam_ref", "config"]);

        let (combine_args, passthrough) =
            organize(results, &combine_map, "vrn_file", &keys).unwrap();

        assert_eq!(combine_args.len(), 1);
        let args = &combine_args[0];
        assert_eq!(
            args[0],
            TaskArg::Paths(vec![
                PathBuf::from("S1-chr1.vcf"),
                PathBuf::from("S1-chr2.vcf"),
                PathBuf::from("S1-chr3.vcf")
            ])
        );
        assert_eq!(args[1], TaskArg::Path(PathBuf::from("S1.vcf")));
        assert_eq!(args[2], TaskArg::Value(json!(["chr1", "chr2", "chr3"])));
        assert_eq!(args[3], TaskArg::Value(json!("hg19.fa")));
        assert_eq!(args[4], TaskArg::Value(json!({"cores": 1})));

        // unmergeable followers are carried along with the target rewritten
        assert_eq!(passthrough.len(), 3);
        for xs in &passthrough {
            assert_eq!(xs[0].file("vrn_file"), Some(Path::new("S1.vcf")));
        }
    }

    #[test]
    fn custom_single_keys_replace_the_default_policy() {
        let results = vec![region_result("S1", "chr1"), region_result("S1", "chr2")];
        let combine_map = map_for(&results, "S1.vcf");
        let keys = CombineArgKeys::new(["region", "sam_ref"]).single(["region"]);

        let (combine_args, _) = organize(results, &combine_map, "vrn_file", &keys).unwrap();
        assert_eq!(combine_args[0][2], TaskArg::Value(json!("chr2")));
        assert_eq!(
            combine_args[0][3],
            TaskArg::Value(json!(["hg19.fa", "hg19.fa"]))
        );
    }

    #[test]
    fn followers_with_combine_metadata_fold_into_the_representative() {
        let with_bam = |region: &str| {
            region_result("S1", region)
                .with_file("work_bam", format!("S1-{}.bam", region))
                .with_combine("work_bam", CombineInfo::new("S1.bam"))
        };
        let results = vec![with_bam("chr1"), with_bam("chr2"), with_bam("chr3")];
        let combine_map = map_for(&results, "S1.vcf");

        let (combine_args, passthrough) =
            organize(results, &combine_map, "vrn_file", &CombineArgKeys::default()).unwrap();

        assert_eq!(combine_args.len(), 1);
        assert_eq!(combine_args[0].len(), 2);
        assert_eq!(passthrough.len(), 1);
        let rep = &passthrough[0][0];
        assert_eq!(rep.file("vrn_file"), Some(Path::new("S1.vcf")));
        assert_eq!(
            rep.combine["work_bam"].extras,
            vec![PathBuf::from("S1-chr2.bam"), PathBuf::from("S1-chr3.bam")]
        );
    }

    #[test]
    fn results_without_the_file_key_are_extras() {
        let results = vec![Item::new().with_field("name", "S9"), region_result("S1", "chr1")];
        let combine_map = map_for(&results[1..], "S1.vcf");

        let (combine_args, passthrough) =
            organize(results, &combine_map, "vrn_file", &CombineArgKeys::default()).unwrap();
        assert_eq!(combine_args.len(), 1);
        assert_eq!(passthrough.len(), 2);
        assert_eq!(passthrough[0][0].sample_name(), Some("S1"));
        assert_eq!(passthrough[1][0].sample_name(), Some("S9"));
    }

    #[test]
    fn unmapped_output_is_an_error() {
        let err = organize(
            vec![region_result("S1", "chr1")],
            &CombineMap::default(),
            "vrn_file",
            &CombineArgKeys::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::UnmappedOutput(_)));
    }

    #[test]
    fn missing_combine_argument_is_a_contract_violation() {
        let results = vec![region_result("S1", "chr1")];
        let combine_map = map_for(&results, "S1.vcf");
        let err = organize(
            results,
            &combine_map,
            "vrn_file",
            &CombineArgKeys::new(["not_there"]),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::ContractViolation(_)));
    }

    #[test]
    fn add_combine_info_records_targets_without_combining() {
        let results = vec![region_result("S1", "chr1"), region_result("S1", "chr2")];
        let combine_map = map_for(&results, "S1.vcf");
        let out = add_combine_info(results, &combine_map, "vrn_file").unwrap();
        assert_eq!(out.len(), 2);
        for xs in out {
            let info = &xs[0].combine["vrn_file"];
            assert_eq!(info.out, PathBuf::from("S1.vcf"));
            assert!(info.extras.is_empty());
        }
    }

    #[test]
    fn merging_into_a_different_target_is_rejected() {
        let mut base = Item::new()
            .with_file("work_bam", "a.bam")
            .with_combine("work_bam", CombineInfo::new("x.bam"));
        let other = Item::new()
            .with_file("work_bam", "b.bam")
            .with_combine("work_bam", CombineInfo::new("y.bam"));
        assert!(matches!(
            add_combine_parts(&mut base, &other),
            Err(SplitError::ContractViolation(_))
        ));
    }
}
