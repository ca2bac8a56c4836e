//! Joint processing of related samples.
//!
//! A group function merges parts that must run together (a cohort batch, a
//! tumor/normal pair) into one synthetic group item and records the original
//! members. After the parallel pass, results still marked with a group are
//! routed to an ungroup task together with their recorded members.

use indexmap::IndexMap;
use log::debug;
use std::path::PathBuf;

use super::error::{Result, SplitError};
use super::types::{GroupInfo, Item, TaskArg, TaskArgs};

/// Apply a caller-supplied grouping function to split parts.
pub fn group<G>(parts: Vec<TaskArgs>, group_fn: G) -> Result<(Vec<TaskArgs>, GroupInfo)>
where
    G: FnOnce(Vec<TaskArgs>) -> anyhow::Result<(Vec<TaskArgs>, GroupInfo)>,
{
    let n_parts = parts.len();
    let (grouped, info) = group_fn(parts).map_err(SplitError::Group)?;
    debug!(
        "Grouped {} parts into {} work items ({} groups)",
        n_parts,
        grouped.len(),
        info.len()
    );
    Ok((grouped, info))
}

/// Split processed results into those ready for combination and those that
/// still need ungrouping.
///
/// Grouped results get `group_orig` set to the members recorded for their
/// group and are wrapped as single-item argument lists for the ungroup task.
pub fn check_group_status(
    results: Vec<Item>,
    group_info: &GroupInfo,
) -> Result<(Vec<Item>, Vec<TaskArgs>)> {
    let mut ready = Vec::new();
    let mut grouped = Vec::new();
    for mut x in results {
        match x.group.clone() {
            Some(group) => {
                let members = group_info.get(&group).ok_or_else(|| {
                    SplitError::contract(format!("result references unknown group '{}'", group))
                })?;
                x.group_orig = members.clone();
                grouped.push(vec![TaskArg::Item(x)]);
            }
            None => ready.push(x),
        }
    }
    Ok((ready, grouped))
}

/// Merge combination details for items that were split but never processed.
///
/// Items are bucketed by their pending combined output; the first item of each
/// bucket collects every member's file (its own included) into its extras.
pub fn group_combine_parts(items: Vec<Item>) -> Result<Vec<Vec<Item>>> {
    let file_key = match items.first() {
        Some(first) => first.combine_key()?.to_string(),
        None => return Ok(Vec::new()),
    };

    let mut by_out: IndexMap<PathBuf, Vec<Item>> = IndexMap::new();
    for x in items {
        let out = x
            .combine
            .get(&file_key)
            .map(|info| info.out.clone())
            .ok_or_else(|| {
                SplitError::contract(format!("item has no combine information for '{}'", file_key))
            })?;
        by_out.entry(out).or_default().push(x);
    }

    by_out
        .into_values()
        .map(|members| {
            let files = members
                .iter()
                .map(|m| {
                    m.file(&file_key).map(|p| p.to_path_buf()).ok_or_else(|| {
                        SplitError::contract(format!("item has no '{}' file", file_key))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let mut base = members
                .into_iter()
                .next()
                .ok_or_else(|| SplitError::contract("empty combine bucket"))?;
            if let Some(info) = base.combine.get_mut(&file_key) {
                info.extras.extend(files);
            }
            Ok(vec![base])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::split::types::{CombineInfo, GroupMember};
    use proptest::prelude::*;
    use std::path::Path;

    fn member(name: &str) -> GroupMember {
        GroupMember {
            item: Item::new().with_field("name", name),
            out: Some(PathBuf::from(format!("{}-chr1.vcf", name))),
        }
    }

    fn group_info() -> GroupInfo {
        let mut info = GroupInfo::default();
        info.insert("b1.vcf".to_string(), vec![member("S1"), member("S2")]);
        info.insert("b2.vcf".to_string(), vec![member("S3")]);
        info
    }

    fn group_result(group: &str) -> Item {
        let mut item = Item::new().with_file("vrn_file", group);
        item.group = Some(group.to_string());
        item
    }

    #[test]
    fn grouped_results_carry_their_original_members() {
        let info = group_info();
        let results = vec![
            group_result("b2.vcf"),
            Item::new().with_field("name", "S4"),
            group_result("b1.vcf"),
        ];
        let (ready, grouped) = check_group_status(results, &info).unwrap();

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].sample_name(), Some("S4"));
        assert_eq!(grouped.len(), 2);
        for args in &grouped {
            assert_eq!(args.len(), 1);
            let item = args[0].as_item().unwrap();
            assert_eq!(&item.group_orig, &info[item.group.as_deref().unwrap()]);
        }
    }

    #[test]
    fn unknown_group_is_a_contract_violation() {
        let err = check_group_status(vec![group_result("b9.vcf")], &group_info()).unwrap_err();
        assert!(matches!(err, SplitError::ContractViolation(_)));
    }

    #[test]
    fn group_function_errors_propagate() {
        let err = group(vec![], |_| Err(anyhow::anyhow!("no caller configured"))).unwrap_err();
        assert!(matches!(err, SplitError::Group(_)));
    }

    #[test]
    fn combine_parts_are_merged_per_output() {
        let part = |bam: &str, out: &str| {
            Item::new()
                .with_file("work_bam", bam)
                .with_combine("work_bam", CombineInfo::new(out))
        };
        let out = group_combine_parts(vec![
            part("S1-chr1.bam", "S1.bam"),
            part("S2-chr1.bam", "S2.bam"),
            part("S1-chr2.bam", "S1.bam"),
        ])
        .unwrap();

        assert_eq!(out.len(), 2);
        let s1 = &out[0][0];
        assert_eq!(s1.file("work_bam"), Some(Path::new("S1-chr1.bam")));
        assert_eq!(
            s1.combine["work_bam"].extras,
            vec![PathBuf::from("S1-chr1.bam"), PathBuf::from("S1-chr2.bam")]
        );
        assert_eq!(out[1][0].combine["work_bam"].extras.len(), 1);
        assert!(group_combine_parts(vec![]).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn group_orig_is_independent_of_return_order(
            order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let mut info = GroupInfo::default();
            let groups: Vec<String> = (0..6).map(|i| format!("batch{}.vcf", i)).collect();
            for (i, g) in groups.iter().enumerate() {
                info.insert(g.clone(), (0..=i).map(|j| member(&format!("S{}-{}", i, j))).collect());
            }
            let results: Vec<Item> = order.iter().map(|&i| group_result(&groups[i])).collect();

            let (ready, grouped) = check_group_status(results, &info).unwrap();
            prop_assert!(ready.is_empty());
            prop_assert_eq!(grouped.len(), 6);
            for args in grouped {
                let item = args[0].as_item().unwrap();
                let recorded = &info[item.group.as_deref().unwrap()];
                prop_assert_eq!(&item.group_orig, recorded);
            }
        }
    }
}
