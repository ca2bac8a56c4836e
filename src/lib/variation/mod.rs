//! Variant-calling glue built on the split/combine engine.
//!
//! - [`vcf`]: header inspection, sample exclusion, tumor/normal pairing and
//!   bgzip/tabix preparation
//! - [`multi`]: batch grouping and per-sample splitting of joint calls
//! - [`combine`]: region-parallel merging of VCF files
//! - [`tasks`]: named task functions for a [`TaskRegistry`](crate::engine::TaskRegistry)

pub mod combine;
pub mod multi;
pub mod tasks;
pub mod vcf;

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::engine::split::Item;

pub use combine::parallel_combine_variants;
pub use multi::{group_batches, split_variants_by_sample};
pub use tasks::{register_variant_tasks, variant_registry};
pub use vcf::{exclude_samples, sample_names};

/// Configuration an item carries under `config`, or defaults when absent.
pub fn item_config(item: &Item) -> Result<PipelineConfig> {
    match item.field("config") {
        Some(value) => PipelineConfig::from_value(value),
        None => Ok(PipelineConfig::default()),
    }
}
