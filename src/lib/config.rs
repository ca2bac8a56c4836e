//! Pipeline configuration.
//!
//! The configuration travels with every item (under the `config` field) and
//! into task argument lists as a JSON value, so it is kept serde-friendly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::core::io::get_reader;

/// Default variant caller used when a sample does not name one.
pub const DEFAULT_VARIANT_CALLER: &str = "gatk";

/// Locations of external tools used by the variant task functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Programs {
    pub bcftools: String,
    pub bgzip: String,
    pub tabix: String,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            bcftools: "bcftools".to_string(),
            bgzip: "bgzip".to_string(),
            tabix: "tabix".to_string(),
        }
    }
}

/// Per-run algorithm settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Algorithm {
    pub variantcaller: Option<String>,
    pub variant_regions: Option<PathBuf>,
    /// Panel of normals for tumor-only calling.
    pub background: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub programs: Programs,
    pub algorithm: Algorithm,
    pub cores: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            programs: Programs::default(),
            algorithm: Algorithm::default(),
            cores: 1,
        }
    }
}

impl PipelineConfig {
    pub fn variant_caller(&self) -> &str {
        self.algorithm
            .variantcaller
            .as_deref()
            .unwrap_or(DEFAULT_VARIANT_CALLER)
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).context("Failed to serialize pipeline configuration")
    }

    /// Decode a configuration carried as a task argument or item field.
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).context("Invalid pipeline configuration value")
    }
}

/// Load a JSON configuration file, falling back to defaults for absent keys.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let reader = get_reader(path)?;
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse configuration {}", path.display()))
}
