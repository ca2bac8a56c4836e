use anyhow::Result;
use lazy_static::lazy_static;
use log::debug;
use std::path::{Path, PathBuf};
use varsplit_lib::config::{load_config, PipelineConfig};
use varsplit_lib::utils;

lazy_static! {
    /// Default worker count shown in `--help`: every available core.
    pub static ref DEFAULT_CORES_STR: String = num_cpus::get().to_string();
}

/// Ensure an output path ends with a gzip-compatible extension.
///
/// If the provided path doesn't already end with `.gz`, `.gzip`, or `.bgzf`,
/// a `.gz` suffix is appended to the filename while preserving the original
/// parent directory.
pub fn ensure_gz_path(path: &Path) -> PathBuf {
    if utils::is_bgzipped(path) {
        return path.to_path_buf();
    }

    let mut adjusted = path.to_path_buf();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        adjusted.set_file_name(format!("{}.gz", name));
    } else {
        adjusted.set_extension("gz");
    }
    adjusted
}

/// Load the pipeline configuration when a file is given, defaults otherwise.
pub fn resolve_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            load_config(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}
