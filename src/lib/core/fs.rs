use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions that travel with a data file when it is linked elsewhere.
const INDEX_EXTENSIONS: &[&str] = &[".tbi", ".csi", ".bai", ".idx"];

/// Create parent directories for a path when missing.
pub fn make_parent_dirs<P: AsRef<Path>>(path: P) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Detect whether a path uses a BGZF-compatible extension.
pub fn is_bgzipped<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().unwrap_or_else(|| OsStr::new("")),
        ext if ext == "gz" || ext == "gzip" || ext == "bgzf"
    )
}

/// A file counts as present only when it exists and is non-empty.
///
/// Task functions use this to skip work that already completed.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path.as_ref())
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Split a path into `(stem, extension)`, keeping compression suffixes with
/// the extension: `a/b.vcf.gz` becomes `("a/b", ".vcf.gz")`.
pub fn splitext_plus<P: AsRef<Path>>(path: P) -> (String, String) {
    let full = path.as_ref().to_string_lossy().into_owned();
    let split_one = |s: &str| -> (String, String) {
        let name_start = s.rfind('/').map(|i| i + 1).unwrap_or(0);
        match s[name_start..].rfind('.') {
            Some(dot) if dot > 0 => {
                let idx = name_start + dot;
                (s[..idx].to_string(), s[idx..].to_string())
            }
            _ => (s.to_string(), String::new()),
        }
    };
    let (base, ext) = split_one(&full);
    if matches!(ext.as_str(), ".gz" | ".bz2" | ".zip" | ".bgzf") {
        let (inner_base, inner_ext) = split_one(&base);
        (inner_base, format!("{}{}", inner_ext, ext))
    } else {
        (base, ext)
    }
}

/// Insert `stem` between a file's base name and its (compound) extension.
pub fn append_stem<P: AsRef<Path>>(path: P, stem: &str) -> PathBuf {
    let (base, ext) = splitext_plus(path);
    PathBuf::from(format!("{}{}{}", base, stem, ext))
}

/// Produce `out` through a temporary path next to it, moving the result into
/// place only when `f` succeeds. Partial outputs never appear under the final
/// name.
///
/// Each call gets its own hidden directory beside `out`, so concurrent
/// writers of the same output never share a temporary file. The path handed
/// to `f` keeps the output's file name, which tools that key on extensions
/// rely on.
pub fn with_transaction<P, F>(out: P, f: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&Path) -> Result<()>,
{
    let out = out.as_ref();
    make_parent_dirs(out)?;
    let parent = match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = out
        .file_name()
        .with_context(|| format!("{} has no file name", out.display()))?;
    let tx_dir = tempfile::Builder::new()
        .prefix(".tx-")
        .tempdir_in(parent)
        .with_context(|| format!("Failed to create a transaction directory in {}", parent.display()))?;
    let tx = tx_dir.path().join(name);
    f(&tx)?;
    fs::rename(&tx, out).with_context(|| format!("Failed to move {} into place", out.display()))
}

/// Symlink `src` to `dest` together with any sibling index files.
///
/// Existing destinations are left untouched.
pub fn symlink_plus<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dest: Q) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    make_parent_dirs(dest)?;
    let src_abs = fs::canonicalize(src)
        .with_context(|| format!("Cannot resolve link source {}", src.display()))?;
    link_if_missing(&src_abs, dest)?;
    for ext in INDEX_EXTENSIONS {
        let src_index = PathBuf::from(format!("{}{}", src_abs.display(), ext));
        if src_index.exists() {
            let dest_index = PathBuf::from(format!("{}{}", dest.display(), ext));
            link_if_missing(&src_index, &dest_index)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn link_if_missing(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() || fs::symlink_metadata(dest).is_ok() {
        return Ok(());
    }
    std::os::unix::fs::symlink(src, dest)
        .with_context(|| format!("Failed to link {} -> {}", dest.display(), src.display()))
}

#[cfg(not(unix))]
fn link_if_missing(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Ok(());
    }
    fs::copy(src, dest)
        .map(|_| ())
        .with_context(|| format!("Failed to copy {} -> {}", src.display(), dest.display()))
}
