use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::fs::{is_bgzipped, make_parent_dirs};

/// Open a plain or (b)gzipped text file for line-oriented reading.
///
/// BGZF files are concatenated gzip members, so the multi-member decoder is
/// used for anything with a compressed extension.
pub fn get_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if is_bgzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Create a buffered writer, creating parent directories as needed.
pub fn get_writer<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    make_parent_dirs(path)?;
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write `contents` to `path` through [`get_writer`].
pub fn write_text<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    let mut writer = get_writer(path)?;
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    #[test]
    fn reads_gzipped_and_plain_text() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("a.txt");
        write_text(&plain, "one\ntwo\n").unwrap();

        let gz = dir.path().join("a.txt.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"one\ntwo\n").unwrap();
        encoder.finish().unwrap();

        for path in [&plain, &gz] {
            let lines: Vec<String> = get_reader(path).unwrap().lines().map(|l| l.unwrap()).collect();
            assert_eq!(lines, vec!["one", "two"]);
        }
    }

    #[test]
    fn writer_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("x").join("y").join("z.txt");
        write_text(&nested, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(nested).unwrap(), "hello");
    }
}
