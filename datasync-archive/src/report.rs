//! CSV inventory of the archive.
//!
//! ```text
//! originalFileHash,compressedFileHash,compressedFilePath
//! 62cd…5ffa,b066…cbc6,/abs/archive/data/a.txt.zip
//! ```
//!
//! One row per sidecar found under the archive root. Row order follows the
//! sorted directory walk but is not part of the contract. Hashes are hex and
//! archive paths rarely contain commas; the `csv` writer quotes a field only
//! when it has to. The file is rewritten from scratch on every call.

use std::path::Path;

use datasync_core::Filesystem;

use crate::error::{io_err, ArchiveError};
use crate::sidecar::{self, with_suffix, HASH_EXT, ZIP_EXT};

/// Header row of the report.
pub const HEADER: [&str; 3] = ["originalFileHash", "compressedFileHash", "compressedFilePath"];

/// Write the report for `archive_root` to `output`.
///
/// Returns the number of data rows written. A missing archive root produces a
/// header-only report.
pub fn create_report<F: Filesystem + ?Sized>(
    fs: &F,
    archive_root: &Path,
    output: &Path,
) -> Result<usize, ArchiveError> {
    let csv_err = |source: csv::Error| ArchiveError::Report {
        path: output.to_path_buf(),
        source,
    };

    let archive_root = std::path::absolute(archive_root).map_err(|e| io_err(archive_root, e))?;
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(csv_err)?;

    let mut rows = 0;
    let root_exists = fs
        .stat(&archive_root)
        .map_err(|e| io_err(&archive_root, e))?
        .is_some_and(|e| e.kind.is_dir());
    if root_exists {
        scan_dir(fs, &archive_root, &mut |record: [String; 3]| -> Result<(), ArchiveError> {
            writer.write_record(&record).map_err(csv_err)?;
            rows += 1;
            Ok(())
        })?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| io_err(output, std::io::Error::other(e.to_string())))?;
    fs.write(output, &bytes).map_err(|e| io_err(output, e))?;
    tracing::info!("report written to {} ({rows} entries)", output.display());
    Ok(rows)
}

fn scan_dir<F, W>(fs: &F, dir: &Path, emit: &mut W) -> Result<(), ArchiveError>
where
    F: Filesystem + ?Sized,
    W: FnMut([String; 3]) -> Result<(), ArchiveError>,
{
    let entries = fs.list(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let path = dir.join(&entry.name);
        if entry.kind.is_dir() {
            scan_dir(fs, &path, emit)?;
            continue;
        }
        let Some(stem) = entry.name.strip_suffix(HASH_EXT) else {
            continue;
        };

        let zip_path = with_suffix(&dir.join(stem), ZIP_EXT);
        let (original, compressed) = match sidecar::load(fs, &path)? {
            Some(record) => (record.original.0, record.compressed.0),
            None => (String::new(), String::new()),
        };
        emit([original, compressed, zip_path.to_string_lossy().into_owned()])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasync_core::OsFs;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn header_only_for_missing_archive() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("report.csv");
        let rows = create_report(&OsFs, &tmp.path().join("none"), &out).unwrap();
        assert_eq!(rows, 0);
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "originalFileHash,compressedFileHash,compressedFilePath\n"
        );
    }

    #[test]
    fn one_row_per_sidecar_with_absolute_zip_path() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        fs::create_dir_all(archive.join("sub")).unwrap();
        fs::write(archive.join("a.txt.hash"), "aa;bb").unwrap();
        fs::write(archive.join("a.txt.zip"), "z").unwrap();
        fs::write(archive.join("sub").join("b.bin.hash"), "cc;dd").unwrap();
        fs::write(archive.join("sub").join("b.bin.zip"), "z").unwrap();

        let out = tmp.path().join("report.csv");
        assert_eq!(create_report(&OsFs, &archive, &out).unwrap(), 2);

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let first = format!("aa,bb,{}", archive.join("a.txt.zip").display());
        let second = format!("cc,dd,{}", archive.join("sub").join("b.bin.zip").display());
        assert!(lines.contains(&first.as_str()), "lines: {lines:?}");
        assert!(lines.contains(&second.as_str()), "lines: {lines:?}");
    }

    #[test]
    fn report_is_truncated_not_appended() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        fs::create_dir_all(&archive).unwrap();
        let out = tmp.path().join("report.csv");
        fs::write(&out, "stale line\n".repeat(50)).unwrap();

        create_report(&OsFs, &archive, &out).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(!text.contains("stale"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn malformed_sidecar_still_counts() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("archive");
        fs::create_dir_all(&archive).unwrap();
        fs::write(archive.join("x.hash"), "broken").unwrap();

        let out = tmp.path().join("report.csv");
        assert_eq!(create_report(&OsFs, &archive, &out).unwrap(), 1);
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with(",,"));
    }
}
