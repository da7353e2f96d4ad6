//! Hash sidecar — per-file record of the origin digest and the zip digest.
//!
//! Persisted next to each zip as `<name>.hash`, one line, exactly
//! `<originalHashHex>;<compressedHashHex>` with no trailing delimiter.
//! Writes go through [`Filesystem::write`], which replaces the file
//! atomically.

use std::path::{Path, PathBuf};

use datasync_core::Filesystem;

use crate::digest::ContentHash;
use crate::error::{io_err, ArchiveError};

/// Extension appended to a source file name to form its zip name.
pub const ZIP_EXT: &str = ".zip";
/// Extension appended to a source file name to form its sidecar name.
pub const HASH_EXT: &str = ".hash";

/// Digest pair stored in a sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub original: ContentHash,
    pub compressed: ContentHash,
}

/// Locations of the archive entry for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub zip_path: PathBuf,
    pub sidecar_path: PathBuf,
    /// Source path relative to the origin root.
    pub original_relative_path: PathBuf,
}

impl ArchiveEntry {
    /// Entry for `relative` (a file path under the origin root) inside
    /// `archive_root`.
    pub fn for_source(archive_root: &Path, relative: &Path) -> Self {
        let mirrored = archive_root.join(relative);
        Self {
            zip_path: with_suffix(&mirrored, ZIP_EXT),
            sidecar_path: with_suffix(&mirrored, HASH_EXT),
            original_relative_path: relative.to_path_buf(),
        }
    }
}

/// `path` with `suffix` appended to its final component (`a.txt` → `a.txt.zip`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// Parse sidecar text. `None` when it is not exactly two non-empty fields.
pub fn parse(text: &str) -> Option<HashRecord> {
    let text = text.trim_end_matches(['\r', '\n']);
    let mut fields = text.split(';');
    let original = fields.next()?;
    let compressed = fields.next()?;
    if fields.next().is_some() || original.is_empty() || compressed.is_empty() {
        return None;
    }
    Some(HashRecord {
        original: ContentHash::from(original),
        compressed: ContentHash::from(compressed),
    })
}

/// Render a record in the on-disk format.
pub fn render(record: &HashRecord) -> String {
    format!("{};{}", record.original, record.compressed)
}

/// Read the sidecar at `path`.
///
/// Returns `Ok(None)` when the file is missing or malformed; both mean
/// "recompress" to the caller.
pub fn load<F: Filesystem + ?Sized>(fs: &F, path: &Path) -> Result<Option<HashRecord>, ArchiveError> {
    match fs.stat(path).map_err(|e| io_err(path, e))? {
        Some(entry) if entry.kind.is_file() => {}
        _ => return Ok(None),
    }
    let bytes = fs.read(path).map_err(|e| io_err(path, e))?;
    let record = std::str::from_utf8(&bytes).ok().and_then(parse);
    if record.is_none() {
        tracing::warn!("malformed sidecar: {}", path.display());
    }
    Ok(record)
}

/// Write `record` to `path`, replacing any previous content.
pub fn save<F: Filesystem + ?Sized>(fs: &F, path: &Path, record: &HashRecord) -> Result<(), ArchiveError> {
    fs.write(path, render(record).as_bytes())
        .map_err(|e| io_err(path, e))
}
