//! Local filesystem capability.
//!
//! Every stage touches the disk through [`Filesystem`] so the tree walks can
//! be exercised against temp directories or substituted entirely.
//!
//! ## `OsFs::write` protocol
//!
//! 1. Ensure the parent directory exists.
//! 2. Write to a freshly created `.datasync-XXXXXX.tmp` in that directory.
//!    The name is random and created exclusively, so it never reuses a file
//!    that already exists there (mirrored or not).
//! 3. Rename to the final path (atomic on POSIX).
//!
//! An interrupted write therefore never leaves a truncated zip or sidecar
//! under its final name. The temp file is removed on any failure before the
//! rename; stray ones left by a crash are swept by the next run.

use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use filetime::FileTime;

use crate::types::{EntryKind, LocalEntry};

/// Prefix and suffix of in-flight writes made by [`OsFs`].
pub const TMP_PREFIX: &str = ".datasync-";
pub const TMP_SUFFIX: &str = ".tmp";

/// Blocking filesystem operations used by the sync and archive stages.
pub trait Filesystem {
    /// Entries of `dir`, sorted by name.
    fn list(&self, dir: &Path) -> io::Result<Vec<LocalEntry>>;

    /// Metadata of `path`, or `None` when nothing exists there.
    fn stat(&self, path: &Path) -> io::Result<Option<LocalEntry>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or truncate `path` with `contents`.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Remove a file, or a directory with everything beneath it.
    fn remove(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Set both access and modification time of `path` to `at`.
    fn set_modified(&self, path: &Path, at: DateTime<Utc>) -> io::Result<()>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl Filesystem for OsFs {
    fn list(&self, dir: &Path) -> io::Result<Vec<LocalEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(to_entry(
                entry.file_name().to_string_lossy().into_owned(),
                &meta,
            ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<Option<LocalEntry>> {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(Some(to_entry(name, &meta)))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;
        // Dropped (and deleted) on every early return below.
        let mut tmp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .suffix(TMP_SUFFIX)
            .tempfile_in(parent)?;
        tmp.write_all(contents)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let meta = std::fs::symlink_metadata(path)?;
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn set_modified(&self, path: &Path, at: DateTime<Utc>) -> io::Result<()> {
        let ft = FileTime::from_system_time(SystemTime::from(at));
        filetime::set_file_times(path, ft, ft)
    }
}

fn to_entry(name: String, meta: &std::fs::Metadata) -> LocalEntry {
    let kind = if meta.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    let modified_at = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
    LocalEntry {
        name,
        kind,
        size: meta.len(),
        modified_at,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn list_is_sorted_and_typed() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.txt"), b"bb").unwrap();
        std::fs::create_dir(tmp.path().join("a")).unwrap();

        let entries = OsFs.list(tmp.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[1].size, 2);
    }

    #[test]
    fn stat_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(OsFs.stat(&tmp.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn write_creates_parents_and_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x").join("y").join("f.bin");
        OsFs.write(&path, b"data").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        let names: Vec<_> = OsFs
            .list(path.parent().unwrap())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["f.bin"], "tmp file must be renamed away");
    }

    #[test]
    fn write_leaves_tmp_looking_siblings_alone() {
        let tmp = TempDir::new().unwrap();
        let sibling = tmp.path().join("a.datasync.tmp");
        let sibling_dir = tmp.path().join(".datasync-a.tmp");
        OsFs.write(&sibling, b"sibling").unwrap();
        std::fs::create_dir(&sibling_dir).unwrap();

        OsFs.write(&tmp.path().join("a"), b"target").unwrap();
        OsFs.write(&tmp.path().join("a"), b"again").unwrap();

        assert_eq!(std::fs::read(&sibling).unwrap(), b"sibling");
        assert!(sibling_dir.is_dir());
        assert_eq!(std::fs::read(tmp.path().join("a")).unwrap(), b"again");
        assert_eq!(OsFs.list(tmp.path()).unwrap().len(), 3);
    }

    #[test]
    fn failed_write_leaves_no_tmp_behind() {
        let tmp = TempDir::new().unwrap();
        let occupied = tmp.path().join("dir");
        std::fs::create_dir_all(occupied.join("inner")).unwrap();

        assert!(OsFs.write(&occupied, b"x").is_err());
        let names: Vec<_> = OsFs
            .list(tmp.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["dir"]);
    }

    #[test]
    fn write_truncates_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        OsFs.write(&path, b"long content").unwrap();
        OsFs.write(&path, b"short").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn remove_handles_files_and_trees() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("d");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested").join("f"), b"").unwrap();
        let file = tmp.path().join("g");
        std::fs::write(&file, b"").unwrap();

        OsFs.remove(&dir).unwrap();
        OsFs.remove(&file).unwrap();
        assert!(!dir.exists());
        assert!(!file.exists());
    }

    #[test]
    fn set_modified_roundtrips_through_stat() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();
        let at = Utc.with_ymd_and_hms(2020, 5, 17, 8, 30, 0).unwrap();

        OsFs.set_modified(&path, at).unwrap();
        let entry = OsFs.stat(&path).unwrap().expect("exists");
        assert_eq!(entry.modified_at, at);
    }
}
