//! Archive garbage collection.
//!
//! Two passes, both idempotent:
//!
//! - [`prune_dangling`] walks the archive in lock-step with the origin tree
//!   and removes entries that lost their counterpart: a sidecar without a
//!   zip, a zip without a sidecar, a zip whose origin file is gone, and any
//!   file that is neither a zip nor a sidecar.
//! - [`prune_empty_directories`] removes directories left empty, post-order.
//!   The archive root itself is kept.

use std::path::{Path, PathBuf};

use datasync_core::{EntryKind, Filesystem};

use crate::error::{io_err, ArchiveError};
use crate::sidecar::{with_suffix, HASH_EXT, ZIP_EXT};

/// Remove archive entries with no matching origin file.
///
/// Returns every path removed. A missing `archive_root` is treated as empty.
pub fn prune_dangling<F: Filesystem + ?Sized>(
    fs: &F,
    origin_root: &Path,
    archive_root: &Path,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut removed = Vec::new();
    if is_dir(fs, archive_root)? {
        prune_dangling_dir(fs, origin_root, archive_root, &mut removed)?;
    }
    Ok(removed)
}

fn prune_dangling_dir<F: Filesystem + ?Sized>(
    fs: &F,
    origin_dir: &Path,
    archive_dir: &Path,
    removed: &mut Vec<PathBuf>,
) -> Result<(), ArchiveError> {
    let entries = fs.list(archive_dir).map_err(|e| io_err(archive_dir, e))?;
    for entry in entries {
        let path = archive_dir.join(&entry.name);
        if entry.kind.is_dir() {
            prune_dangling_dir(fs, &origin_dir.join(&entry.name), &path, removed)?;
            continue;
        }

        if let Some(stem) = entry.name.strip_suffix(HASH_EXT) {
            if !is_file(fs, &archive_dir.join(format!("{stem}{ZIP_EXT}")))? {
                remove_if_present(fs, &path, removed)?;
            }
        } else if let Some(stem) = entry.name.strip_suffix(ZIP_EXT) {
            let sidecar = with_suffix(&archive_dir.join(stem), HASH_EXT);
            let origin = origin_dir.join(stem);
            if !is_file(fs, &origin)? {
                tracing::info!(
                    "file '{}' not found on origin, removing archive entry",
                    origin.display()
                );
                remove_if_present(fs, &path, removed)?;
                remove_if_present(fs, &sidecar, removed)?;
            } else if !is_file(fs, &sidecar)? {
                tracing::info!("zip without sidecar, removing {}", path.display());
                remove_if_present(fs, &path, removed)?;
            }
        } else {
            tracing::info!("removing unrecognized archive file {}", path.display());
            remove_if_present(fs, &path, removed)?;
        }
    }
    Ok(())
}

/// Remove every directory under `archive_root` that is empty once its own
/// subdirectories have been pruned.
///
/// Returns the directories removed, deepest first.
pub fn prune_empty_directories<F: Filesystem + ?Sized>(
    fs: &F,
    archive_root: &Path,
) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut removed = Vec::new();
    if is_dir(fs, archive_root)? {
        prune_empty_dir(fs, archive_root, true, &mut removed)?;
    }
    Ok(removed)
}

fn prune_empty_dir<F: Filesystem + ?Sized>(
    fs: &F,
    dir: &Path,
    is_root: bool,
    removed: &mut Vec<PathBuf>,
) -> Result<(), ArchiveError> {
    let entries = fs.list(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries.iter().filter(|e| e.kind == EntryKind::Directory) {
        prune_empty_dir(fs, &dir.join(&entry.name), false, removed)?;
    }

    if is_root {
        return Ok(());
    }
    if fs.list(dir).map_err(|e| io_err(dir, e))?.is_empty() {
        tracing::info!("removing empty directory {}", dir.display());
        fs.remove(dir).map_err(|e| io_err(dir, e))?;
        removed.push(dir.to_path_buf());
    }
    Ok(())
}

fn is_file<F: Filesystem + ?Sized>(fs: &F, path: &Path) -> Result<bool, ArchiveError> {
    Ok(fs
        .stat(path)
        .map_err(|e| io_err(path, e))?
        .is_some_and(|e| e.kind.is_file()))
}

fn is_dir<F: Filesystem + ?Sized>(fs: &F, path: &Path) -> Result<bool, ArchiveError> {
    Ok(fs
        .stat(path)
        .map_err(|e| io_err(path, e))?
        .is_some_and(|e| e.kind.is_dir()))
}

fn remove_if_present<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    removed: &mut Vec<PathBuf>,
) -> Result<(), ArchiveError> {
    if fs.stat(path).map_err(|e| io_err(path, e))?.is_none() {
        return Ok(());
    }
    fs.remove(path).map_err(|e| io_err(path, e))?;
    removed.push(path.to_path_buf());
    Ok(())
}
