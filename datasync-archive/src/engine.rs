//! Incremental compression of the mirror into zip + sidecar pairs.
//!
//! ## Per-file protocol
//!
//! 1. A sidecar path occupied by a directory is removed.
//! 2. Digest the origin file and, if present, the existing zip. A zip path
//!    occupied by a directory is removed and forces recompression.
//! 3. Recompress when the sidecar is missing or malformed, or when either
//!    digest differs from the stored one.
//! 4. Rewrite the sidecar with the current digests, whatever step 3 decided.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use datasync_core::Filesystem;

use crate::digest::{ContentDigest, ContentHash};
use crate::error::{io_err, ArchiveError};
use crate::sidecar::{self, ArchiveEntry, HashRecord};

// ---------------------------------------------------------------------------
// Compress report
// ---------------------------------------------------------------------------

/// Outcome for a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressOutcome {
    /// A fresh zip was written.
    Compressed { zip_path: PathBuf },
    /// The existing zip was current and left untouched.
    Skipped { zip_path: PathBuf },
}

/// Every outcome of one [`ArchiveEngine::compress`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressReport {
    pub outcomes: Vec<CompressOutcome>,
}

impl CompressReport {
    pub fn compressed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CompressOutcome::Compressed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, CompressOutcome::Skipped { .. }))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Zip container
// ---------------------------------------------------------------------------

/// Build a single-entry, deflate-compressed zip holding `contents` under
/// `entry_name`.
pub fn build_zip(entry_name: &str, contents: &[u8]) -> zip::result::ZipResult<Vec<u8>> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(contents.len() as u64 >= u64::from(u32::MAX));
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(entry_name, options)?;
    writer.write_all(contents)?;
    Ok(writer.finish()?.into_inner())
}

// ---------------------------------------------------------------------------
// ArchiveEngine
// ---------------------------------------------------------------------------

/// Keeps one zip + sidecar per origin file under the archive root.
pub struct ArchiveEngine<'a, F: ?Sized> {
    fs: &'a F,
    digest: &'a dyn ContentDigest,
}

impl<'a, F: Filesystem + ?Sized> ArchiveEngine<'a, F> {
    pub fn new(fs: &'a F, digest: &'a dyn ContentDigest) -> Self {
        Self { fs, digest }
    }

    /// Ensure every file under `origin_root` has a current archive entry at
    /// the mirrored path under `archive_root`.
    pub fn compress(
        &self,
        origin_root: &Path,
        archive_root: &Path,
    ) -> Result<CompressReport, ArchiveError> {
        let mut report = CompressReport::default();
        self.compress_dir(origin_root, archive_root, Path::new(""), &mut report)?;
        Ok(report)
    }

    fn compress_dir(
        &self,
        origin_root: &Path,
        archive_root: &Path,
        relative: &Path,
        report: &mut CompressReport,
    ) -> Result<(), ArchiveError> {
        let origin_dir = origin_root.join(relative);
        let entries = self
            .fs
            .list(&origin_dir)
            .map_err(|e| io_err(&origin_dir, e))?;

        for entry in entries {
            let rel = relative.join(&entry.name);
            if entry.kind.is_dir() {
                self.compress_dir(origin_root, archive_root, &rel, report)?;
                continue;
            }
            let target = ArchiveEntry::for_source(archive_root, &rel);
            let origin = origin_root.join(&target.original_relative_path);
            let outcome = self.compress_file(&origin, &target)?;
            report.outcomes.push(outcome);
        }
        Ok(())
    }

    /// Bring the archive entry `target` up to date with `origin`.
    pub fn compress_file(
        &self,
        origin: &Path,
        target: &ArchiveEntry,
    ) -> Result<CompressOutcome, ArchiveError> {
        let fs = self.fs;
        let sidecar_path = &target.sidecar_path;
        let zip_path = &target.zip_path;
        let mut need_to_compress = false;

        // Step 1: sidecar presence / corruption.
        match fs.stat(sidecar_path).map_err(|e| io_err(sidecar_path, e))? {
            None => need_to_compress = true,
            Some(entry) if entry.kind.is_dir() => {
                tracing::warn!("removing corrupt sidecar directory {}", sidecar_path.display());
                fs.remove(sidecar_path).map_err(|e| io_err(sidecar_path, e))?;
                need_to_compress = true;
            }
            Some(_) => {}
        }

        // Step 2: current digests.
        let contents = fs.read(origin).map_err(|e| io_err(origin, e))?;
        let original = self.digest.digest(&contents);
        let existing_zip = match fs.stat(zip_path).map_err(|e| io_err(zip_path, e))? {
            Some(entry) if entry.kind.is_file() => {
                let bytes = fs.read(zip_path).map_err(|e| io_err(zip_path, e))?;
                Some(self.digest.digest(&bytes))
            }
            Some(_) => {
                fs.remove(zip_path).map_err(|e| io_err(zip_path, e))?;
                None
            }
            None => None,
        };

        // Step 3: compare against the stored record.
        match sidecar::load(fs, sidecar_path)? {
            None => need_to_compress = true,
            Some(stored) => {
                if stored.original != original {
                    need_to_compress = true;
                }
                if existing_zip.as_ref() != Some(&stored.compressed) {
                    need_to_compress = true;
                }
            }
        }

        let (compressed, outcome) = match existing_zip {
            Some(hash) if !need_to_compress => {
                tracing::debug!("skipping compress: {}", sidecar_path.display());
                (
                    hash,
                    CompressOutcome::Skipped {
                        zip_path: zip_path.clone(),
                    },
                )
            }
            _ => {
                tracing::info!("compressing: {}", zip_path.display());
                let hash = self.write_zip(origin, zip_path, &contents)?;
                (
                    hash,
                    CompressOutcome::Compressed {
                        zip_path: zip_path.clone(),
                    },
                )
            }
        };

        // Step 4: the sidecar always reflects what is on disk now.
        sidecar::save(
            fs,
            sidecar_path,
            &HashRecord {
                original,
                compressed,
            },
        )?;
        Ok(outcome)
    }

    fn write_zip(
        &self,
        origin: &Path,
        zip_path: &Path,
        contents: &[u8],
    ) -> Result<ContentHash, ArchiveError> {
        let entry_name = origin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = build_zip(&entry_name, contents).map_err(|source| ArchiveError::Zip {
            path: zip_path.to_path_buf(),
            source,
        })?;
        self.fs
            .write(zip_path, &bytes)
            .map_err(|e| io_err(zip_path, e))?;
        Ok(self.digest.digest(&bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
