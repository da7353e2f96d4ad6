//! Remote → local tree reconciliation.
//!
//! ## Per-directory protocol
//!
//! 1. List the remote directory. A listing failure aborts the whole sync.
//! 2. Deletion pass: every local entry whose (name, kind) pair is absent from
//!    that listing is removed, directories recursively. Skipped when the local
//!    directory does not exist yet.
//! 3. Ensure the local directory exists.
//! 4. Traversal pass over the same listing snapshot: recurse into
//!    directories; download files whose size or mtime differ from the local
//!    copy, then stamp the local mtime with the remote one.
//!
//! Content equality is approximated by `(size, mtime)`; file contents are
//! never compared.

use std::path::{Path, PathBuf};

use datasync_core::{
    join_remote, normalize_remote, EntryKind, Filesystem, LocalEntry, RemoteEntry, RemoteSession,
};

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// Sync report
// ---------------------------------------------------------------------------

/// One decision taken while mirroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// File was new or changed and has been downloaded.
    Downloaded { path: PathBuf, bytes: u64 },
    /// File matched the remote size and mtime; left alone.
    Unchanged { path: PathBuf },
    /// Local entry had no remote counterpart of the same kind.
    Deleted { path: PathBuf, kind: EntryKind },
    /// Local directory did not exist and was created.
    CreatedDir { path: PathBuf },
}

/// Every action of one [`Synchronizer::sync`] call, in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub actions: Vec<SyncAction>,
}

impl SyncReport {
    pub fn downloads(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Downloaded { .. }))
    }

    pub fn deletions(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Deleted { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|a| matches!(a, SyncAction::Unchanged { .. }))
    }

    fn count(&self, pred: impl Fn(&SyncAction) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }
}

// ---------------------------------------------------------------------------
// Change test
// ---------------------------------------------------------------------------

/// `true` when the local copy must be (re)downloaded.
///
/// A missing local file, a directory in its place, a size mismatch, or any
/// mtime difference (exact comparison, not "newer than") counts as changed.
pub fn has_changed(local: Option<&LocalEntry>, remote: &RemoteEntry) -> bool {
    match local {
        None => true,
        Some(local) if local.kind != EntryKind::File => true,
        Some(local) => local.size != remote.size || local.modified_at != remote.modified_at,
    }
}

/// Names a listing may carry that must never become local path components.
fn is_unsafe_name(name: &str) -> bool {
    name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\'])
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Mirrors a remote tree onto the local filesystem.
pub struct Synchronizer<'a, R: ?Sized, F: ?Sized> {
    session: &'a mut R,
    fs: &'a F,
}

impl<'a, R, F> Synchronizer<'a, R, F>
where
    R: RemoteSession + ?Sized,
    F: Filesystem + ?Sized,
{
    pub fn new(session: &'a mut R, fs: &'a F) -> Self {
        Self { session, fs }
    }

    /// Make the tree under `local_root` mirror the remote tree under
    /// `remote_root`.
    ///
    /// Stops at the first error; nothing is rolled back.
    pub fn sync(&mut self, remote_root: &str, local_root: &Path) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        self.sync_dir(&normalize_remote(remote_root), local_root, &mut report)?;
        Ok(report)
    }

    fn sync_dir(
        &mut self,
        remote_dir: &str,
        local_dir: &Path,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        // Step 1: one listing snapshot drives both passes.
        let listing: Vec<RemoteEntry> = self
            .session
            .list(remote_dir)?
            .into_iter()
            .filter(|entry| {
                if is_unsafe_name(&entry.name) {
                    tracing::warn!("ignoring remote entry {:?} in {remote_dir}", entry.name);
                    return false;
                }
                true
            })
            .collect();

        // Step 2: deletion pass.
        let existing = self.fs.stat(local_dir).map_err(|e| io_err(local_dir, e))?;
        if existing.as_ref().is_some_and(|e| e.kind.is_dir()) {
            self.delete_extraneous(local_dir, &listing, report)?;
        }

        // Step 3: ensure the directory exists, even when the remote one is empty.
        if existing.is_none() {
            self.fs
                .create_dir_all(local_dir)
                .map_err(|e| io_err(local_dir, e))?;
            report.actions.push(SyncAction::CreatedDir {
                path: local_dir.to_path_buf(),
            });
        }

        // Step 4: traversal pass.
        for entry in &listing {
            let remote_path = join_remote(remote_dir, &entry.name);
            let local_path = local_dir.join(&entry.name);
            match entry.kind {
                EntryKind::Directory => self.sync_dir(&remote_path, &local_path, report)?,
                EntryKind::File => self.sync_file(entry, &remote_path, &local_path, report)?,
            }
        }
        Ok(())
    }

    fn delete_extraneous(
        &mut self,
        local_dir: &Path,
        listing: &[RemoteEntry],
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let local_entries = self.fs.list(local_dir).map_err(|e| io_err(local_dir, e))?;
        for local in local_entries {
            if listing.iter().any(|remote| local.matches(remote)) {
                continue;
            }
            let path = local_dir.join(&local.name);
            tracing::info!("deleting {} {}", local.kind, path.display());
            self.fs.remove(&path).map_err(|e| io_err(&path, e))?;
            report.actions.push(SyncAction::Deleted {
                path,
                kind: local.kind,
            });
        }
        Ok(())
    }

    fn sync_file(
        &mut self,
        entry: &RemoteEntry,
        remote_path: &str,
        local_path: &Path,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let local = self.fs.stat(local_path).map_err(|e| io_err(local_path, e))?;
        if !has_changed(local.as_ref(), entry) {
            tracing::debug!("unchanged, skipping: {}", local_path.display());
            report.actions.push(SyncAction::Unchanged {
                path: local_path.to_path_buf(),
            });
            return Ok(());
        }

        tracing::info!("downloading {remote_path} -> {}", local_path.display());
        let contents = self.session.retrieve(remote_path)?;
        self.fs
            .write(local_path, &contents)
            .map_err(|e| io_err(local_path, e))?;
        // The mtime stamp is the equality baseline for the next run.
        self.fs
            .set_modified(local_path, entry.modified_at)
            .map_err(|e| io_err(local_path, e))?;

        report.actions.push(SyncAction::Downloaded {
            path: local_path.to_path_buf(),
            bytes: contents.len() as u64,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use datasync_core::{MemoryRemote, OsFs, RemoteError};
    use std::fs;
    use tempfile::TempDir;

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap()
    }

    fn local(size: u64, modified_at: DateTime<Utc>) -> LocalEntry {
        LocalEntry {
            name: "a.txt".into(),
            kind: EntryKind::File,
            size,
            modified_at,
        }
    }

    fn run(remote: &mut MemoryRemote, root: &Path) -> SyncReport {
        Synchronizer::new(remote, &OsFs)
            .sync("/", root)
            .expect("sync")
    }

    #[test]
    fn change_test_compares_size_and_exact_mtime() {
        let remote = RemoteEntry::file("a.txt", 10, t1());
        assert!(has_changed(None, &remote));
        assert!(!has_changed(Some(&local(10, t1())), &remote));
        assert!(has_changed(Some(&local(11, t1())), &remote));
        // Older and newer both count.
        assert!(has_changed(Some(&local(10, t1() - Duration::seconds(1))), &remote));
        assert!(has_changed(Some(&local(10, t1() + Duration::seconds(1))), &remote));

        let mut dir = local(10, t1());
        dir.kind = EntryKind::Directory;
        assert!(has_changed(Some(&dir), &remote));
    }

    #[test]
    fn first_sync_downloads_and_stamps_mtime() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("local");
        let mut remote = MemoryRemote::new();
        remote.add_file("/data/a.txt", "0123456789", t1());

        let report = run(&mut remote, &root);
        assert_eq!(report.downloads(), 1);

        let path = root.join("data").join("a.txt");
        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
        let stat = OsFs.stat(&path).unwrap().expect("exists");
        assert_eq!(stat.size, 10);
        assert_eq!(stat.modified_at, t1());
    }

    #[test]
    fn second_sync_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let mut remote = MemoryRemote::new();
        remote
            .add_file("/data/a.txt", "0123456789", t1())
            .add_file("/b.bin", vec![0u8; 64], t1());

        run(&mut remote, tmp.path());
        let second = run(&mut remote, tmp.path());
        assert_eq!(second.downloads(), 0);
        assert_eq!(second.deletions(), 0);
        assert_eq!(second.unchanged(), 2);
        assert_eq!(remote.retrievals(), 2);
    }

    #[test]
    fn remote_mtime_change_triggers_download() {
        let tmp = TempDir::new().unwrap();
        let mut remote = MemoryRemote::new();
        remote.add_file("/a.txt", "same", t1());
        run(&mut remote, tmp.path());

        remote.add_file("/a.txt", "SAME", t1() + Duration::minutes(1));
        let report = run(&mut remote, tmp.path());
        assert_eq!(report.downloads(), 1);
        assert_eq!(fs::read(tmp.path().join("a.txt")).unwrap(), b"SAME");
    }

    #[test]
    fn extraneous_local_entries_are_deleted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("old").join("deep")).unwrap();
        fs::write(tmp.path().join("old").join("deep").join("x"), b"x").unwrap();
        fs::write(tmp.path().join("stray.txt"), b"stray").unwrap();

        let mut remote = MemoryRemote::new();
        remote.add_file("/keep.txt", "k", t1());

        let report = run(&mut remote, tmp.path());
        assert_eq!(report.deletions(), 2);
        assert!(!tmp.path().join("old").exists());
        assert!(!tmp.path().join("stray.txt").exists());
        assert!(tmp.path().join("keep.txt").exists());
    }

    #[test]
    fn kind_change_deletes_then_recreates() {
        let tmp = TempDir::new().unwrap();
        // Local directory `item`, remote file `item`.
        fs::create_dir_all(tmp.path().join("item")).unwrap();
        fs::write(tmp.path().join("item").join("inner"), b"i").unwrap();
        // Local file `folder`, remote directory `folder`.
        fs::write(tmp.path().join("folder"), b"f").unwrap();

        let mut remote = MemoryRemote::new();
        remote
            .add_file("/item", "now a file", t1())
            .add_file("/folder/child.txt", "c", t1());

        let report = run(&mut remote, tmp.path());
        assert_eq!(report.deletions(), 2);
        assert!(tmp.path().join("item").is_file());
        assert!(tmp.path().join("folder").is_dir());
        assert!(tmp.path().join("folder").join("child.txt").is_file());
    }

    #[test]
    fn empty_remote_directories_are_mirrored() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("mirror");
        let mut remote = MemoryRemote::new();
        remote.add_dir("/empty/nested", t1());

        let report = run(&mut remote, &root);
        assert!(root.join("empty").join("nested").is_dir());
        assert!(report
            .actions
            .contains(&SyncAction::CreatedDir { path: root.clone() }));
    }

    #[test]
    fn list_failure_aborts_sync() {
        let tmp = TempDir::new().unwrap();
        let mut remote = MemoryRemote::new();
        remote
            .add_file("/a/one.txt", "1", t1())
            .add_file("/b/two.txt", "2", t1())
            .fail_list("/a");

        let err = Synchronizer::new(&mut remote, &OsFs)
            .sync("/", tmp.path())
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::List { .. })));
        // No partial continuation into later siblings.
        assert!(!tmp.path().join("b").exists());
    }

    #[test]
    fn retrieve_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut remote = MemoryRemote::new();
        remote.add_file("/a.txt", "x", t1()).fail_retrieve("/a.txt");

        let err = Synchronizer::new(&mut remote, &OsFs)
            .sync("/", tmp.path())
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Remote(RemoteError::Retrieve { .. })
        ));
        assert!(err.to_string().contains("/a.txt"));
    }

    #[test]
    fn nested_remote_root_is_joined_cleanly() {
        let tmp = TempDir::new().unwrap();
        let mut remote = MemoryRemote::new();
        remote.add_file("/srv/pub/file.txt", "f", t1());

        let report = Synchronizer::new(&mut remote, &OsFs)
            .sync("/srv/pub/", tmp.path())
            .expect("sync");
        assert_eq!(report.downloads(), 1);
        assert!(tmp.path().join("file.txt").is_file());
    }

    #[test]
    fn unsafe_names_are_never_joined() {
        assert!(is_unsafe_name(".."));
        assert!(is_unsafe_name("a/b"));
        assert!(is_unsafe_name("a\\b"));
        assert!(is_unsafe_name(""));
        assert!(!is_unsafe_name("a.txt"));
    }
}
