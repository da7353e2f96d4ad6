//! Remote session capability and an in-memory implementation.
//!
//! The synchronizer only needs three remote operations: list a directory,
//! retrieve a file, and close the session. Connecting and authenticating are
//! the concrete session's constructor concern (see the `datasync-ftp` crate).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::RemoteError;
use crate::types::{EntryKind, RemoteEntry};

/// A live connection to the remote tree.
///
/// Remote paths are `/`-separated strings; see [`normalize_remote`].
pub trait RemoteSession {
    /// Entries directly under `path`. Never includes `.` or `..`.
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Full contents of the file at `path`.
    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Close the session. Must be called on every exit path.
    fn quit(&mut self) -> Result<(), RemoteError>;
}

impl<S: RemoteSession + ?Sized> RemoteSession for &mut S {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        (**self).list(path)
    }

    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, RemoteError> {
        (**self).retrieve(path)
    }

    fn quit(&mut self) -> Result<(), RemoteError> {
        (**self).quit()
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Normalize a remote path: `\` becomes `/`, repeated separators collapse,
/// and there is no trailing separator except for the root itself.
///
/// Relative paths stay relative; an empty path is treated as the root.
pub fn normalize_remote(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/') || unified.is_empty();
    let parts: Vec<&str> = unified.split('/').filter(|p| !p.is_empty()).collect();
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Join `name` onto the remote directory `base`.
pub fn join_remote(base: &str, name: &str) -> String {
    normalize_remote(&format!("{base}/{name}"))
}

// ---------------------------------------------------------------------------
// MemoryRemote
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Vec<u8>,
    modified_at: DateTime<Utc>,
}

/// Deterministic in-memory [`RemoteSession`].
///
/// Paths are normalized with [`normalize_remote`]; adding a file creates its
/// parent directories. Used as a test double for both unit and integration
/// tests.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    dirs: BTreeMap<String, DateTime<Utc>>,
    files: BTreeMap<String, MemoryFile>,
    failing_lists: BTreeSet<String>,
    failing_retrievals: BTreeSet<String>,
    retrievals: usize,
    closed: bool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// An empty tree containing only the root `/`.
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert("/".to_string(), DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        Self {
            dirs,
            files: BTreeMap::new(),
            failing_lists: BTreeSet::new(),
            failing_retrievals: BTreeSet::new(),
            retrievals: 0,
            closed: false,
        }
    }

    /// Add (or replace) a file, creating missing parent directories.
    pub fn add_file(
        &mut self,
        path: &str,
        contents: impl Into<Vec<u8>>,
        modified_at: DateTime<Utc>,
    ) -> &mut Self {
        let path = Self::key(path);
        self.remove(&path);
        self.add_parents(&path, modified_at);
        self.files.insert(
            path,
            MemoryFile {
                contents: contents.into(),
                modified_at,
            },
        );
        self
    }

    /// Add an (empty) directory, creating missing parents.
    pub fn add_dir(&mut self, path: &str, modified_at: DateTime<Utc>) -> &mut Self {
        let path = Self::key(path);
        if self.files.contains_key(&path) {
            self.remove(&path);
        }
        self.add_parents(&path, modified_at);
        self.dirs.entry(path).or_insert(modified_at);
        self
    }

    /// Remove a file or a directory with everything beneath it.
    ///
    /// Replacing an entry with [`add_file`](Self::add_file) or
    /// [`add_dir`](Self::add_dir) of the other kind implies a removal.
    pub fn remove(&mut self, path: &str) -> &mut Self {
        let path = Self::key(path);
        let prefix = format!("{path}/");
        self.files.retain(|p, _| p != &path && !p.starts_with(&prefix));
        self.dirs.retain(|p, _| p != &path && !p.starts_with(&prefix));
        self
    }

    /// Make every subsequent `list(path)` fail.
    pub fn fail_list(&mut self, path: &str) -> &mut Self {
        self.failing_lists.insert(Self::key(path));
        self
    }

    /// Make every subsequent `retrieve(path)` fail.
    pub fn fail_retrieve(&mut self, path: &str) -> &mut Self {
        self.failing_retrievals.insert(Self::key(path));
        self
    }

    /// Number of successful `retrieve` calls so far.
    pub fn retrievals(&self) -> usize {
        self.retrievals
    }

    /// Whether `quit` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// A fresh session over the same tree: open, retrieval count reset,
    /// injected failures kept.
    pub fn reopened(&self) -> Self {
        Self {
            retrievals: 0,
            closed: false,
            ..self.clone()
        }
    }

    fn add_parents(&mut self, path: &str, modified_at: DateTime<Utc>) {
        let mut current = path;
        while let Some(idx) = current.rfind('/') {
            current = &current[..idx];
            let dir = if current.is_empty() { "/" } else { current };
            self.dirs.entry(dir.to_string()).or_insert(modified_at);
            if current.is_empty() {
                break;
            }
        }
    }

    fn key(path: &str) -> String {
        normalize_remote(&format!("/{path}"))
    }

    fn parent_of(path: &str) -> &str {
        match path.rfind('/') {
            Some(0) => "/",
            Some(idx) => &path[..idx],
            None => "",
        }
    }

    fn base_name(path: &str) -> &str {
        path.rsplit('/').next().unwrap_or(path)
    }
}

impl RemoteSession for MemoryRemote {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let path = Self::key(path);
        if self.failing_lists.contains(&path) {
            return Err(RemoteError::List {
                path,
                reason: "injected failure".to_string(),
            });
        }
        if !self.dirs.contains_key(&path) {
            return Err(RemoteError::List {
                path,
                reason: "no such directory".to_string(),
            });
        }

        let mut entries: Vec<RemoteEntry> = self
            .dirs
            .iter()
            .filter(|(p, _)| p.as_str() != "/" && Self::parent_of(p) == path)
            .map(|(p, at)| RemoteEntry::directory(Self::base_name(p), *at))
            .chain(
                self.files
                    .iter()
                    .filter(|(p, _)| Self::parent_of(p) == path)
                    .map(|(p, f)| {
                        RemoteEntry::file(
                            Self::base_name(p),
                            f.contents.len() as u64,
                            f.modified_at,
                        )
                    }),
            )
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let path = Self::key(path);
        if self.failing_retrievals.contains(&path) {
            return Err(RemoteError::Retrieve {
                path,
                reason: "injected failure".to_string(),
            });
        }
        match self.files.get(&path) {
            Some(file) => {
                self.retrievals += 1;
                Ok(file.contents.clone())
            }
            None => Err(RemoteError::Retrieve {
                path,
                reason: "no such file".to_string(),
            }),
        }
    }

    fn quit(&mut self) -> Result<(), RemoteError> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
