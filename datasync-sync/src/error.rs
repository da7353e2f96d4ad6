//! Error types for datasync-sync.

use std::path::PathBuf;

use thiserror::Error;

use datasync_core::RemoteError;

/// All errors that can arise while mirroring the remote tree.
///
/// Every variant aborts the whole synchronization; entries already
/// downloaded or deleted stay that way.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing or retrieval failed on the remote side.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A local I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
