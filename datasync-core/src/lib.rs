//! datasync core library — configuration, entry types, and the filesystem
//! and remote-session capabilities every stage is written against.
//!
//! - [`config`] — [`Config`] and its loader
//! - [`error`] — [`ConfigError`], [`RemoteError`]
//! - [`fs`] — [`Filesystem`] capability, [`OsFs`]
//! - [`remote`] — [`RemoteSession`] capability, [`MemoryRemote`]
//! - [`types`] — [`RemoteEntry`], [`LocalEntry`], [`EntryKind`]

pub mod config;
pub mod error;
pub mod fs;
pub mod remote;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, RemoteError};
pub use fs::{Filesystem, OsFs};
pub use remote::{join_remote, normalize_remote, MemoryRemote, RemoteSession};
pub use types::{EntryKind, LocalEntry, RemoteEntry};
