//! # datasync-sync
//!
//! One-way mirror of a remote directory tree onto local disk.
//!
//! Build a [`Synchronizer`] over a [`RemoteSession`](datasync_core::RemoteSession)
//! and a [`Filesystem`](datasync_core::Filesystem), then call
//! [`Synchronizer::sync`].

pub mod error;
pub mod mirror;

pub use error::SyncError;
pub use mirror::{SyncAction, SyncReport, Synchronizer};
