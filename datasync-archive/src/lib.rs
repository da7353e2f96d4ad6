//! # datasync-archive
//!
//! Deduplicated zip archive of the local mirror.
//!
//! - [`ArchiveEngine::compress`] keeps one zip + hash sidecar per file,
//!   recompressing only when a digest no longer matches.
//! - [`gc::prune_dangling`] and [`gc::prune_empty_directories`] keep the
//!   archive consistent with its source tree.
//! - [`report::create_report`] writes the CSV inventory.

pub mod digest;
pub mod engine;
pub mod error;
pub mod gc;
pub mod report;
pub mod sidecar;

pub use digest::{ContentDigest, ContentHash, Sha1Digest};
pub use engine::{ArchiveEngine, CompressOutcome, CompressReport};
pub use error::ArchiveError;
pub use gc::{prune_dangling, prune_empty_directories};
pub use report::create_report;
pub use sidecar::{ArchiveEntry, HashRecord};
