//! Content digest capability.
//!
//! The archive uses one digest algorithm for both the origin file and its
//! zip. Swapping algorithms means providing another [`ContentDigest`]; no
//! call site branches on the algorithm.

use std::fmt;

use sha1::{Digest, Sha1};

/// Lowercase hex digest of some content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ContentHash {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Computes a stable digest of a byte slice.
///
/// Used for change detection only; the same input must give the same output
/// on every run and platform.
pub trait ContentDigest {
    fn digest(&self, bytes: &[u8]) -> ContentHash;
}

/// Canonical digest: 160-bit SHA-1, hex encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Digest;

impl ContentDigest for Sha1Digest {
    fn digest(&self, bytes: &[u8]) -> ContentHash {
        let mut h = Sha1::new();
        h.update(bytes);
        ContentHash(hex::encode(h.finalize()))
    }
}
