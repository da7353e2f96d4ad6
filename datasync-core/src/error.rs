//! Error types for datasync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error — includes file path and line context from serde_yaml.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required key is absent from the configuration file.
    #[error("variable '{key}' not found in config file {path}")]
    MissingKey { path: PathBuf, key: &'static str },
}

/// Failures reported by a [`RemoteSession`](crate::remote::RemoteSession).
///
/// Every variant is fatal for the current run.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("cannot connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("login failed for user '{user}': {reason}")]
    Auth { user: String, reason: String },

    #[error("cannot list remote directory '{path}': {reason}")]
    List { path: String, reason: String },

    #[error("cannot retrieve remote file '{path}': {reason}")]
    Retrieve { path: String, reason: String },

    #[error("failed to close remote session: {reason}")]
    Disconnect { reason: String },
}
