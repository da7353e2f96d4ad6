//! Run configuration.
//!
//! # File format
//!
//! ```yaml
//! hostAddress: ftp.example.com
//! hostPort: 21
//! hostUser: anonymous
//! hostPassword: secret
//! syncRemoteDir: /pub/data
//! syncLocalDir: ./mirror
//! compressDir: ./archive
//! connectTimeoutSecs: 5   # optional
//! ```
//!
//! JSON documents parse as well since JSON is a subset of YAML.
//! Every key except `connectTimeoutSecs` is required; the loader fails on the
//! first missing one before any network action happens.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Connection timeout used when `connectTimeoutSecs` is not set.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable run configuration, built once and passed by reference.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub host_address: String,
    pub host_port: u16,
    pub host_user: String,
    pub host_password: String,
    pub sync_remote_dir: String,
    pub sync_local_dir: PathBuf,
    pub compress_dir: PathBuf,
    pub connect_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host_address", &self.host_address)
            .field("host_port", &self.host_port)
            .field("host_user", &self.host_user)
            .field("host_password", &"<redacted>")
            .field("sync_remote_dir", &self.sync_remote_dir)
            .field("sync_local_dir", &self.sync_local_dir)
            .field("compress_dir", &self.compress_dir)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Every field optional so a missing key can be reported by name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    host_address: Option<String>,
    host_port: Option<u16>,
    host_user: Option<String>,
    host_password: Option<String>,
    sync_remote_dir: Option<String>,
    sync_local_dir: Option<PathBuf>,
    compress_dir: Option<PathBuf>,
    connect_timeout_secs: Option<u64>,
}

/// Load and validate the configuration file at `path`.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &contents)
}

/// Parse configuration `contents`; `path` is only used for diagnostics.
pub fn parse(path: &Path, contents: &str) -> Result<Config, ConfigError> {
    // An empty document deserializes to `()`, not a mapping.
    let raw: RawConfig = if contents.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    };

    let require = |key: &'static str| ConfigError::MissingKey {
        path: path.to_path_buf(),
        key,
    };

    Ok(Config {
        host_address: raw.host_address.ok_or_else(|| require("hostAddress"))?,
        host_port: raw.host_port.ok_or_else(|| require("hostPort"))?,
        host_user: raw.host_user.ok_or_else(|| require("hostUser"))?,
        host_password: raw.host_password.ok_or_else(|| require("hostPassword"))?,
        sync_remote_dir: raw.sync_remote_dir.ok_or_else(|| require("syncRemoteDir"))?,
        sync_local_dir: raw.sync_local_dir.ok_or_else(|| require("syncLocalDir"))?,
        compress_dir: raw.compress_dir.ok_or_else(|| require("compressDir"))?,
        connect_timeout: raw
            .connect_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
