//! # datasync-ftp
//!
//! FTP implementation of [`RemoteSession`] on top of `suppaftp`.
//!
//! Listings use `MLSD` when the server supports it (exact, machine-readable
//! timestamps) and fall back to parsing `LIST` output otherwise.

use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use suppaftp::list::File;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};

use datasync_core::{EntryKind, RemoteEntry, RemoteError, RemoteSession};

/// Which listing command produced a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFormat {
    Mlsd,
    List,
}

/// A logged-in FTP control connection.
pub struct FtpSession {
    stream: Option<FtpStream>,
    address: String,
    use_mlsd: bool,
}

impl FtpSession {
    /// Dial `address:port` within `timeout` and log in.
    ///
    /// If authentication fails the control connection is closed before the
    /// error is returned.
    pub fn open(
        address: &str,
        port: u16,
        timeout: Duration,
        user: &str,
        password: &str,
    ) -> Result<Self, RemoteError> {
        let mut session = Self::connect(address, port, timeout)?;
        if let Err(err) = session.login(user, password) {
            if let Err(quit_err) = session.quit() {
                tracing::warn!("{quit_err}");
            }
            return Err(err);
        }
        Ok(session)
    }

    /// Dial `address:port`, failing after `timeout`.
    pub fn connect(address: &str, port: u16, timeout: Duration) -> Result<Self, RemoteError> {
        let target = format!("{address}:{port}");
        let connect_err = |reason: String| RemoteError::Connect {
            address: target.clone(),
            reason,
        };
        let addr = target
            .to_socket_addrs()
            .map_err(|e| connect_err(e.to_string()))?
            .next()
            .ok_or_else(|| connect_err("address did not resolve".to_string()))?;
        let stream =
            FtpStream::connect_timeout(addr, timeout).map_err(|e| connect_err(e.to_string()))?;
        tracing::debug!("connected to {target}");
        Ok(Self {
            stream: Some(stream),
            address: target,
            use_mlsd: true,
        })
    }

    /// Authenticate and switch to binary transfers.
    pub fn login(&mut self, user: &str, password: &str) -> Result<(), RemoteError> {
        let auth_err = |e: FtpError| RemoteError::Auth {
            user: user.to_string(),
            reason: e.to_string(),
        };
        let stream = self.stream.as_mut().ok_or_else(|| RemoteError::Auth {
            user: user.to_string(),
            reason: "session is closed".to_string(),
        })?;
        stream.login(user, password).map_err(auth_err)?;
        stream.transfer_type(FileType::Binary).map_err(auth_err)?;
        Ok(())
    }
}

impl RemoteSession for FtpSession {
    fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        let list_err = |reason: String| RemoteError::List {
            path: path.to_string(),
            reason,
        };
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| list_err("session is closed".to_string()))?;

        if self.use_mlsd {
            match stream.mlsd(Some(path)) {
                Ok(lines) => return Ok(parse_listing(&lines, ListingFormat::Mlsd)),
                Err(FtpError::UnexpectedResponse(resp)) => {
                    tracing::debug!("MLSD rejected ({resp:?}), trying LIST");
                }
                Err(e) => return Err(list_err(e.to_string())),
            }
            let lines = stream.list(Some(path)).map_err(|e| list_err(e.to_string()))?;
            // MLSD failed but LIST works: the server lacks MLSD.
            self.use_mlsd = false;
            return Ok(parse_listing(&lines, ListingFormat::List));
        }

        let lines = stream.list(Some(path)).map_err(|e| list_err(e.to_string()))?;
        Ok(parse_listing(&lines, ListingFormat::List))
    }

    fn retrieve(&mut self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let retrieve_err = |reason: String| RemoteError::Retrieve {
            path: path.to_string(),
            reason,
        };
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| retrieve_err("session is closed".to_string()))?;
        let buffer = stream
            .retr_as_buffer(path)
            .map_err(|e| retrieve_err(e.to_string()))?;
        Ok(buffer.into_inner())
    }

    fn quit(&mut self) -> Result<(), RemoteError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        tracing::debug!("closing session to {}", self.address);
        stream.quit().map_err(|e| RemoteError::Disconnect {
            reason: e.to_string(),
        })
    }
}

/// Convert raw listing lines into entries, dropping `.`/`..` and lines that
/// do not describe an entry (e.g. the `total N` header of `LIST`).
pub fn parse_listing(lines: &[String], format: ListingFormat) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| {
            let parsed = match format {
                ListingFormat::Mlsd => File::from_mlsx_line(line),
                ListingFormat::List => File::from_str(line),
            };
            match parsed {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::debug!("skipping listing line {line:?}: {e:?}");
                    None
                }
            }
        })
        .filter(|file| file.name() != "." && file.name() != "..")
        .map(|file| to_entry(&file))
        .collect()
}

fn to_entry(file: &File) -> RemoteEntry {
    RemoteEntry {
        name: file.name().to_string(),
        kind: if file.is_directory() {
            EntryKind::Directory
        } else {
            EntryKind::File
        },
        size: file.size() as u64,
        modified_at: DateTime::<Utc>::from(file.modified()),
    }
}
