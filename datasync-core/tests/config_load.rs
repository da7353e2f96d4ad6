//! Config loader integration tests: file access, error messages, and the
//! fail-fast rule for required keys.

use std::time::Duration;

use assert_fs::prelude::*;
use datasync_core::{config, ConfigError};
use predicates::prelude::predicate;

const VALID: &str = "\
hostAddress: ftp.example.com
hostPort: 21
hostUser: anonymous
hostPassword: guest
syncRemoteDir: /pub
syncLocalDir: mirror
compressDir: archive
";

// ---------------------------------------------------------------------------
// 1. Happy path
// ---------------------------------------------------------------------------

#[test]
fn load_reads_file_from_disk() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("settings.yaml");
    file.write_str(VALID).expect("write");

    let cfg = config::load_at(file.path()).expect("load");
    assert_eq!(cfg.host_address, "ftp.example.com");
    assert_eq!(cfg.host_port, 21);
    assert_eq!(cfg.sync_remote_dir, "/pub");
    assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
    file.assert(predicate::str::contains("hostAddress"));
}

// ---------------------------------------------------------------------------
// 2. Error messages
// ---------------------------------------------------------------------------

#[test]
fn missing_file_returns_io_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.yaml");
    let err = config::load_at(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn each_required_key_is_reported_when_absent() {
    let keys = [
        "hostAddress",
        "hostPort",
        "hostUser",
        "hostPassword",
        "syncRemoteDir",
        "syncLocalDir",
        "compressDir",
    ];
    let dir = assert_fs::TempDir::new().expect("tempdir");
    for key in keys {
        let contents: String = VALID
            .lines()
            .filter(|line| !line.starts_with(&format!("{key}:")))
            .map(|line| format!("{line}\n"))
            .collect();
        let file = dir.child(format!("{key}.yaml"));
        file.write_str(&contents).expect("write");

        let err = config::load_at(file.path()).unwrap_err();
        match &err {
            ConfigError::MissingKey { key: missing, .. } => assert_eq!(*missing, key),
            other => panic!("expected MissingKey for {key}, got: {other}"),
        }
        assert!(err.to_string().contains(key));
    }
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("broken.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("broken.yaml"));
}
