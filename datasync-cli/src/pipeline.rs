//! One full run: mirror, archive, collect garbage, report.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use datasync_archive::{
    create_report, prune_dangling, prune_empty_directories, ArchiveEngine, ArchiveError,
    CompressReport, Sha1Digest,
};
use datasync_core::{Config, Filesystem, RemoteError, RemoteSession};
use datasync_sync::{SyncError, SyncReport, Synchronizer};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("synchronization failed")]
    Sync(#[from] SyncError),

    #[error("archive maintenance failed")]
    Archive(#[from] ArchiveError),

    #[error("remote session failed")]
    Remote(#[from] RemoteError),
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sync,
    Compress,
    PruneDangling,
    PruneEmptyDirectories,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sync => "Synchronizing remote tree",
            Self::Compress => "Compressing local files",
            Self::PruneDangling => "Removing dangling archive entries",
            Self::PruneEmptyDirectories => "Removing empty archive directories",
            Self::Report => "Writing report",
        };
        f.write_str(label)
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sync: SyncReport,
    pub compress: CompressReport,
    pub pruned: Vec<PathBuf>,
    pub report_rows: usize,
}

/// Run every stage against `session`, calling `on_stage` as each one starts,
/// then close the session.
///
/// The session is quit whether or not the stages succeed. A stage error takes
/// precedence over a quit error.
pub fn run<R, F, P>(
    config: &Config,
    session: &mut R,
    fs: &F,
    report_path: &Path,
    on_stage: P,
) -> Result<RunSummary, PipelineError>
where
    R: RemoteSession + ?Sized,
    F: Filesystem + ?Sized,
    P: FnMut(Stage),
{
    let outcome = run_stages(config, session, fs, report_path, on_stage);
    let quit = session.quit();
    match (outcome, quit) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(quit_err)) => {
            tracing::warn!("{quit_err}");
            Err(e)
        }
    }
}

fn run_stages<R, F, P>(
    config: &Config,
    session: &mut R,
    fs: &F,
    report_path: &Path,
    mut on_stage: P,
) -> Result<RunSummary, PipelineError>
where
    R: RemoteSession + ?Sized,
    F: Filesystem + ?Sized,
    P: FnMut(Stage),
{
    let local_root = config.sync_local_dir.as_path();
    let archive_root = config.compress_dir.as_path();

    on_stage(Stage::Sync);
    let sync = Synchronizer::new(session, fs).sync(&config.sync_remote_dir, local_root)?;

    on_stage(Stage::Compress);
    let compress = ArchiveEngine::new(fs, &Sha1Digest).compress(local_root, archive_root)?;

    on_stage(Stage::PruneDangling);
    let mut pruned = prune_dangling(fs, local_root, archive_root)?;

    on_stage(Stage::PruneEmptyDirectories);
    pruned.extend(prune_empty_directories(fs, archive_root)?);

    on_stage(Stage::Report);
    let report_rows = create_report(fs, archive_root, report_path)?;

    Ok(RunSummary {
        sync,
        compress,
        pruned,
        report_rows,
    })
}
