//! datasync — mirror an FTP tree, archive it incrementally, report on it.
//!
//! # Usage
//!
//! ```text
//! datasync <configFilePath> <reportDestinationFilePath>
//! ```
//!
//! Set `RUST_LOG=debug` for per-file decisions.

mod pipeline;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use datasync_core::{config, OsFs};
use datasync_ftp::FtpSession;
use pipeline::RunSummary;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "datasync",
    version,
    about = "Mirror a remote FTP directory, keep a zip archive of it, and write a CSV report",
    long_about = None,
)]
struct Cli {
    /// YAML (or JSON) run configuration.
    config: PathBuf,

    /// Where to write the CSV report. Overwritten if it exists.
    report: PathBuf,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = config::load_at(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    tracing::debug!("{config:?}");

    println!(
        "{} {}:{}",
        "==> Connecting to".bold().cyan(),
        config.host_address,
        config.host_port
    );
    let mut session = FtpSession::open(
        &config.host_address,
        config.host_port,
        config.connect_timeout,
        &config.host_user,
        &config.host_password,
    )
    .context("could not open FTP session")?;

    let summary = pipeline::run(&config, &mut session, &OsFs, &cli.report, |stage| {
        println!("{}", format!("==> {stage}").bold().cyan());
    })
    .context("run aborted")?;

    print_summary(&summary, &cli.report);
    Ok(())
}

fn print_summary(summary: &RunSummary, report: &std::path::Path) {
    println!("{}", "✓ done".green().bold());
    println!(
        "  sync:    {} downloaded, {} unchanged, {} deleted",
        summary.sync.downloads(),
        summary.sync.unchanged(),
        summary.sync.deletions()
    );
    println!(
        "  archive: {} compressed, {} up to date, {} removed",
        summary.compress.compressed(),
        summary.compress.skipped(),
        summary.pruned.len()
    );
    println!(
        "  report:  {} entries → {}",
        summary.report_rows,
        report.display()
    );
}
