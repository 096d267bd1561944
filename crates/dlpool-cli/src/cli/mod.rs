//! CLI for the dlpool download scheduler.

mod commands;
mod manifest;
mod progress;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dlpool_core::config;
use dlpool_core::hash::Hasher;
use dlpool_core::pool::Mode;
use std::path::PathBuf;

use commands::{run_checksum, run_fetch, run_worker};

/// Top-level CLI for the dlpool download scheduler.
#[derive(Debug, Parser)]
#[command(name = "dlpool")]
#[command(about = "dlpool: concurrent, hash-verified downloads", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one or more URLs concurrently.
    Fetch(FetchArgs),

    /// Print the digest of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// Digest algorithm.
        #[arg(long, default_value_t = Hasher::Sha256)]
        hasher: Hasher,
        /// Fail unless the digest starts with this prefix.
        #[arg(long, value_name = "PREFIX")]
        expect: Option<String>,
    },

    /// Serve one download request over stdin/stdout (process strategy).
    #[command(hide = true)]
    Worker,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Direct HTTP/HTTPS URLs to download.
    #[arg(required_unless_present = "manifest", value_name = "URL")]
    pub urls: Vec<String>,

    /// Destination path (only with a single URL). Relative paths are under the download root.
    #[arg(long)]
    pub dst: Option<PathBuf>,

    /// Required digest prefix (hex, case-insensitive) for every URL given on the command line.
    #[arg(long, value_name = "HEX")]
    pub hash_prefix: Option<String>,

    /// Digest algorithm for --hash-prefix.
    #[arg(long, default_value_t = Hasher::Sha256)]
    pub hasher: Hasher,

    /// TOML file with [[download]] entries (url, dst, hash_prefix, hasher).
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Concurrency strategy: thread, process or serial (default from config).
    #[arg(long)]
    pub mode: Option<Mode>,

    /// Maximum concurrent downloads (default from config).
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Always download, even when a matching file already exists.
    #[arg(long)]
    pub no_cache: bool,

    /// Root directory for relative destinations (default: ~/.cache/dlpool).
    #[arg(long, value_name = "DIR")]
    pub download_root: Option<PathBuf>,

    /// Do not draw a progress bar.
    #[arg(long)]
    pub no_progress: bool,

    /// More output (-v summary, -vv per-job progress).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_fetch(&cfg, args)?;
            }
            CliCommand::Checksum {
                path,
                hasher,
                expect,
            } => run_checksum(&path, hasher, expect.as_deref())?,
            // Workers never read config; the parent resolved everything.
            CliCommand::Worker => run_worker()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
