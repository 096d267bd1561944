//! Download scheduler: a [`WorkerPool`] specialised to fetching URLs.
//!
//! Each [`DownloadRequest`] becomes a [`DownloadTask`] bound to the
//! scheduler's transfer (cache-aware unless disabled). The job's payload is
//! the local path of the downloaded file.

mod progress;
mod request;
mod task;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, DlpoolConfig};
use crate::error::Result;
use crate::pool::{AsCompleted, Job, Launcher, Mode, WorkerPool};
use crate::transfer::{CachedTransfer, CurlTransfer, Transfer, TransferRequest};

pub use progress::{LogProgress, ProgressReporter, ProgressStats, WithProgress};
pub use request::DownloadRequest;
pub use task::{serve_download_worker, DownloadTask, WorkerRequest};

/// How to build a [`DownloadScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Where relative destinations land. `None` uses the XDG cache dir.
    pub download_root: Option<PathBuf>,
    pub mode: Mode,
    /// `None`: unbounded threads, or one process per CPU.
    pub max_workers: Option<usize>,
    /// Reuse files that already satisfy a request.
    pub cache: bool,
    /// Passed through to each transfer for its own logging.
    pub verbosity: u8,
    /// Worker command for the process strategy. `None` re-runs the current
    /// executable as `<exe> worker`.
    pub launcher: Option<Launcher>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            download_root: None,
            mode: Mode::default(),
            max_workers: None,
            cache: true,
            verbosity: 0,
            launcher: None,
        }
    }
}

impl From<&DlpoolConfig> for SchedulerOptions {
    fn from(cfg: &DlpoolConfig) -> Self {
        Self {
            download_root: cfg.download_root.clone(),
            mode: cfg.mode,
            max_workers: cfg.max_workers,
            cache: cfg.cache,
            verbosity: cfg.verbosity,
            launcher: None,
        }
    }
}

pub struct DownloadScheduler {
    download_root: PathBuf,
    cache: bool,
    verbosity: u8,
    transfer: Arc<dyn Transfer>,
    pool: WorkerPool<DownloadTask>,
}

impl DownloadScheduler {
    /// Scheduler over the libcurl transfer.
    pub fn new(opts: SchedulerOptions) -> anyhow::Result<Self> {
        Self::with_transfer(opts, Arc::new(CurlTransfer::default()))
    }

    /// Scheduler over a caller-supplied transfer. Under the process strategy
    /// workers use their own libcurl transfer and `transfer` is unused.
    pub fn with_transfer(opts: SchedulerOptions, transfer: Arc<dyn Transfer>) -> anyhow::Result<Self> {
        let download_root = match opts.download_root {
            Some(root) => root,
            None => config::default_download_root()?,
        };
        fs::create_dir_all(&download_root)
            .with_context(|| format!("create download root {}", download_root.display()))?;

        let transfer: Arc<dyn Transfer> = if opts.cache {
            Arc::new(CachedTransfer::new(transfer))
        } else {
            transfer
        };

        let launcher = match opts.launcher {
            Some(l) => l,
            None if opts.mode == Mode::Process => {
                Launcher::current_exe().context("locate current executable for worker processes")?
            }
            // Only the process strategy reads it.
            None => Launcher::new("dlpool").arg("worker"),
        };
        let pool = WorkerPool::new(opts.mode, opts.max_workers, launcher);

        tracing::info!(
            root = %download_root.display(),
            cache = opts.cache,
            "download scheduler ready"
        );
        Ok(Self {
            download_root,
            cache: opts.cache,
            verbosity: opts.verbosity,
            transfer,
            pool,
        })
    }

    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    pub fn cache(&self) -> bool {
        self.cache
    }

    pub fn mode(&self) -> Mode {
        self.pool.mode()
    }

    pub fn max_workers(&self) -> Option<usize> {
        self.pool.max_workers()
    }

    /// Validate `request`, bind it to this scheduler's transfer and submit
    /// it. The job succeeds with the downloaded file's path.
    pub fn submit(&self, request: DownloadRequest) -> Result<Job<PathBuf>> {
        request.validate()?;
        let task = DownloadTask {
            request: TransferRequest {
                url: request.url,
                download_root: self.download_root.clone(),
                dst: request.dst,
                hash_prefix: request.hash_prefix,
                hasher: request.hasher,
                verbosity: self.verbosity,
            },
            cache: self.cache,
            transfer: Arc::clone(&self.transfer),
        };
        let url = task.request.url.clone();
        let job = self.pool.submit(task)?;
        tracing::debug!(job = %job.id(), "scheduled {}", url);
        Ok(job)
    }

    pub fn as_completed(&self) -> AsCompleted<PathBuf> {
        self.pool.as_completed()
    }

    /// `as_completed()` observed by `reporter`, sized by `len()` now.
    pub fn as_completed_with_progress<R: ProgressReporter>(
        &self,
        reporter: R,
        description: Option<&str>,
        verbosity: u8,
    ) -> WithProgress<AsCompleted<PathBuf>, R> {
        WithProgress::new(self.as_completed(), self.len(), reporter, description, verbosity)
    }

    /// Jobs submitted and not yet yielded.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pool.pending()
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl<'a> IntoIterator for &'a DownloadScheduler {
    type Item = Job<PathBuf>;
    type IntoIter = AsCompleted<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_completed()
    }
}

impl std::fmt::Debug for DownloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadScheduler")
            .field("download_root", &self.download_root)
            .field("cache", &self.cache)
            .field("pool", &self.pool)
            .finish()
    }
}
