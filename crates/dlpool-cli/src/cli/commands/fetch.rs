//! `dlpool fetch` – download URLs and manifest entries concurrently.

use anyhow::{bail, Context, Result};
use dlpool_core::config::DlpoolConfig;
use dlpool_core::scheduler::{
    DownloadRequest, DownloadScheduler, LogProgress, ProgressReporter, SchedulerOptions,
};
use indicatif::ProgressBar;
use std::collections::HashMap;

use crate::cli::manifest;
use crate::cli::progress::BarProgress;
use crate::cli::FetchArgs;

/// Requests named on the command line followed by manifest entries.
pub(crate) fn collect_requests(args: &FetchArgs) -> Result<Vec<DownloadRequest>> {
    if args.dst.is_some() && args.urls.len() != 1 {
        bail!("--dst needs exactly one URL (got {})", args.urls.len());
    }
    let mut requests: Vec<DownloadRequest> = args
        .urls
        .iter()
        .map(|url| DownloadRequest {
            url: url.clone(),
            dst: args.dst.clone(),
            hash_prefix: args.hash_prefix.clone(),
            hasher: args.hasher,
        })
        .collect();
    if let Some(path) = &args.manifest {
        requests.extend(manifest::load(path)?);
    }
    if requests.is_empty() {
        bail!("nothing to download");
    }
    Ok(requests)
}

/// Config values overridden by flags.
pub(crate) fn scheduler_options(cfg: &DlpoolConfig, args: &FetchArgs) -> SchedulerOptions {
    let mut opts = SchedulerOptions::from(cfg);
    if let Some(mode) = args.mode {
        opts.mode = mode;
    }
    if args.max_workers.is_some() {
        opts.max_workers = args.max_workers;
    }
    if args.no_cache {
        opts.cache = false;
    }
    if let Some(root) = &args.download_root {
        opts.download_root = Some(root.clone());
    }
    if args.verbose > 0 {
        opts.verbosity = args.verbose;
    }
    opts
}

/// Print one line per job as it finishes; fail if any job failed.
pub fn run_fetch(cfg: &DlpoolConfig, args: FetchArgs) -> Result<()> {
    let requests = collect_requests(&args)?;
    let opts = scheduler_options(cfg, &args);
    let verbosity = opts.verbosity;
    let sched = DownloadScheduler::new(opts)?;

    let mut urls = HashMap::new();
    for request in requests {
        let url = request.url.clone();
        let job = sched
            .submit(request)
            .with_context(|| format!("schedule {}", url))?;
        urls.insert(job.id(), url);
    }
    let total = sched.len();
    tracing::info!(
        total,
        mode = %sched.mode(),
        root = %sched.download_root().display(),
        "fetch started"
    );

    // Without a bar, progress goes to the log instead.
    let (bar, reporter): (ProgressBar, Box<dyn ProgressReporter>) = if args.no_progress {
        (ProgressBar::hidden(), Box::new(LogProgress::new()))
    } else {
        let bar = ProgressBar::new(total as u64);
        (bar.clone(), Box::new(BarProgress::new(bar)))
    };
    let mut failed = 0usize;
    for job in sched.as_completed_with_progress(reporter, Some("fetch"), verbosity) {
        let url = urls.get(&job.id()).map(String::as_str).unwrap_or("?");
        match job.result() {
            Ok(path) => bar.suspend(|| println!("{}  {}", path.display(), url)),
            Err(e) => {
                failed += 1;
                tracing::warn!(job = %job.id(), "{} failed: {}", url, e);
                bar.suspend(|| eprintln!("failed  {}: {}", url, e));
            }
        }
    }
    sched.shutdown();

    if failed > 0 {
        bail!("{} of {} download(s) failed", failed, total);
    }
    Ok(())
}
