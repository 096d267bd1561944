//! Scheduler behaviour with an in-memory transfer standing in for the
//! network: completion, caching, verification and shutdown.

mod common;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dlpool_core::hash::Hasher;
use dlpool_core::pool::{JobStatus, Mode};
use dlpool_core::scheduler::{DownloadRequest, DownloadScheduler, ProgressReporter, ProgressStats, SchedulerOptions};
use dlpool_core::transfer::{CurlTransfer, Transfer, TransferRequest};
use dlpool_core::{Error, Result};
use tempfile::tempdir;

const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

/// Writes "hello\n" to the destination, verifies it, and counts calls.
#[derive(Default)]
struct HelloTransfer {
    calls: AtomicUsize,
}

impl Transfer for HelloTransfer {
    fn fetch(&self, request: &TransferRequest) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dest = request.destination();
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Worker(e.to_string()))?;
        }
        std::fs::write(&dest, b"hello\n").map_err(|e| Error::Worker(e.to_string()))?;
        request.verify(&dest)?;
        Ok(dest)
    }
}

fn options(root: &Path, mode: Mode, max_workers: Option<usize>) -> SchedulerOptions {
    SchedulerOptions {
        download_root: Some(root.to_path_buf()),
        mode,
        max_workers,
        ..SchedulerOptions::default()
    }
}

#[test]
fn unreachable_urls_fail_with_transfer_errors() {
    let root = tempdir().unwrap();
    let sched = DownloadScheduler::with_transfer(
        options(root.path(), Mode::Thread, Some(2)),
        Arc::new(CurlTransfer::default()),
    )
    .unwrap();
    let submitted: HashSet<_> = (0..3)
        .map(|i| {
            let url = common::static_server::refused_url(&format!("f{}.bin", i));
            sched.submit(DownloadRequest::new(url)).unwrap().id()
        })
        .collect();

    let mut seen = HashSet::new();
    for job in sched.as_completed() {
        assert_eq!(job.status(), JobStatus::Failed);
        let err = job.result().unwrap_err();
        assert!(err.is_transfer(), "got {:?}", err);
        seen.insert(job.id());
    }
    assert_eq!(seen, submitted);
    assert!(sched.is_empty());
}

#[test]
fn cached_request_transfers_once() {
    let root = tempdir().unwrap();
    let transfer = Arc::new(HelloTransfer::default());
    let sched = DownloadScheduler::with_transfer(
        options(root.path(), Mode::Thread, Some(2)),
        transfer.clone(),
    )
    .unwrap();
    let request = DownloadRequest::new("https://example.com/hello.txt")
        .dst("greeting.txt")
        .hash_prefix(&HELLO_SHA256[..12]);

    let first = sched.submit(request.clone()).unwrap().result().unwrap();
    let second = sched.submit(request).unwrap().result().unwrap();
    assert_eq!(first, second);
    assert_eq!(first, root.path().join("greeting.txt"));
    assert_eq!(transfer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sched.as_completed().count(), 2);
}

#[test]
fn cache_disabled_transfers_every_time() {
    let root = tempdir().unwrap();
    let transfer = Arc::new(HelloTransfer::default());
    let opts = SchedulerOptions {
        cache: false,
        ..options(root.path(), Mode::Serial, None)
    };
    let sched = DownloadScheduler::with_transfer(opts, transfer.clone()).unwrap();
    for _ in 0..2 {
        sched
            .submit(DownloadRequest::new("https://example.com/hello.txt"))
            .unwrap()
            .result()
            .unwrap();
    }
    assert_eq!(transfer.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn wrong_hash_prefix_is_a_verification_error() {
    let root = tempdir().unwrap();
    let sched = DownloadScheduler::with_transfer(
        options(root.path(), Mode::Thread, None),
        Arc::new(HelloTransfer::default()),
    )
    .unwrap();
    let job = sched
        .submit(
            DownloadRequest::new("https://example.com/hello.txt")
                .hash_prefix("deadbeef")
                .hasher(Hasher::Sha256),
        )
        .unwrap();
    match job.result() {
        Err(Error::Verification { expected, actual, .. }) => {
            assert_eq!(expected, "deadbeef");
            assert_eq!(actual, HELLO_SHA256);
        }
        other => panic!("expected verification error, got {:?}", other),
    }
    // Repeat calls see the same failure.
    assert_eq!(job.result(), job.result());
}

#[test]
fn serial_completes_in_submission_order() {
    let root = tempdir().unwrap();
    let sched = DownloadScheduler::with_transfer(
        options(root.path(), Mode::Serial, None),
        Arc::new(HelloTransfer::default()),
    )
    .unwrap();
    let ids: Vec<_> = (0..6)
        .map(|i| {
            sched
                .submit(DownloadRequest::new(format!("https://example.com/{}.txt", i)))
                .unwrap()
                .id()
        })
        .collect();
    assert_eq!(sched.len(), 6);
    assert_eq!(sched.pending(), 0);
    let yielded: Vec<_> = (&sched).into_iter().map(|j| j.id()).collect();
    assert_eq!(yielded, ids);
    for i in 0..6 {
        assert!(root.path().join(format!("{}.txt", i)).is_file());
    }
}

#[test]
fn submit_after_shutdown_is_a_scheduling_error() {
    let root = tempdir().unwrap();
    for mode in [Mode::Thread, Mode::Serial] {
        let sched = DownloadScheduler::with_transfer(
            options(root.path(), mode, Some(1)),
            Arc::new(HelloTransfer::default()),
        )
        .unwrap();
        sched.shutdown();
        sched.shutdown();
        for _ in 0..2 {
            assert!(matches!(
                sched.submit(DownloadRequest::new("https://example.com/a")),
                Err(Error::Scheduling(_))
            ));
        }
        assert!(sched.is_empty());
    }
}

#[derive(Default)]
struct Tally {
    total: usize,
    last: ProgressStats,
    finished: bool,
}

impl ProgressReporter for &mut Tally {
    fn begin(&mut self, total: usize, _description: Option<&str>, _verbosity: u8) {
        self.total = total;
    }

    fn update(&mut self, stats: &ProgressStats) {
        self.last = stats.clone();
    }

    fn finish(&mut self, _stats: &ProgressStats) {
        self.finished = true;
    }
}

#[test]
fn progress_counts_successes_and_failures() {
    let root = tempdir().unwrap();
    let sched = DownloadScheduler::with_transfer(
        options(root.path(), Mode::Thread, Some(3)),
        Arc::new(HelloTransfer::default()),
    )
    .unwrap();
    for i in 0..4 {
        let mut req = DownloadRequest::new(format!("https://example.com/p{}.txt", i));
        if i % 2 == 1 {
            req = req.hash_prefix("0000");
        }
        sched.submit(req).unwrap();
    }
    let mut tally = Tally::default();
    let yielded = sched
        .as_completed_with_progress(&mut tally, Some("test"), 0)
        .count();
    assert_eq!(yielded, 4);
    assert_eq!(tally.total, 4);
    assert_eq!(tally.last.done, 4);
    assert_eq!(tally.last.failed, 2);
    assert!(tally.finished);
}
