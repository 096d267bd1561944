//! End-to-end tests against the built `dlpool` binary: the process
//! strategy's worker protocol and the `fetch` command.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dlpool_core::pool::{JobStatus, Launcher, Mode};
use dlpool_core::scheduler::{DownloadRequest, DownloadScheduler, SchedulerOptions};
use dlpool_core::{Error, Result};
use tempfile::tempdir;

fn launcher() -> Launcher {
    Launcher::new(env!("CARGO_BIN_EXE_dlpool")).arg("worker")
}

fn process_scheduler(root: &Path, max_workers: usize) -> DownloadScheduler {
    process_scheduler_with_cache(root, max_workers, true)
}

fn process_scheduler_with_cache(root: &Path, max_workers: usize, cache: bool) -> DownloadScheduler {
    DownloadScheduler::new(SchedulerOptions {
        download_root: Some(root.to_path_buf()),
        mode: Mode::Process,
        max_workers: Some(max_workers),
        cache,
        verbosity: 0,
        launcher: Some(launcher()),
    })
    .unwrap()
}

fn refused_url(name: &str) -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    format!("http://127.0.0.1:{}/{}", port, name)
}

/// Answers every request with `body`. Returns the base URL.
fn serve(body: &'static [u8]) -> String {
    serve_counting(body).0
}

/// Like [`serve`], also returning the number of requests answered so far.
fn serve_counting(body: &'static [u8]) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for mut stream in listener.incoming().flatten() {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let mut buf = [0u8; 4096];
                if !matches!(stream.read(&mut buf), Ok(n) if n > 0) {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(body);
            });
        }
    });
    (format!("http://127.0.0.1:{}/", port), hits)
}

/// Accepts connections and never answers.
fn serve_nothing() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

#[test]
fn unreachable_urls_fail_in_worker_processes() {
    let root = tempdir().unwrap();
    let sched = process_scheduler(root.path(), 2);
    for i in 0..3 {
        sched
            .submit(DownloadRequest::new(refused_url(&format!("p{}.bin", i))))
            .unwrap();
    }
    assert_eq!(sched.len(), 3);
    let errors: Vec<Error> = sched
        .as_completed()
        .map(|job| job.result().unwrap_err())
        .collect();
    assert_eq!(errors.len(), 3);
    for err in errors {
        assert!(err.is_transfer(), "got {:?}", err);
    }
    assert!(sched.is_empty());
}

#[test]
fn worker_process_downloads_and_verifies() {
    let base = serve(b"hello\n");
    let root = tempdir().unwrap();
    let sched = process_scheduler(root.path(), 2);
    let good = sched
        .submit(DownloadRequest::new(format!("{}hello.txt", base)).hash_prefix("5891b5b522"))
        .unwrap();
    let bad = sched
        .submit(
            DownloadRequest::new(format!("{}other.txt", base))
                .dst("nested/other.txt")
                .hash_prefix("0000"),
        )
        .unwrap();

    assert_eq!(good.result().unwrap(), root.path().join("hello.txt"));
    assert_eq!(std::fs::read(root.path().join("hello.txt")).unwrap(), b"hello\n");
    assert!(matches!(bad.result(), Err(Error::Verification { .. })));
    assert!(!root.path().join("nested/other.txt").exists());
    assert_eq!(sched.as_completed().count(), 2);
}

#[test]
fn worker_processes_reuse_cached_files() {
    let (base, hits) = serve_counting(b"hello\n");
    let root = tempdir().unwrap();
    let sched = process_scheduler(root.path(), 2);
    let req = DownloadRequest::new(format!("{}hello.txt", base))
        .dst("cached/hello.txt")
        .hash_prefix("5891b5b522");

    let first = sched.submit(req.clone()).unwrap().result().unwrap();
    let second = sched.submit(req).unwrap().result().unwrap();
    assert_eq!(first, root.path().join("cached/hello.txt"));
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(sched.as_completed().count(), 2);
}

#[test]
fn concurrent_identical_downloads_in_worker_processes() {
    static BODY: [u8; 256 * 1024] = [7u8; 256 * 1024];
    let (base, hits) = serve_counting(&BODY);
    let root = tempdir().unwrap();
    let sched = process_scheduler_with_cache(root.path(), 4, false);
    let n = 6;
    for _ in 0..n {
        sched
            .submit(DownloadRequest::new(format!("{}same.bin", base)))
            .unwrap();
    }
    let paths: Vec<PathBuf> = sched
        .as_completed()
        .map(|job| job.result().unwrap_or_else(|e| panic!("job {} failed: {}", job.id(), e)))
        .collect();
    assert_eq!(paths, vec![root.path().join("same.bin"); n]);
    assert_eq!(hits.load(Ordering::SeqCst), n);
    assert_eq!(std::fs::read(root.path().join("same.bin")).unwrap(), &BODY[..]);
    let leftovers: Vec<_> = std::fs::read_dir(root.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
}

#[test]
fn shutdown_kills_running_workers() {
    let base = serve_nothing();
    let root = tempdir().unwrap();
    let sched = process_scheduler(root.path(), 1);
    let running = sched
        .submit(DownloadRequest::new(format!("{}slow.bin", base)))
        .unwrap();
    let queued = sched
        .submit(DownloadRequest::new(format!("{}later.bin", base)))
        .unwrap();
    while running.status() != JobStatus::Running {
        thread::sleep(Duration::from_millis(5));
    }

    sched.shutdown();
    assert_eq!(running.result(), Err(Error::Cancelled));
    assert_eq!(queued.result(), Err(Error::Cancelled));
    let statuses: Vec<_> = sched.as_completed().map(|j| j.status()).collect();
    assert_eq!(statuses, vec![JobStatus::Cancelled; 2]);
    assert!(matches!(
        sched.submit(DownloadRequest::new(format!("{}x", base))),
        Err(Error::Scheduling(_))
    ));
}

#[test]
fn worker_reports_malformed_payload() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_dlpool"))
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"not json")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let reply: Result<PathBuf> = serde_json::from_slice(&output.stdout).unwrap();
    match reply {
        Err(Error::Worker(msg)) => assert!(msg.contains("malformed"), "got {}", msg),
        other => panic!("expected worker error, got {:?}", other),
    }
}

fn dlpool(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_dlpool"));
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_STATE_HOME", home.join("state"))
        .env("XDG_CACHE_HOME", home.join("cache"));
    cmd
}

#[test]
fn fetch_prints_paths_and_uses_default_root() {
    let base = serve(b"hello\n");
    let home = tempdir().unwrap();
    let output = dlpool(home.path())
        .args(["fetch", "--no-progress", "--mode", "serial"])
        .arg(format!("{}greeting.txt", base))
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let expected = home.path().join("cache/dlpool/greeting.txt");
    assert!(stdout.contains(&expected.display().to_string()), "stdout: {}", stdout);
    assert_eq!(std::fs::read(&expected).unwrap(), b"hello\n");
    assert!(home.path().join("config/dlpool/config.toml").is_file());
}

#[test]
fn fetch_fails_when_any_download_fails() {
    let base = serve(b"hello\n");
    let home = tempdir().unwrap();
    let root = home.path().join("root");
    let output = dlpool(home.path())
        .args(["fetch", "--no-progress", "--max-workers", "2", "--download-root"])
        .arg(&root)
        .arg(format!("{}ok.txt", base))
        .arg(refused_url("gone.bin"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 of 2 download(s) failed"), "stderr: {}", stderr);
    assert!(root.join("ok.txt").is_file());
}
