//! Worker pool with a pluggable concurrency strategy.
//!
//! A [`WorkerPool`] accepts tasks, runs them through an [`Executor`]
//! (thread, process or serial) and hands back a [`Job`] handle per
//! submission. [`WorkerPool::as_completed`] yields handles in the order
//! their jobs finish.

mod job;
mod ledger;
mod process;
mod serial;
mod thread;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::Result;
use ledger::Ledger;

pub use job::{Job, JobId, JobState, JobStatus};
pub use ledger::AsCompleted;
pub use process::{serve_worker, Launcher, ProcessExecutor};
pub use serial::SerialExecutor;
pub use thread::ThreadExecutor;

/// A unit of work the pool can run.
pub trait Task: Send + 'static {
    type Output: Clone + Send + 'static;

    fn run(self) -> Result<Self::Output>;
}

/// A task that can run in another process. Only `payload()` crosses the
/// boundary; the worker rebuilds whatever else it needs.
pub trait RemoteTask: Task {
    type Payload: Serialize;

    fn payload(&self) -> Self::Payload;
}

/// Boxed closure task, for pools of ad-hoc work.
pub struct BoxTask<O>(Box<dyn FnOnce() -> Result<O> + Send>);

impl<O> BoxTask<O> {
    pub fn new(f: impl FnOnce() -> Result<O> + Send + 'static) -> Self {
        BoxTask(Box::new(f))
    }
}

impl<O: Clone + Send + 'static> Task for BoxTask<O> {
    type Output = O;

    fn run(self) -> Result<O> {
        (self.0)()
    }
}

/// Concurrency strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Thread,
    Process,
    Serial,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Thread => "thread",
            Mode::Process => "process",
            Mode::Serial => "serial",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" => Ok(Mode::Thread),
            "process" => Ok(Mode::Process),
            "serial" => Ok(Mode::Serial),
            other => Err(format!(
                "unknown mode '{}' (expected thread, process or serial)",
                other
            )),
        }
    }
}

/// Strategy capability: the one seam between the pool and how jobs run.
pub trait Executor<T: Task>: Send + Sync {
    fn mode(&self) -> Mode;

    /// Concurrency cap; `None` when unbounded.
    fn max_workers(&self) -> Option<usize>;

    /// Take ownership of a registered, Pending job. Must fail with
    /// `Error::Scheduling` once shut down.
    fn dispatch(&self, job: Job<T::Output>, task: T) -> Result<()>;

    /// Cancel queued jobs, settle or abandon running ones, release
    /// resources. Must be idempotent.
    fn shutdown(&self);
}

pub struct WorkerPool<T: Task> {
    executor: Box<dyn Executor<T>>,
    ledger: Arc<Ledger<T::Output>>,
}

impl<T: Task> WorkerPool<T> {
    pub fn with_executor(executor: Box<dyn Executor<T>>) -> Self {
        tracing::info!(
            mode = %executor.mode(),
            max_workers = ?executor.max_workers(),
            "worker pool created"
        );
        Self {
            executor,
            ledger: Arc::new(Ledger::new()),
        }
    }

    /// Thread strategy; `None` means unbounded.
    pub fn thread(max_workers: Option<usize>) -> Self {
        Self::with_executor(Box::new(ThreadExecutor::new(max_workers)))
    }

    pub fn serial() -> Self {
        Self::with_executor(Box::new(SerialExecutor::new()))
    }

    pub fn mode(&self) -> Mode {
        self.executor.mode()
    }

    pub fn max_workers(&self) -> Option<usize> {
        self.executor.max_workers()
    }

    /// Schedule `task` and return its handle without waiting for it (except
    /// under the serial strategy, where the task has already run).
    pub fn submit(&self, task: T) -> Result<Job<T::Output>> {
        let job = Job::new(Arc::downgrade(&self.ledger));
        let id = job.id();
        self.ledger.register(&job);
        if let Err(e) = self.executor.dispatch(job.clone(), task) {
            self.ledger.unregister(id);
            return Err(e);
        }
        tracing::debug!(job = %id, "job submitted");
        Ok(job)
    }

    /// Lazily yield every currently outstanding job as it finishes.
    pub fn as_completed(&self) -> AsCompleted<T::Output> {
        AsCompleted::new(Arc::clone(&self.ledger))
    }

    /// Jobs submitted and not yet yielded by `as_completed`.
    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outstanding jobs that have not reached a terminal state.
    pub fn pending(&self) -> usize {
        self.ledger.pending()
    }

    /// Stop accepting work and release workers. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.executor.shutdown();
        // Executors settle everything they own; this only catches a job
        // whose dispatch raced with shutdown.
        for job in self.ledger.snapshot() {
            if job.status() == JobStatus::Pending {
                job.cancel();
            }
        }
        tracing::debug!(outstanding = self.len(), "worker pool shut down");
    }
}

impl<O: Clone + Send + 'static> WorkerPool<BoxTask<O>> {
    /// Convenience for closure pools.
    pub fn submit_fn(
        &self,
        f: impl FnOnce() -> Result<O> + Send + 'static,
    ) -> Result<Job<O>> {
        self.submit(BoxTask::new(f))
    }
}

impl<T> WorkerPool<T>
where
    T: RemoteTask,
    T::Output: DeserializeOwned,
{
    pub fn process(max_workers: Option<usize>, launcher: Launcher) -> Self {
        Self::with_executor(Box::new(ProcessExecutor::new(max_workers, launcher)))
    }

    /// Build a pool for `mode`. `launcher` is only used by the process
    /// strategy.
    pub fn new(mode: Mode, max_workers: Option<usize>, launcher: Launcher) -> Self {
        match mode {
            Mode::Thread => Self::thread(max_workers),
            Mode::Process => Self::process(max_workers, launcher),
            Mode::Serial => Self::serial(),
        }
    }
}

impl<T: Task> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.executor.shutdown();
    }
}

impl<T: Task> fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("mode", &self.mode())
            .field("max_workers", &self.max_workers())
            .field("outstanding", &self.len())
            .finish()
    }
}
