//! Job handle: a future-like view of one submitted unit of work.
//!
//! The handle is a cheap clone of an `Arc`. All state changes go through
//! [`Job::transition`], which enforces the monotonic state machine
//! Pending → Running → {Succeeded | Failed | Cancelled} (plus Pending →
//! Cancelled) and wakes anyone blocked in `result()`.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use super::ledger::Ledger;
use crate::error::{Error, Result};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a job, carrying its outcome once terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState<T> {
    Pending,
    Running,
    Succeeded(T),
    Failed(Error),
    Cancelled,
}

impl<T> JobState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded(_) | JobState::Failed(_) | JobState::Cancelled
        )
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Running => JobStatus::Running,
            JobState::Succeeded(_) => JobStatus::Succeeded,
            JobState::Failed(_) => JobStatus::Failed,
            JobState::Cancelled => JobStatus::Cancelled,
        }
    }
}

/// Payload-free copy of [`JobState`] for cheap polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

struct JobInner<T> {
    id: JobId,
    state: Mutex<JobState<T>>,
    settled: Condvar,
    ledger: Weak<Ledger<T>>,
}

/// Caller-held handle to a submitted job.
pub struct Job<T> {
    inner: Arc<JobInner<T>>,
}

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Job<T> {
    pub(crate) fn new(ledger: Weak<Ledger<T>>) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: JobId::next(),
                state: Mutex::new(JobState::Pending),
                settled: Condvar::new(),
                ledger,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn status(&self) -> JobStatus {
        self.inner.state.lock().status()
    }

    /// True once the job is Succeeded, Failed or Cancelled.
    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// The single state-update entry point. Returns false (and changes
    /// nothing) when the move is not allowed from the current state.
    fn transition(&self, next: JobState<T>) -> bool {
        let mut state = self.inner.state.lock();
        let allowed = match (&*state, &next) {
            (JobState::Pending, JobState::Running) => true,
            (JobState::Pending, JobState::Cancelled) => true,
            (JobState::Running, n) => n.is_terminal(),
            _ => false,
        };
        if !allowed {
            return false;
        }
        let terminal = next.is_terminal();
        *state = next;
        drop(state);

        if terminal {
            self.inner.settled.notify_all();
            // Ledger lock is taken after the job lock is released.
            if let Some(ledger) = self.inner.ledger.upgrade() {
                ledger.mark_finished(self.inner.id);
            }
        }
        true
    }

    /// Pending → Running. False if the job was cancelled while queued.
    pub(crate) fn start(&self) -> bool {
        self.transition(JobState::Running)
    }

    pub(crate) fn cancel(&self) -> bool {
        self.transition(JobState::Cancelled)
    }

    /// Record a task outcome. An `Error::Cancelled` outcome lands in the
    /// Cancelled state rather than Failed.
    pub(crate) fn settle(&self, outcome: Result<T>) -> bool {
        match outcome {
            Ok(value) => self.transition(JobState::Succeeded(value)),
            Err(Error::Cancelled) => self.transition(JobState::Cancelled),
            Err(e) => self.transition(JobState::Failed(e)),
        }
    }
}

impl<T: Clone> Job<T> {
    /// Snapshot of the current state, payload included.
    pub fn state(&self) -> JobState<T> {
        self.inner.state.lock().clone()
    }

    /// Block until the job is terminal, then return its outcome. Calling it
    /// again returns the same outcome.
    pub fn result(&self) -> Result<T> {
        let mut state = self.inner.state.lock();
        while !state.is_terminal() {
            self.inner.settled.wait(&mut state);
        }
        outcome_of(&state)
    }

    /// Non-blocking: `None` while the job is still Pending or Running.
    pub fn try_result(&self) -> Option<Result<T>> {
        let state = self.inner.state.lock();
        state.is_terminal().then(|| outcome_of(&state))
    }

    /// Like `result()` but gives up after `timeout`, returning `None`.
    pub fn result_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while !state.is_terminal() {
            if self
                .inner
                .settled
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }
        state.is_terminal().then(|| outcome_of(&state))
    }
}

fn outcome_of<T: Clone>(state: &JobState<T>) -> Result<T> {
    match state {
        JobState::Succeeded(v) => Ok(v.clone()),
        JobState::Failed(e) => Err(e.clone()),
        JobState::Cancelled => Err(Error::Cancelled),
        JobState::Pending | JobState::Running => {
            unreachable!("outcome requested for a non-terminal job")
        }
    }
}

/// Run a task body, turning a panic into `Error::Worker` so one bad task
/// cannot take down a worker thread.
pub(crate) fn run_guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(Error::Worker(format!("task panicked: {}", msg)))
        }
    }
}
