//! Serial executor: runs each job inline inside `submit`.
//!
//! A running task may submit to or shut down its own pool. Nested
//! submissions run inline on the same thread; shutdown only flips a flag.

use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::job::{run_guarded, Job};
use super::{Executor, Mode, Task};
use crate::error::{Error, Result};

/// Runs every job synchronously on the submitting thread, one at a time.
/// Handles returned by `submit` are already terminal.
pub struct SerialExecutor {
    /// Held while a job runs. Re-entrant so a task can submit to its own
    /// pool; other submitting threads wait their turn.
    running: ReentrantMutex<()>,
    closed: AtomicBool,
}

impl SerialExecutor {
    pub fn new() -> Self {
        Self {
            running: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Task> Executor<T> for SerialExecutor {
    fn mode(&self) -> Mode {
        Mode::Serial
    }

    fn max_workers(&self) -> Option<usize> {
        Some(1)
    }

    fn dispatch(&self, job: Job<T::Output>, task: T) -> Result<()> {
        let _turn = self.running.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Scheduling("pool is shut down".into()));
        }
        if job.start() {
            job.settle(run_guarded(|| task.run()));
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
