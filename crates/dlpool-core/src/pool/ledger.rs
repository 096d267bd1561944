//! Outstanding-job bookkeeping and the as-completed iterator.
//!
//! The ledger is the pool's only shared mutable state: the set of jobs that
//! have been submitted but not yet yielded, plus the order in which they
//! reached a terminal state. One mutex guards both; a condvar wakes
//! iterators when a job finishes.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::job::{Job, JobId};

struct LedgerState<T> {
    outstanding: HashMap<JobId, Job<T>>,
    /// Terminal jobs not yet yielded, in completion order.
    finished: VecDeque<JobId>,
}

pub(crate) struct Ledger<T> {
    state: Mutex<LedgerState<T>>,
    changed: Condvar,
}

impl<T> Ledger<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                outstanding: HashMap::new(),
                finished: VecDeque::new(),
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn register(&self, job: &Job<T>) {
        self.state.lock().outstanding.insert(job.id(), job.clone());
    }

    /// Drop a job that never made it to an executor.
    pub(crate) fn unregister(&self, id: JobId) {
        let mut state = self.state.lock();
        state.outstanding.remove(&id);
        state.finished.retain(|f| *f != id);
    }

    pub(crate) fn mark_finished(&self, id: JobId) {
        let mut state = self.state.lock();
        if state.outstanding.contains_key(&id) {
            state.finished.push_back(id);
            self.changed.notify_all();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().outstanding.len()
    }

    pub(crate) fn pending(&self) -> usize {
        let state = self.state.lock();
        state.outstanding.len() - state.finished.len()
    }

    /// Jobs currently outstanding, for shutdown sweeps. Cloned out so the
    /// caller can change job state without holding the ledger lock.
    pub(crate) fn snapshot(&self) -> Vec<Job<T>> {
        self.state.lock().outstanding.values().cloned().collect()
    }
}

/// Lazy iterator over the jobs outstanding when it was created, yielding
/// each one as it reaches a terminal state.
///
/// Blocks in `next()` only while none of its jobs has finished yet. Jobs
/// submitted after the iterator was created are left for a later call.
pub struct AsCompleted<T> {
    ledger: Arc<Ledger<T>>,
    remaining: HashSet<JobId>,
}

impl<T> AsCompleted<T> {
    pub(crate) fn new(ledger: Arc<Ledger<T>>) -> Self {
        let remaining = ledger.state.lock().outstanding.keys().copied().collect();
        Self { ledger, remaining }
    }

    /// Jobs this iterator has yet to yield.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl<T> Iterator for AsCompleted<T> {
    type Item = Job<T>;

    fn next(&mut self) -> Option<Job<T>> {
        if self.remaining.is_empty() {
            return None;
        }
        let mut state = self.ledger.state.lock();
        loop {
            let pos = state
                .finished
                .iter()
                .position(|id| self.remaining.contains(id));
            if let Some(id) = pos.and_then(|p| state.finished.remove(p)) {
                self.remaining.remove(&id);
                if let Some(job) = state.outstanding.remove(&id) {
                    return Some(job);
                }
                continue;
            }

            // Another iterator may have yielded some of ours.
            let outstanding = &state.outstanding;
            self.remaining.retain(|id| outstanding.contains_key(id));
            if self.remaining.is_empty() {
                return None;
            }
            self.ledger.changed.wait(&mut state);
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining.len()))
    }
}
