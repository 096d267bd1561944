//! OS-thread executor.
//!
//! Jobs go into a FIFO queue; worker threads pop from the front so dispatch
//! follows submission order. Workers are spawned on demand: a new one starts
//! whenever queued jobs outnumber idle workers and the `max_workers` cap (if
//! any) allows it. With no cap this degenerates to one thread per
//! concurrently queued job.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use super::job::{run_guarded, Job, JobId};
use super::{Executor, Mode, Task};
use crate::error::{Error, Result};

/// Body run by a worker for each job it takes off the queue.
pub(crate) type RunFn<T> = dyn Fn(JobId, T) -> Result<<T as Task>::Output> + Send + Sync;

struct Queue<T: Task> {
    items: VecDeque<(Job<T::Output>, T)>,
    idle: usize,
    live: usize,
    spawned: usize,
    closed: bool,
}

struct Shared<T: Task> {
    queue: Mutex<Queue<T>>,
    available: Condvar,
}

/// Queue plus on-demand worker threads. Shared by the thread and process
/// executors; they differ only in the body each worker runs.
pub(crate) struct Dispatcher<T: Task> {
    shared: Arc<Shared<T>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    max_workers: Option<usize>,
    run: Arc<RunFn<T>>,
    name: &'static str,
}

impl<T: Task> Dispatcher<T> {
    pub(crate) fn new(name: &'static str, max_workers: Option<usize>, run: Arc<RunFn<T>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    idle: 0,
                    live: 0,
                    spawned: 0,
                    closed: false,
                }),
                available: Condvar::new(),
            }),
            handles: Mutex::new(Vec::new()),
            max_workers: max_workers.map(|m| m.max(1)),
            run,
            name,
        }
    }

    pub(crate) fn max_workers(&self) -> Option<usize> {
        self.max_workers
    }

    pub(crate) fn dispatch(&self, job: Job<T::Output>, task: T) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        if queue.closed {
            return Err(Error::Scheduling("pool is shut down".into()));
        }
        queue.items.push_back((job, task));
        let under_cap = self.max_workers.map_or(true, |max| queue.live < max);
        if queue.items.len() > queue.idle && under_cap {
            queue.live += 1;
            queue.spawned += 1;
            let index = queue.spawned;
            match self.spawn_worker(index) {
                Ok(handle) => self.handles.lock().push(handle),
                Err(e) => {
                    queue.live -= 1;
                    tracing::warn!("could not spawn {} worker: {}", self.name, e);
                    if queue.live == 0 {
                        queue.items.pop_back();
                        return Err(Error::Scheduling(format!("no worker available: {}", e)));
                    }
                }
            }
        }
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    fn spawn_worker(&self, index: usize) -> std::io::Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        let run = Arc::clone(&self.run);
        std::thread::Builder::new()
            .name(format!("dlpool-{}-{}", self.name, index))
            .spawn(move || worker_loop(&shared, run.as_ref()))
    }

    /// Stop accepting work and cancel everything still queued. Returns
    /// false if the dispatcher was already closed.
    pub(crate) fn close(&self) -> bool {
        let drained: Vec<_> = {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                return false;
            }
            queue.closed = true;
            queue.items.drain(..).collect()
        };
        for (job, _task) in drained {
            job.cancel();
        }
        self.shared.available.notify_all();
        true
    }

    /// Wait for worker threads to exit. Running jobs finish first.
    pub(crate) fn join(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        let current = std::thread::current().id();
        for handle in handles {
            // A job that shuts down its own pool must not join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("{} worker exited by panic", self.name);
            }
        }
    }
}

fn worker_loop<T: Task>(shared: &Shared<T>, run: &RunFn<T>) {
    loop {
        let (job, task) = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(item) = queue.items.pop_front() {
                    break item;
                }
                if queue.closed {
                    queue.live -= 1;
                    return;
                }
                queue.idle += 1;
                shared.available.wait(&mut queue);
                queue.idle -= 1;
            }
        };
        if !job.start() {
            continue;
        }
        let id = job.id();
        tracing::debug!(job = %id, "job started");
        let outcome = run_guarded(|| run(id, task));
        if let Err(e) = &outcome {
            tracing::debug!(job = %id, "job failed: {}", e);
        }
        job.settle(outcome);
    }
}

/// Runs each job's task on a pool thread.
pub struct ThreadExecutor<T: Task> {
    dispatcher: Dispatcher<T>,
}

impl<T: Task> ThreadExecutor<T> {
    /// `max_workers = None` means unbounded.
    pub fn new(max_workers: Option<usize>) -> Self {
        let run = |_id: JobId, task: T| task.run();
        Self {
            dispatcher: Dispatcher::new("thread", max_workers, Arc::new(run)),
        }
    }
}

impl<T: Task> Executor<T> for ThreadExecutor<T> {
    fn mode(&self) -> Mode {
        Mode::Thread
    }

    fn max_workers(&self) -> Option<usize> {
        self.dispatcher.max_workers()
    }

    fn dispatch(&self, job: Job<T::Output>, task: T) -> Result<()> {
        self.dispatcher.dispatch(job, task)
    }

    fn shutdown(&self) {
        if self.dispatcher.close() {
            tracing::debug!("thread executor closed; waiting for running jobs");
        }
        self.dispatcher.join();
    }
}
