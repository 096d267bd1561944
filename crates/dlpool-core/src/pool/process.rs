//! Process-isolated executor and the worker side of its protocol.
//!
//! Each job runs in a freshly spawned child. The parent writes the task's
//! JSON payload to the child's stdin and closes it; the child answers with
//! one JSON `Result<Output, Error>` on stdout and exits. Only the payload
//! crosses the boundary, so the child must know how to rebuild the task
//! from it (see [`serve_worker`]).

use anyhow::Context;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use super::job::{Job, JobId};
use super::thread::Dispatcher;
use super::{Executor, Mode, RemoteTask};
use crate::error::{Error, Result};

/// Command used to start a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The running executable with a `worker` argument, i.e. `dlpool worker`.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

#[derive(Default)]
struct Children {
    live: HashMap<JobId, Child>,
    closed: bool,
}

/// Runs each job in its own child process, at most `max_workers` at once.
pub struct ProcessExecutor<T: RemoteTask> {
    dispatcher: Dispatcher<T>,
    children: Arc<Mutex<Children>>,
}

impl<T> ProcessExecutor<T>
where
    T: RemoteTask,
    T::Output: DeserializeOwned,
{
    /// `max_workers = None` caps concurrency at the machine's available
    /// parallelism.
    pub fn new(max_workers: Option<usize>, launcher: Launcher) -> Self {
        let max_workers = max_workers.unwrap_or_else(default_process_workers);
        let children = Arc::new(Mutex::new(Children::default()));
        let run_children = Arc::clone(&children);
        let run = move |id: JobId, task: T| run_in_child(&launcher, &run_children, id, &task);
        Self {
            dispatcher: Dispatcher::new("process", Some(max_workers), Arc::new(run)),
            children,
        }
    }
}

fn default_process_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn run_in_child<T>(
    launcher: &Launcher,
    children: &Mutex<Children>,
    id: JobId,
    task: &T,
) -> Result<T::Output>
where
    T: RemoteTask,
    T::Output: DeserializeOwned,
{
    let payload = serde_json::to_vec(&task.payload())
        .map_err(|e| Error::Worker(format!("encode task payload: {}", e)))?;

    let mut child = launcher.command().spawn().map_err(|e| {
        Error::Worker(format!("spawn {}: {}", launcher.program.display(), e))
    })?;
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    {
        let mut guard = children.lock();
        if guard.closed {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Cancelled);
        }
        guard.live.insert(id, child);
    }
    tracing::debug!(job = %id, "worker process started");

    // A child that dies early makes these fail; its exit is judged below.
    if let Some(mut stdin) = stdin {
        let _ = stdin.write_all(&payload);
    }
    let mut reply = Vec::new();
    if let Some(mut stdout) = stdout {
        let _ = stdout.read_to_end(&mut reply);
    }

    let Some(mut child) = children.lock().live.remove(&id) else {
        // Taken and killed by shutdown.
        return Err(Error::Cancelled);
    };
    let status = child
        .wait()
        .map_err(|e| Error::Worker(format!("wait for worker: {}", e)))?;

    match serde_json::from_slice::<Result<T::Output>>(&reply) {
        Ok(outcome) => outcome,
        Err(e) => Err(Error::Worker(format!(
            "worker exited with {} without a readable reply: {}",
            status, e
        ))),
    }
}

impl<T> Executor<T> for ProcessExecutor<T>
where
    T: RemoteTask,
    T::Output: DeserializeOwned,
{
    fn mode(&self) -> Mode {
        Mode::Process
    }

    fn max_workers(&self) -> Option<usize> {
        self.dispatcher.max_workers()
    }

    fn dispatch(&self, job: Job<T::Output>, task: T) -> Result<()> {
        self.dispatcher.dispatch(job, task)
    }

    fn shutdown(&self) {
        self.dispatcher.close();
        let doomed: Vec<(JobId, Child)> = {
            let mut guard = self.children.lock();
            guard.closed = true;
            guard.live.drain().collect()
        };
        for (id, mut child) in doomed {
            tracing::debug!(job = %id, "killing worker process");
            if let Err(e) = child.kill() {
                tracing::warn!(job = %id, "kill worker: {}", e);
            }
            let _ = child.wait();
        }
        self.dispatcher.join();
    }
}

/// Worker side: read one payload from stdin, run `handler`, write the
/// outcome to stdout. Call this from the subcommand a [`Launcher`] starts.
pub fn serve_worker<P, O, F>(handler: F) -> anyhow::Result<()>
where
    P: DeserializeOwned,
    O: Serialize,
    F: FnOnce(P) -> Result<O>,
{
    let mut input = Vec::new();
    std::io::stdin()
        .lock()
        .read_to_end(&mut input)
        .context("read task from stdin")?;

    let reply: Result<O> = match serde_json::from_slice::<P>(&input) {
        Ok(payload) => handler(payload),
        Err(e) => Err(Error::Worker(format!("malformed task payload: {}", e))),
    };

    let mut out = std::io::stdout().lock();
    serde_json::to_writer(&mut out, &reply).context("write reply to stdout")?;
    out.flush().context("flush stdout")?;
    Ok(())
}
