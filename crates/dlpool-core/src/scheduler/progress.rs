//! Progress reporting over an as-completed stream.
//!
//! [`WithProgress`] wraps any iterator of job handles and tells a
//! [`ProgressReporter`] about each item it passes through. It never
//! reorders, drops or waits on items; consumers can compute
//! rate = done / elapsed_secs and ETA = (total - done) / rate.

use std::time::Instant;

use crate::pool::{Job, JobStatus};

/// Snapshot of batch progress (CLI-friendly).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressStats {
    /// Jobs yielded so far.
    pub done: usize,
    /// Of those, how many failed or were cancelled.
    pub failed: usize,
    /// Jobs expected when iteration started.
    pub total: usize,
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Completed jobs per second (0 if elapsed is 0).
    pub fn jobs_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0 and work remains).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total.saturating_sub(self.done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.jobs_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.done as f64 / self.total as f64).min(1.0)
    }
}

/// Something that renders progress. All methods but `update` default to
/// doing nothing.
pub trait ProgressReporter {
    fn begin(&mut self, _total: usize, _description: Option<&str>, _verbosity: u8) {}

    fn update(&mut self, stats: &ProgressStats);

    fn finish(&mut self, _stats: &ProgressStats) {}
}

impl<R: ProgressReporter + ?Sized> ProgressReporter for Box<R> {
    fn begin(&mut self, total: usize, description: Option<&str>, verbosity: u8) {
        (**self).begin(total, description, verbosity)
    }

    fn update(&mut self, stats: &ProgressStats) {
        (**self).update(stats)
    }

    fn finish(&mut self, stats: &ProgressStats) {
        (**self).finish(stats)
    }
}

/// Reports through `tracing`: one line per completion at verbosity >= 2,
/// a summary at the end at verbosity >= 1, nothing at 0.
#[derive(Debug, Default)]
pub struct LogProgress {
    description: String,
    verbosity: u8,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgress {
    fn begin(&mut self, total: usize, description: Option<&str>, verbosity: u8) {
        self.description = description.unwrap_or("downloads").to_string();
        self.verbosity = verbosity;
        if verbosity >= 1 {
            tracing::info!("{}: waiting on {} job(s)", self.description, total);
        }
    }

    fn update(&mut self, stats: &ProgressStats) {
        if self.verbosity >= 2 {
            tracing::info!(
                "{}: {}/{} ({:.0}%)",
                self.description,
                stats.done,
                stats.total,
                stats.fraction() * 100.0
            );
        }
    }

    fn finish(&mut self, stats: &ProgressStats) {
        if self.verbosity >= 1 {
            tracing::info!(
                "{}: {} done, {} failed in {:.1}s",
                self.description,
                stats.done,
                stats.failed,
                stats.elapsed_secs
            );
        }
    }
}

/// Observer stage over an iterator of job handles.
pub struct WithProgress<I, R: ProgressReporter> {
    inner: I,
    reporter: R,
    stats: ProgressStats,
    started: Instant,
    finished: bool,
}

impl<I, R: ProgressReporter> WithProgress<I, R> {
    pub fn new(
        inner: I,
        total: usize,
        mut reporter: R,
        description: Option<&str>,
        verbosity: u8,
    ) -> Self {
        reporter.begin(total, description, verbosity);
        Self {
            inner,
            reporter,
            stats: ProgressStats {
                total,
                ..ProgressStats::default()
            },
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn stats(&self) -> &ProgressStats {
        &self.stats
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }
}

impl<I, O, R> Iterator for WithProgress<I, R>
where
    I: Iterator<Item = Job<O>>,
    R: ProgressReporter,
{
    type Item = Job<O>;

    fn next(&mut self) -> Option<Job<O>> {
        let item = self.inner.next();
        self.stats.elapsed_secs = self.started.elapsed().as_secs_f64();
        match &item {
            Some(job) => {
                self.stats.done += 1;
                if matches!(job.status(), JobStatus::Failed | JobStatus::Cancelled) {
                    self.stats.failed += 1;
                }
                self.reporter.update(&self.stats);
            }
            None if !self.finished => {
                self.finished = true;
                self.reporter.finish(&self.stats);
            }
            None => {}
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
