//! Terminal progress bar for `dlpool fetch`.

use dlpool_core::scheduler::{ProgressReporter, ProgressStats};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Draws completed/total jobs on an indicatif bar. Hidden at verbosity 0.
/// Keep a clone of the bar to print through `ProgressBar::suspend`.
pub struct BarProgress {
    bar: ProgressBar,
    description: String,
}

impl BarProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            description: String::new(),
        }
    }
}

impl ProgressReporter for BarProgress {
    fn begin(&mut self, total: usize, description: Option<&str>, verbosity: u8) {
        if verbosity == 0 {
            self.bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})",
        ) {
            self.bar.set_style(style.progress_chars("█▓▒░  "));
        }
        self.description = description.unwrap_or("downloads").to_string();
        self.bar.set_length(total as u64);
        self.bar.set_message(self.description.clone());
    }

    fn update(&mut self, stats: &ProgressStats) {
        self.bar.set_position(stats.done as u64);
        if stats.failed > 0 {
            self.bar
                .set_message(format!("{} ({} failed)", self.description, stats.failed));
        }
    }

    fn finish(&mut self, stats: &ProgressStats) {
        if stats.failed == 0 {
            self.bar.finish_with_message(format!(
                "{}: {} done in {:.1}s",
                self.description, stats.done, stats.elapsed_secs
            ));
        } else {
            self.bar.abandon_with_message(format!(
                "{}: {} of {} failed",
                self.description, stats.failed, stats.done
            ));
        }
    }
}
