//! Progress tracking for export runs
//!
//! Displays a per-batch progress bar for long-running exports. The bar goes
//! to stderr, so it never mixes with the `--json` summary on stdout, and it
//! can be disabled for quiet or non-interactive use.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker over the batches of one export run.
pub struct ProgressTracker {
    /// Start time of the run.
    start_time: Instant,
    /// Progress bar (optional, can be disabled).
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    ///
    /// # Arguments
    /// * `total_batches` - Total batch count if known (None for unknown)
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total_batches: Option<u64>, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let pb = match total_batches {
                Some(n) => {
                    let bar = ProgressBar::new(n);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                            .unwrap()
                            .progress_chars("#>-"),
                    );
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} {pos} batches {msg}")
                            .unwrap(),
                    );
                    bar
                }
            };
            Some(pb)
        } else {
            None
        };

        Self {
            start_time: Instant::now(),
            bar,
        }
    }

    /// Mark a batch as about to be exported.
    ///
    /// # Arguments
    /// * `sequence` - 1-based sequence number of the batch being attempted
    /// * `file_name` - Output file the batch is written to
    pub fn batch_started(&self, sequence: u32, file_name: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_position(u64::from(sequence.saturating_sub(1)));
            bar.set_message(format!("→ {file_name}"));
        }
    }

    /// Mark a batch as completed.
    pub fn batch_finished(&self, sequence: u32) {
        if let Some(ref bar) = self.bar {
            bar.set_position(u64::from(sequence));

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = f64::from(sequence) / elapsed;
                bar.set_message(format!("({speed:.1} batches/sec)"));
            }
        }
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_with_total() {
        let tracker = ProgressTracker::new(Some(3), false);
        tracker.batch_started(1, "Export1.json");
        tracker.batch_finished(1);
        tracker.finish();
    }

    #[test]
    fn test_tracker_without_total() {
        let tracker = ProgressTracker::new(None, false);
        tracker.batch_started(1, "Export1.json");
        tracker.finish();
    }
}
