//! Progress reporting boundary.
//!
//! The coordinator only talks to [`ProgressSink`]; how progress is shown is
//! up to the shell. The CLI uses [`TerminalProgress`].

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::job::ProgressUpdate;

pub trait ProgressSink: Send + Sync {
    fn probe_started(&self) {}

    fn probe_finished(&self, _found: usize) {}

    /// Called once per completed segment.
    fn segment_completed(&self, update: ProgressUpdate);

    fn assembly_started(&self, _segments: usize) {}
}

/// Discards every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn segment_completed(&self, _update: ProgressUpdate) {}
}

/// Spinner while probing, then a bar over segments.
pub struct TerminalProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut guard) = self.bar.lock() {
            f(&mut guard);
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_update(update: &ProgressUpdate) -> String {
    format!(
        "({}/{}, {}, {:.1}% success)",
        update.completed,
        update.total,
        HumanBytes(update.bytes_so_far),
        update.success_ratio * 100.0
    )
}

impl ProgressSink for TerminalProgress {
    fn probe_started(&self) {
        self.with_bar(|slot| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap(),
            );
            spinner.set_message("Detecting available segments...");
            spinner.enable_steady_tick(Duration::from_millis(100));
            *slot = Some(spinner);
        });
    }

    fn probe_finished(&self, found: usize) {
        self.with_bar(|slot| {
            if let Some(spinner) = slot.take() {
                spinner.finish_with_message(format!("Found {} segments available", found));
            }
        });
    }

    fn segment_completed(&self, update: ProgressUpdate) {
        self.with_bar(|slot| {
            let bar = slot.get_or_insert_with(|| {
                let bar = ProgressBar::new(update.total as u64);
                bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                        .unwrap()
                        .progress_chars("=>-"),
                );
                bar
            });
            bar.set_position(update.completed as u64);
            bar.set_message(format_update(&update));
            if update.completed >= update.total {
                bar.finish();
            }
        });
    }

    fn assembly_started(&self, segments: usize) {
        self.with_bar(|slot| {
            if let Some(bar) = slot.take() {
                bar.finish();
            }
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
            spinner.set_message(format!("Combining {} segments...", segments));
            spinner.enable_steady_tick(Duration::from_millis(100));
            *slot = Some(spinner);
        });
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_and_clear();
            }
        }
    }
}
