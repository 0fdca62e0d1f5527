//! Progress reporting.
//!
//! This module defines the QueueObserver trait, which decouples the driver
//! loop from how queue snapshots are presented, and the terminal observer the
//! CLI uses.

use std::cell::Cell;
use std::time::{Duration, Instant};

use queue::{QueueState, Status};

/// Receives every snapshot the driver produces.
///
/// All methods are called on the driver thread, in dispatch order.
pub trait QueueObserver {
    /// Called once with the snapshot after the initial files were appended.
    fn on_started(&self, state: &QueueState);

    /// Called after each applied event with the previous and new snapshot.
    fn on_transition(&self, previous: &QueueState, next: &QueueState);

    /// Called once the queue has drained.
    fn on_finished(&self, state: &QueueState);
}

/// Terminal observer writing to stderr.
pub struct CliReport {
    verbose: bool,
    start_time: Instant,
    last_progress_update: Cell<Instant>,
}

impl CliReport {
    pub fn new(verbose: bool) -> Self {
        let now = Instant::now();
        CliReport {
            verbose,
            start_time: now,
            last_progress_update: Cell::new(now),
        }
    }

    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    pub fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    pub fn progress_bar(fraction: f64) -> String {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0) as u32;
        let filled = (percent / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    /// One line per item whose status changed between two snapshots.
    pub fn status_changes(previous: &QueueState, next: &QueueState) -> Vec<String> {
        next.items
            .iter()
            .filter_map(|item| {
                let before = previous.get(item.name()).map(|prev| prev.status);
                if before == Some(item.status) {
                    return None;
                }
                let line = match (&item.err, item.status.is_failure()) {
                    (Some(err), true) => format!("{}: {} ({})", item.name(), item.status, err),
                    _ => format!("{}: {}", item.name(), item.status),
                };
                Some(line)
            })
            .collect()
    }
}

impl QueueObserver for CliReport {
    fn on_started(&self, state: &QueueState) {
        let total: u64 = state.items.iter().map(|item| item.file.size()).sum();
        eprintln!(
            "Queued {} files ({})",
            state.items.len(),
            Self::format_bytes(total)
        );
    }

    fn on_transition(&self, previous: &QueueState, next: &QueueState) {
        let changes = Self::status_changes(previous, next);
        if self.verbose {
            for line in &changes {
                eprintln!("  {}", line);
            }
        }

        // Throttle progress updates to avoid spam (max once per 200ms)
        if self.last_progress_update.get().elapsed() < Duration::from_millis(200) {
            return;
        }
        self.last_progress_update.set(Instant::now());

        let active: Vec<String> = next
            .items
            .iter()
            .filter(|item| matches!(item.status, Status::Validating | Status::Uploading))
            .map(|item| format!("{} {}", item.name(), Self::progress_bar(item.progress)))
            .collect();
        if !active.is_empty() {
            eprintln!("{}", active.join(" | "));
        }
    }

    fn on_finished(&self, state: &QueueState) {
        let uploaded = state.count(Status::UploadSucceeded);
        let rejected = state.count(Status::ValidationFailed);
        let failed = state.count(Status::UploadFailed);
        let bytes: u64 = state
            .items
            .iter()
            .filter(|item| item.status == Status::UploadSucceeded)
            .map(|item| item.file.size())
            .sum();

        eprintln!();
        eprintln!("Queue drained!");
        eprintln!(
            "Summary: {} uploaded, {} failed validation, {} failed upload",
            uploaded, rejected, failed
        );
        eprintln!("Bytes uploaded: {}", Self::format_bytes(bytes));
        eprintln!(
            "Elapsed: {}",
            Self::format_duration(self.start_time.elapsed())
        );

        if rejected + failed > 0 {
            eprintln!();
            eprintln!("Failed files:");
            for item in state.items.iter().filter(|item| item.status.is_failure()) {
                eprintln!(
                    "  {}: {}",
                    item.name(),
                    item.err.as_deref().unwrap_or("(unknown error)")
                );
            }
        }

        if self.verbose {
            for item in &state.items {
                if let Some(stats) = &item.stats {
                    eprintln!(
                        "  {}: {} rows, columns [{}], {}",
                        item.name(),
                        stats.row_count,
                        stats.columns.join(", "),
                        stats.hash
                    );
                }
            }
        }
    }
}
