//! Walk statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Point-in-time summary of a walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkSummary {
    /// Directories whose contents were enumerated.
    pub dirs_walked: u64,
    /// Subdirectories skipped by a discard rule.
    pub dirs_skipped: u64,
    /// Files handed to the file-scan pipeline.
    pub files_dispatched: u64,
    /// Library sidecars resolved to content.
    pub records_resolved: u64,
    /// Library sidecars that could not be resolved.
    pub records_skipped: u64,
    /// Enumeration or scan steps abandoned because of an error.
    pub errors_count: u64,
    /// Time elapsed since the walker was created.
    pub elapsed: Duration,
}

impl WalkSummary {
    /// Calculate dispatch rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_dispatched as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Lock-free counters shared by every job of a walk.
#[derive(Debug)]
pub struct WalkStats {
    start_time: Instant,
    dirs_walked: AtomicU64,
    dirs_skipped: AtomicU64,
    files_dispatched: AtomicU64,
    records_resolved: AtomicU64,
    records_skipped: AtomicU64,
    errors_count: AtomicU64,
}

impl WalkStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            dirs_walked: AtomicU64::new(0),
            dirs_skipped: AtomicU64::new(0),
            files_dispatched: AtomicU64::new(0),
            records_resolved: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
        }
    }

    pub fn record_dir(&self) {
        self.dirs_walked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_dir(&self) {
        self.dirs_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file(&self) {
        self.files_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolved(&self) {
        self.records_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WalkSummary {
        WalkSummary {
            dirs_walked: self.dirs_walked.load(Ordering::Relaxed),
            dirs_skipped: self.dirs_skipped.load(Ordering::Relaxed),
            files_dispatched: self.files_dispatched.load(Ordering::Relaxed),
            records_resolved: self.records_resolved.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            errors_count: self.errors_count.load(Ordering::Relaxed),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for WalkStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = WalkStats::new();
        stats.record_dir();
        stats.record_file();
        stats.record_file();
        stats.record_unresolved();

        let summary = stats.snapshot();
        assert_eq!(summary.dirs_walked, 1);
        assert_eq!(summary.files_dispatched, 2);
        assert_eq!(summary.records_skipped, 1);
        assert_eq!(summary.errors_count, 0);
    }

    #[test]
    fn test_rate_with_zero_elapsed() {
        let summary = WalkSummary::default();
        assert_eq!(summary.files_per_second(), 0.0);
    }
}
