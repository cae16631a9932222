//! Run progress counters
//!
//! Shared between the pipeline and whoever observes it (the CLI logs it).
//! Counters only move forward.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Progress {
    lines_read: AtomicU64,
    committed_line: AtomicU64,
    persisted: AtomicU64,
    batches: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub lines_read: u64,
    /// Last stub line whose batch has been committed
    pub committed_line: u64,
    pub persisted: u64,
    pub batches: u64,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_line(&self, line: u64) {
        self.lines_read.store(line, Ordering::Relaxed);
    }

    pub fn record_commit(&self, last_line: u64, persisted: u64) {
        self.committed_line.store(last_line, Ordering::Release);
        self.persisted.fetch_add(persisted, Ordering::AcqRel);
        self.batches.fetch_add(1, Ordering::AcqRel);
    }

    pub fn committed_line(&self) -> u64 {
        self.committed_line.load(Ordering::Acquire)
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            committed_line: self.committed_line(),
            persisted: self.persisted(),
            batches: self.batches.load(Ordering::Acquire),
        }
    }
}

impl ProgressSnapshot {
    /// Percentage of `estimated_total` lines read, capped at 100
    pub fn percent(&self, estimated_total: u64) -> Option<f64> {
        if estimated_total == 0 {
            return None;
        }
        Some((self.lines_read as f64 / estimated_total as f64 * 100.0).min(100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_accumulate() {
        let progress = Progress::new();
        progress.record_line(25);
        progress.record_commit(10, 7);
        progress.record_commit(20, 9);

        let snap = progress.snapshot();
        assert_eq!(snap.lines_read, 25);
        assert_eq!(snap.committed_line, 20);
        assert_eq!(snap.persisted, 16);
        assert_eq!(snap.batches, 2);
    }

    #[test]
    fn percent_of_estimate() {
        let snap = ProgressSnapshot {
            lines_read: 500,
            ..Default::default()
        };
        assert_eq!(snap.percent(1000), Some(50.0));
        assert_eq!(snap.percent(100), Some(100.0));
        assert_eq!(snap.percent(0), None);
    }
}
