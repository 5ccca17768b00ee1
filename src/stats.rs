use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

/// Per-run counters, shared by all concurrently analyzed files.
#[derive(Debug, Default)]
pub struct AnalysisStats {
    plain_files: AtomicUsize,
    plain_parsed: AtomicUsize,
    templated_files: AtomicUsize,
    templated_parsed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// Point-in-time copy of [`AnalysisStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub plain_files: usize,
    pub plain_parsed: usize,
    pub templated_files: usize,
    pub templated_parsed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl AnalysisStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_plain(&self) {
        self.plain_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_plain_parsed(&self) {
        self.plain_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_templated(&self) {
        self.templated_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_templated_parsed(&self) {
        self.templated_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            plain_files: self.plain_files.load(Ordering::Relaxed),
            plain_parsed: self.plain_parsed.load(Ordering::Relaxed),
            templated_files: self.templated_files.load(Ordering::Relaxed),
            templated_parsed: self.templated_parsed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn log_statistics(&self) {
        let s = self.snapshot();
        if s.plain_files + s.templated_files == 0 {
            return;
        }
        debug!(
            "Parsing statistics: plain files count: {}, parsed: {}, not parsed: {}; templated files count: {}, parsed: {}, not parsed: {}",
            s.plain_files,
            s.plain_parsed,
            s.plain_files - s.plain_parsed,
            s.templated_files,
            s.templated_parsed,
            s.templated_files - s.templated_parsed
        );
    }
}
