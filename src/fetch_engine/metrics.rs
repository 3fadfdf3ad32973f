use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one harvester, shared across fetch tasks.
///
/// All counters use `Ordering::SeqCst` so snapshot reads are coherent
/// across fields.
#[derive(Debug, Clone, Default)]
pub struct HarvestMetrics {
    pub targets_scheduled: Arc<AtomicU64>,
    pub targets_succeeded: Arc<AtomicU64>,
    pub targets_failed: Arc<AtomicU64>,
    pub attempts: Arc<AtomicU64>,
    /// Pages where neither a title nor any labelled field matched a selector.
    pub empty_extractions: Arc<AtomicU64>,
    pub documents_downloaded: Arc<AtomicU64>,
}

impl HarvestMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_scheduled(&self) {
        self.targets_scheduled.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_succeeded(&self) {
        self.targets_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_failed(&self) {
        self.targets_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_attempts(&self, attempts: u32) {
        self.attempts.fetch_add(u64::from(attempts), Ordering::SeqCst);
    }

    pub fn increment_empty_extractions(&self) {
        self.empty_extractions.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_documents(&self, count: usize) {
        self.documents_downloaded
            .fetch_add(count as u64, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            targets_scheduled: self.targets_scheduled.load(Ordering::SeqCst),
            targets_succeeded: self.targets_succeeded.load(Ordering::SeqCst),
            targets_failed: self.targets_failed.load(Ordering::SeqCst),
            attempts: self.attempts.load(Ordering::SeqCst),
            empty_extractions: self.empty_extractions.load(Ordering::SeqCst),
            documents_downloaded: self.documents_downloaded.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub targets_scheduled: u64,
    pub targets_succeeded: u64,
    pub targets_failed: u64,
    pub attempts: u64,
    pub empty_extractions: u64,
    pub documents_downloaded: u64,
}

impl MetricsSnapshot {
    /// Fraction of scheduled targets that succeeded, 1.0 for an empty run.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.targets_scheduled == 0 {
            return 1.0;
        }
        self.targets_succeeded as f64 / self.targets_scheduled as f64
    }
}
