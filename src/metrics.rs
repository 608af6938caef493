use std::sync::atomic::{AtomicU64, Ordering};

use crate::processing::Strategy;

/// Thread-safe counters describing extraction activity.
#[derive(Default)]
pub struct ExtractionMetrics {
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_rejected: AtomicU64,
    normalize_jobs: AtomicU64,
    direct_jobs: AtomicU64,
    ocr_jobs: AtomicU64,
    fallback_jobs: AtomicU64,
    pages_recognized: AtomicU64,
    page_failures: AtomicU64,
}

impl ExtractionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Job that resolved through the given strategy.
    pub fn record_success(&self, strategy: Strategy) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        let counter = match strategy {
            Strategy::Normalize => &self.normalize_jobs,
            Strategy::Direct => &self.direct_jobs,
            Strategy::Ocr => &self.ocr_jobs,
            Strategy::Fallback => &self.fallback_jobs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a Job that reached the `Failed` state.
    pub fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a submission rejected before a Job was created.
    pub fn record_rejection(&self) {
        self.jobs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of raster OCR over a document.
    pub fn record_pages(&self, recognized: u64, failed: u64) {
        self.pages_recognized
            .fetch_add(recognized, Ordering::Relaxed);
        self.page_failures.fetch_add(failed, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            strategies: StrategyCounts {
                normalize: self.normalize_jobs.load(Ordering::Relaxed),
                direct: self.direct_jobs.load(Ordering::Relaxed),
                ocr: self.ocr_jobs.load(Ordering::Relaxed),
                fallback: self.fallback_jobs.load(Ordering::Relaxed),
            },
            pages_recognized: self.pages_recognized.load(Ordering::Relaxed),
            page_failures: self.page_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of extraction counters used for reporting.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Jobs that completed with `Succeeded` since startup.
    pub jobs_succeeded: u64,
    /// Jobs that completed with `Failed` since startup.
    pub jobs_failed: u64,
    /// Submissions rejected by input validation.
    pub jobs_rejected: u64,
    /// Successful Jobs broken down by winning strategy.
    pub strategies: StrategyCounts,
    /// Pages whose raster image was recognized successfully.
    pub pages_recognized: u64,
    /// Pages whose recognition failed and were replaced by a placeholder.
    pub page_failures: u64,
}

/// Successful Jobs per strategy.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StrategyCounts {
    /// Resolved by the normalization pass.
    pub normalize: u64,
    /// Resolved by the embedded text layer.
    pub direct: u64,
    /// Resolved by raster OCR.
    pub ocr: u64,
    /// Resolved by the last-resort fallback message.
    pub fallback: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_jobs_by_strategy() {
        let metrics = ExtractionMetrics::new();
        metrics.record_success(Strategy::Direct);
        metrics.record_success(Strategy::Ocr);
        metrics.record_success(Strategy::Ocr);
        metrics.record_failure();
        metrics.record_rejection();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_succeeded, 3);
        assert_eq!(snapshot.jobs_failed, 1);
        assert_eq!(snapshot.jobs_rejected, 1);
        assert_eq!(snapshot.strategies.direct, 1);
        assert_eq!(snapshot.strategies.ocr, 2);
        assert_eq!(snapshot.strategies.normalize, 0);
    }

    #[test]
    fn accumulates_page_counters() {
        let metrics = ExtractionMetrics::new();
        metrics.record_pages(2, 1);
        metrics.record_pages(3, 0);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pages_recognized, 5);
        assert_eq!(snapshot.page_failures, 1);
    }
}
