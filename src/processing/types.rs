//! Core data types and error definitions for the extraction pipeline.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::cascade::assemble_pages;

/// OCR language used when the caller does not provide one.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Errors surfaced to callers; every other failure is absorbed by the cascade.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The submission was rejected before any temporary storage was allocated.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Temporary storage for the Job could not be allocated, written, or released.
    #[error("Workspace error while {context}: {source}")]
    Workspace {
        /// What the Job was doing with its workspace.
        context: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The admission limiter was closed; the service is shutting down.
    #[error("Extraction service is shutting down")]
    Unavailable,
    /// A Job ended its run outside the `Succeeded` state.
    #[error("Job finished in unexpected state {0:?}")]
    InvalidState(JobStatus),
}

impl ProcessingError {
    pub(crate) fn workspace(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Workspace { context, source }
    }
}

/// Caller-selected extraction options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionOptions {
    /// OCR language code (ISO-639-2 style, e.g. `eng`, `chi_sim`).
    pub language: String,
    /// Optimize the size of the normalized output document.
    pub optimize: bool,
    /// Re-OCR pages that already carry text during normalization.
    pub force_ocr: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            optimize: true,
            force_ocr: false,
        }
    }
}

/// A document submission: raw bytes plus the original file name.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Client-provided file name; must end in `.pdf`.
    pub filename: String,
    /// Uploaded document content.
    pub bytes: Vec<u8>,
    /// Extraction options.
    pub options: ExtractionOptions,
}

/// Lifecycle of a Job. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet started.
    Pending,
    /// Cascade in progress.
    Running,
    /// Cascade resolved with a text body.
    Succeeded,
    /// Input could not be stored or the workspace failed.
    Failed,
}

impl JobStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Extraction strategy that produced a Job's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Full-document normalization pass.
    Normalize,
    /// Embedded text layer.
    Direct,
    /// Rasterization plus per-page OCR.
    Ocr,
    /// Descriptive message after every extraction attempt came up empty.
    Fallback,
}

impl Strategy {
    /// Stable name used in metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Direct => "direct",
            Self::Ocr => "ocr",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text recognized or extracted for one 1-based page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: u32,
    /// Page text; may be empty for blank pages.
    pub text: String,
}

impl PageText {
    /// Build a page block.
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Measurements attached to a finished Job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobMetrics {
    /// Size of the uploaded document.
    pub original_size_bytes: u64,
    /// Size of the normalized output document, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_size_bytes: Option<u64>,
    /// Character count of the final text.
    pub text_length: usize,
    /// Strategy that produced the text.
    pub strategy_used: Strategy,
    /// Number of page blocks in the result.
    pub page_count: usize,
    /// OCR language requested.
    pub language: String,
    /// Optimization flag requested.
    pub optimize: bool,
    /// Force-OCR flag requested.
    pub force_ocr: bool,
    /// Hex SHA-256 of the uploaded bytes.
    pub document_sha256: String,
    /// Wall-clock time spent running the Job.
    pub duration_ms: u64,
}

/// Outcome of the cascade for a single Job.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Strategy that produced the text.
    pub strategy: Strategy,
    /// Ordered page blocks.
    pub pages: Vec<PageText>,
    /// Message standing in for the text when no page was extracted.
    pub notice: Option<String>,
    /// Size of the normalized output document, if one was written.
    pub processed_size_bytes: Option<u64>,
    /// Pages whose recognition failed and carry a placeholder instead.
    pub failed_pages: Vec<u32>,
}

/// One document-extraction request and its lifecycle.
///
/// A Job is owned by the caller that submitted it; nothing keeps it after the request ends.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    filename: String,
    source: Vec<u8>,
    options: ExtractionOptions,
    status: JobStatus,
    pages: Vec<PageText>,
    notice: Option<String>,
    strategy: Option<Strategy>,
    processed_size_bytes: Option<u64>,
    failure: Option<String>,
}

impl Job {
    /// Create a `Pending` Job with a fresh identifier.
    pub fn new(request: JobRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: request.filename,
            source: request.bytes,
            options: request.options,
            status: JobStatus::Pending,
            pages: Vec::new(),
            notice: None,
            strategy: None,
            processed_size_bytes: None,
            failure: None,
        }
    }

    /// Unique identifier of this Job.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Original file name.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Uploaded document bytes.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Requested options.
    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Page blocks of the final text, ordered by page number.
    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    /// Strategy that resolved the cascade, once succeeded.
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    /// Failure cause, once failed.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Final text with page-boundary markers, or the fallback notice when no page was extracted.
    pub fn text(&self) -> String {
        match (&self.notice, self.pages.is_empty()) {
            (Some(notice), true) => notice.clone(),
            _ => assemble_pages(&self.pages),
        }
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) {
        self.transition(JobStatus::Pending, JobStatus::Running);
    }

    /// `Running -> Succeeded`, recording the cascade result.
    pub fn succeed(&mut self, resolution: Resolution) {
        if self.transition(JobStatus::Running, JobStatus::Succeeded) {
            let Resolution {
                strategy,
                mut pages,
                notice,
                processed_size_bytes,
                ..
            } = resolution;
            pages.sort_by_key(|page| page.page_number);
            self.pages = pages;
            self.notice = notice;
            self.strategy = Some(strategy);
            self.processed_size_bytes = processed_size_bytes;
        }
    }

    /// `Running -> Failed` with a human-readable cause.
    pub fn fail(&mut self, cause: impl Into<String>) {
        if self.transition(JobStatus::Running, JobStatus::Failed) {
            self.failure = Some(cause.into());
        }
    }

    fn transition(&mut self, from: JobStatus, to: JobStatus) -> bool {
        if self.status != from {
            tracing::debug!(
                job_id = %self.id,
                current = ?self.status,
                requested = ?to,
                "Ignoring illegal job transition"
            );
            return false;
        }
        self.status = to;
        true
    }

    /// Build the caller-facing report for a succeeded Job.
    ///
    /// Returns `None` unless the Job is `Succeeded`.
    pub fn report(&self, document_sha256: String, duration_ms: u64) -> Option<JobReport> {
        let strategy = self.strategy.filter(|_| self.status == JobStatus::Succeeded)?;
        let text = self.text();
        Some(JobReport {
            success: true,
            job_id: self.id.to_string(),
            status: self.status,
            filename: self.filename.clone(),
            metrics: JobMetrics {
                original_size_bytes: self.source.len() as u64,
                processed_size_bytes: self.processed_size_bytes,
                text_length: text.chars().count(),
                strategy_used: strategy,
                page_count: self.pages.len(),
                language: self.options.language.clone(),
                optimize: self.options.optimize,
                force_ocr: self.options.force_ocr,
                document_sha256,
                duration_ms,
            },
            text,
            download_url: format!("/download/{}", self.id),
        })
    }
}

/// Caller-facing result record.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// Job identifier.
    pub job_id: String,
    /// Terminal status.
    pub status: JobStatus,
    /// Original file name.
    pub filename: String,
    /// Extracted text with page-boundary markers.
    pub text: String,
    /// Job measurements.
    #[serde(rename = "processing_info")]
    pub metrics: JobMetrics,
    /// Placeholder download location; no file storage backs it.
    pub download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobRequest {
            filename: "scan.pdf".into(),
            bytes: b"%PDF-1.7 body".to_vec(),
            options: ExtractionOptions::default(),
        })
    }

    fn resolution(strategy: Strategy, pages: Vec<PageText>) -> Resolution {
        Resolution {
            strategy,
            pages,
            notice: None,
            processed_size_bytes: None,
            failed_pages: Vec::new(),
        }
    }

    #[test]
    fn default_options_match_service_defaults() {
        let options = ExtractionOptions::default();
        assert_eq!(options.language, "eng");
        assert!(options.optimize);
        assert!(!options.force_ocr);
    }

    #[test]
    fn job_walks_the_happy_path() {
        let mut job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        job.start();
        assert_eq!(job.status(), JobStatus::Running);
        job.succeed(resolution(
            Strategy::Ocr,
            vec![PageText::new(2, "second"), PageText::new(1, "first")],
        ));
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert_eq!(job.pages()[0].page_number, 1);
        assert_eq!(job.strategy(), Some(Strategy::Ocr));
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let mut job = job();
        job.start();
        job.fail("disk full");
        job.succeed(resolution(Strategy::Direct, vec![PageText::new(1, "late")]));
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.failure(), Some("disk full"));
        assert!(job.pages().is_empty());
        assert!(job.status().is_terminal());
    }

    #[test]
    fn cannot_succeed_without_starting() {
        let mut job = job();
        job.succeed(resolution(Strategy::Direct, vec![PageText::new(1, "x")]));
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.report(String::new(), 0).is_none());
    }

    #[test]
    fn fallback_notice_becomes_the_text() {
        let mut job = job();
        job.start();
        job.succeed(Resolution {
            notice: Some("No text could be extracted from scan.pdf.".into()),
            ..resolution(Strategy::Fallback, Vec::new())
        });
        let report = job.report("abc".into(), 1).unwrap();
        assert_eq!(report.text, "No text could be extracted from scan.pdf.");
        assert_eq!(report.metrics.page_count, 0);
        assert_eq!(report.metrics.strategy_used, Strategy::Fallback);
    }

    #[test]
    fn report_carries_metrics_and_placeholder_url() {
        let mut job = job();
        job.start();
        job.succeed(resolution(Strategy::Direct, vec![PageText::new(1, "héllo")]));
        let report = job.report("abc".into(), 12).expect("succeeded job has a report");
        assert!(report.success);
        assert_eq!(report.status, JobStatus::Succeeded);
        assert_eq!(report.text, "--- Page 1 ---\nhéllo");
        assert_eq!(report.metrics.text_length, report.text.chars().count());
        assert_eq!(report.metrics.original_size_bytes, 13);
        assert_eq!(report.metrics.strategy_used, Strategy::Direct);
        assert_eq!(report.download_url, format!("/download/{}", report.job_id));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["processing_info"]["strategy_used"], "direct");
        assert_eq!(json["status"], "succeeded");
        assert!(json["processing_info"].get("processed_size_bytes").is_none());
    }

    #[test]
    fn report_measurements_serialize_under_processing_info() {
        let mut job = job();
        job.start();
        job.succeed(resolution(Strategy::Ocr, vec![PageText::new(1, "scan")]));
        let json = serde_json::to_value(job.report("abc".into(), 3).unwrap()).unwrap();

        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["download_url", "filename", "job_id", "processing_info", "status", "success", "text"]
        );
        assert_eq!(json["processing_info"]["text_length"], 19);
        assert_eq!(json["processing_info"]["page_count"], 1);
    }
}
