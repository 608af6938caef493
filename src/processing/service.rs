//! Extraction service running one Job per submission through the cascade.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use crate::{
    config::{Config, PipelineMode, get_config},
    metrics::{ExtractionMetrics, MetricsSnapshot},
    processing::{
        cascade::{CascadeInput, Orchestrator},
        languages,
        types::{Job, JobReport, JobRequest, ProcessingError, Resolution, Strategy},
        validation::validate_request,
        workspace::Workspace,
    },
    toolchain::{Toolchain, ToolchainStatus},
};

/// Knobs the service reads once at construction.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Strategy chain the orchestrator plans with.
    pub pipeline_mode: PipelineMode,
    /// Parent directory for workspaces; the system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
    /// Admission limit for simultaneously running Jobs.
    pub max_concurrent_jobs: usize,
    /// Pages recognized in parallel during raster OCR.
    pub page_concurrency: usize,
}

impl ServiceSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            pipeline_mode: config.pipeline_mode,
            workspace_root: config.workspace_root.clone(),
            max_concurrent_jobs: config.max_concurrent_jobs,
            page_concurrency: config.page_concurrency,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Accepts documents, runs the extraction cascade, and reports results.
///
/// Every submission becomes a caller-owned [`Job`]; the service keeps no per-Job state beyond
/// the admission permit and the process-wide counters. Share it through an `Arc`.
pub struct ExtractionService {
    orchestrator: Orchestrator,
    workspace_root: Option<PathBuf>,
    admission: Semaphore,
    metrics: Arc<ExtractionMetrics>,
}

/// Abstraction over the extraction pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ExtractionApi: Send + Sync {
    /// Run one Job for the submitted document and return its report.
    async fn extract(&self, request: JobRequest) -> Result<JobReport, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Report which external tools are installed.
    fn toolchain_status(&self) -> ToolchainStatus;
}

impl ExtractionService {
    /// Build a service over `toolchain`.
    pub fn new(settings: ServiceSettings, toolchain: Toolchain) -> Self {
        let permits = settings.max_concurrent_jobs.max(1);
        tracing::debug!(
            pipeline_mode = ?settings.pipeline_mode,
            max_concurrent_jobs = permits,
            page_concurrency = settings.page_concurrency,
            "Initializing extraction service"
        );
        Self {
            orchestrator: Orchestrator::new(
                toolchain,
                settings.pipeline_mode,
                settings.page_concurrency,
            ),
            workspace_root: settings.workspace_root,
            admission: Semaphore::new(permits),
            metrics: Arc::new(ExtractionMetrics::new()),
        }
    }

    /// Build a service backed by the installed executables, using the global configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        let toolchain = Toolchain::system(Duration::from_secs(config.stage_timeout_secs));
        let status = toolchain.status();
        tracing::info!(
            pdftoppm = status.pdftoppm,
            tesseract = status.tesseract,
            pdftotext = status.pdftotext,
            ocrmypdf = status.ocrmypdf,
            "Toolchain probed"
        );
        Self::new(ServiceSettings::from_config(config), toolchain)
    }

    /// Validate, admit, and run one Job to completion.
    ///
    /// Rejected submissions never allocate a workspace. The workspace of an admitted Job is
    /// released before this returns, whatever the outcome.
    pub async fn extract(&self, request: JobRequest) -> Result<JobReport, ProcessingError> {
        let request = match validate_request(request) {
            Ok(request) => request,
            Err(error) => {
                self.metrics.record_rejection();
                tracing::warn!(error = %error, "Rejected submission");
                return Err(error);
            }
        };

        let _permit = self
            .admission
            .acquire()
            .await
            .map_err(|_| ProcessingError::Unavailable)?;

        let started = Instant::now();
        let mut job = Job::new(request);
        job.start();
        tracing::info!(
            job_id = %job.id(),
            filename = job.filename(),
            size_bytes = job.source().len(),
            language = %job.options().language,
            "Job started"
        );
        if !languages::is_supported(&job.options().language) {
            tracing::debug!(
                job_id = %job.id(),
                language = %job.options().language,
                "Language not in the advertised list; forwarding to the OCR tools"
            );
        }

        let resolution = match self.run(&job).await {
            Ok(resolution) => resolution,
            Err(error) => {
                job.fail(error.to_string());
                self.metrics.record_failure();
                tracing::error!(job_id = %job.id(), error = %error, "Job failed");
                return Err(error);
            }
        };

        let strategy = resolution.strategy;
        self.record_resolution(&resolution);
        job.succeed(resolution);

        let document_sha256 = hex::encode(Sha256::digest(job.source()));
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = job
            .report(document_sha256, duration_ms)
            .ok_or(ProcessingError::InvalidState(job.status()))?;
        tracing::info!(
            job_id = %job.id(),
            strategy = %strategy,
            pages = report.metrics.page_count,
            text_length = report.metrics.text_length,
            duration_ms,
            "Job succeeded"
        );
        Ok(report)
    }

    async fn run(&self, job: &Job) -> Result<Resolution, ProcessingError> {
        let workspace = Workspace::create(job.id(), self.workspace_root.as_deref())
            .map_err(ProcessingError::workspace("allocating workspace"))?;
        let input = workspace
            .write_input(job.source())
            .await
            .map_err(ProcessingError::workspace("storing input document"))?;

        let plan = self.orchestrator.plan();
        let resolution = self
            .orchestrator
            .run(
                &plan,
                CascadeInput {
                    job_id: job.id(),
                    filename: job.filename(),
                    workspace: &workspace,
                    input: &input,
                    options: job.options(),
                },
            )
            .await;

        workspace
            .close()
            .await
            .map_err(ProcessingError::workspace("releasing workspace"))?;
        Ok(resolution)
    }

    fn record_resolution(&self, resolution: &Resolution) {
        self.metrics.record_success(resolution.strategy);
        if resolution.strategy == Strategy::Ocr {
            let failed = resolution.failed_pages.len() as u64;
            let total = resolution.pages.len() as u64;
            self.metrics
                .record_pages(total.saturating_sub(failed), failed);
        }
    }

    /// Stop admitting Jobs.
    ///
    /// Jobs already holding a permit run to completion. Submissions waiting for a permit, and
    /// any that arrive later, fail with [`ProcessingError::Unavailable`].
    pub fn close_admission(&self) {
        self.admission.close();
        tracing::info!("Job admission closed");
    }

    /// Retrieve the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Report which external tools are installed.
    pub fn toolchain_status(&self) -> ToolchainStatus {
        self.orchestrator.toolchain().status()
    }
}

#[async_trait]
impl ExtractionApi for ExtractionService {
    async fn extract(&self, request: JobRequest) -> Result<JobReport, ProcessingError> {
        ExtractionService::extract(self, request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ExtractionService::metrics_snapshot(self)
    }

    fn toolchain_status(&self) -> ToolchainStatus {
        ExtractionService::toolchain_status(self)
    }
}
