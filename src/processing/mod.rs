//! Extraction pipeline: Job lifecycle, workspaces, and the strategy cascade.

pub mod cascade;
pub mod languages;
mod service;
pub mod types;
pub mod validation;
pub mod workspace;

pub use cascade::{Orchestrator, Stage, assemble_pages};
pub use languages::{Language, SUPPORTED_LANGUAGES};
pub use service::{ExtractionApi, ExtractionService, ServiceSettings};
pub use types::{
    DEFAULT_LANGUAGE, ExtractionOptions, Job, JobMetrics, JobReport, JobRequest, JobStatus,
    PageText, ProcessingError, Resolution, Strategy,
};
pub use workspace::{PageImage, Workspace};
