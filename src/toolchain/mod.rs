//! External toolchain capabilities used by the extraction cascade.
//!
//! Each tool sits behind a trait so the orchestrator can be exercised with stubs:
//!
//! - [`Renderer`] – rasterizes PDF pages (`pdftoppm`).
//! - [`OcrEngine`] – recognizes text on one page image (`tesseract`).
//! - [`TextExtractor`] – reads an embedded text layer (`pdftotext`).
//! - [`Normalizer`] – full-document OCR and cleanup pass (`ocrmypdf`).
//!
//! The system implementations invoke the executables as subprocesses with a per-call timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::processing::{PageImage, PageText};

mod ocrmypdf;
mod pdftoppm;
mod pdftotext;
mod process;
mod tesseract;

pub use ocrmypdf::OcrmypdfNormalizer;
pub use pdftoppm::{PdftoppmRenderer, page_number_from_file_name};
pub use pdftotext::{PdftotextExtractor, split_pages};
pub use process::ToolBinary;
pub use tesseract::TesseractEngine;

/// Failure of a single subprocess invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable is not installed or not on `PATH`.
    #[error("{tool} is not installed")]
    NotInstalled {
        /// Tool name.
        tool: &'static str,
    },
    /// The executable exited with a non-zero status.
    #[error("{tool} exited with status {code:?}: {stderr}")]
    Failed {
        /// Tool name.
        tool: &'static str,
        /// Exit code, when the process was not killed by a signal.
        code: Option<i32>,
        /// Trimmed stderr excerpt.
        stderr: String,
    },
    /// The executable did not finish within the stage timeout.
    #[error("{tool} timed out after {secs}s")]
    TimedOut {
        /// Tool name.
        tool: &'static str,
        /// Timeout that elapsed.
        secs: u64,
    },
    /// Spawning or waiting on the process failed.
    #[error("{tool} I/O error: {source}")]
    Io {
        /// Tool name.
        tool: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Rasterization failed; fatal for the raster OCR stage.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer subprocess failed.
    #[error("failed to render pages: {0}")]
    Tool(#[from] ToolError),
    /// The renderer exited cleanly without producing any page image.
    #[error("renderer produced no page images")]
    NoPages,
    /// The output directory could not be prepared or listed.
    #[error("failed to read rendered pages: {0}")]
    Io(#[from] std::io::Error),
}

/// Recognition of a single page failed; absorbed into a placeholder by the orchestrator.
#[derive(Debug, Error)]
pub enum OcrEngineError {
    /// The OCR subprocess failed.
    #[error("{0}")]
    Tool(#[from] ToolError),
}

/// Reading the embedded text layer failed (distinct from the layer being empty).
#[derive(Debug, Error)]
pub enum TextExtractionError {
    /// The extractor subprocess failed.
    #[error("{0}")]
    Tool(#[from] ToolError),
}

/// The normalization pass failed; fatal for the normalization stage only.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// The normalizer subprocess failed.
    #[error("normalization failed: {0}")]
    Tool(#[from] ToolError),
    /// The normalized document's text layer could not be read.
    #[error("failed to read normalized text layer: {0}")]
    TextLayer(#[from] TextExtractionError),
    /// The output document could not be inspected.
    #[error("failed to inspect normalized output: {0}")]
    Io(#[from] std::io::Error),
}

/// Options forwarded to the normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// OCR language code.
    pub language: String,
    /// Whether to optimize the output document size.
    pub optimize: bool,
    /// Re-OCR pages that already contain text instead of skipping them.
    pub force_ocr: bool,
}

/// Output of a successful normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// Text layer of the output document, one entry per page.
    pub pages: Vec<PageText>,
    /// Size of the written output document.
    pub output_size_bytes: u64,
}

/// Converts a PDF into one raster image per page.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Whether the backing toolchain is installed.
    fn is_available(&self) -> bool;

    /// Render every page of `pdf` into `output_dir` at `dpi`, ordered by page number.
    async fn render(
        &self,
        pdf: &Path,
        output_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PageImage>, RenderError>;
}

/// Recognizes text on a single raster image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Whether the backing toolchain is installed.
    fn is_available(&self) -> bool;

    /// Recognize the text on `image` using the `language` hint; blank pages yield `""`.
    async fn recognize(&self, image: &Path, language: &str) -> Result<String, OcrEngineError>;
}

/// Reads an existing text layer from a PDF without rasterization.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Whether the backing toolchain is installed.
    fn is_available(&self) -> bool;

    /// Return the text layer page by page, or `None` when it is empty after trimming.
    async fn extract(&self, pdf: &Path) -> Result<Option<Vec<PageText>>, TextExtractionError>;
}

/// Runs a full-document OCR and cleanup pass producing a new PDF.
#[async_trait]
pub trait Normalizer: Send + Sync {
    /// Whether the backing toolchain is installed.
    fn is_available(&self) -> bool;

    /// Normalize `input` into `output` and return the output's text layer.
    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        options: &NormalizeOptions,
    ) -> Result<NormalizedDocument, NormalizationError>;
}

/// The four capabilities the orchestrator depends on.
#[derive(Clone)]
pub struct Toolchain {
    /// Raster renderer.
    pub renderer: Arc<dyn Renderer>,
    /// Page OCR engine.
    pub ocr: Arc<dyn OcrEngine>,
    /// Direct text extractor.
    pub extractor: Arc<dyn TextExtractor>,
    /// Document normalizer.
    pub normalizer: Arc<dyn Normalizer>,
}

impl Toolchain {
    /// Build the subprocess-backed toolchain with the given per-call timeout.
    pub fn system(stage_timeout: Duration) -> Self {
        let extractor = Arc::new(PdftotextExtractor::new(stage_timeout));
        Self {
            renderer: Arc::new(PdftoppmRenderer::new(stage_timeout)),
            ocr: Arc::new(TesseractEngine::new(stage_timeout)),
            normalizer: Arc::new(OcrmypdfNormalizer::new(stage_timeout, extractor.clone())),
            extractor,
        }
    }

    /// Probe each capability for availability.
    pub fn status(&self) -> ToolchainStatus {
        ToolchainStatus {
            pdftoppm: self.renderer.is_available(),
            tesseract: self.ocr.is_available(),
            pdftotext: self.extractor.is_available(),
            ocrmypdf: self.normalizer.is_available(),
        }
    }
}

/// Availability of each external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolchainStatus {
    /// Raster renderer available.
    pub pdftoppm: bool,
    /// Page OCR engine available.
    pub tesseract: bool,
    /// Direct text extractor available.
    pub pdftotext: bool,
    /// Document normalizer available.
    pub ocrmypdf: bool,
}
