//! Extraction orchestrator: the ordered strategy cascade run once per Job.
//!
//! The plan is `[Normalize] -> DirectText -> RasterOcr -> DirectFallback`. Each stage reports a
//! [`StageOutcome`]; the orchestrator folds over the plan and stops at the first stage that
//! extracted text. Stage failures never abort the Job, they hand over to the next stage.

use std::path::Path;

use futures_util::{StreamExt, stream};
use thiserror::Error;
use uuid::Uuid;

use super::types::{ExtractionOptions, PageText, Resolution, Strategy};
use super::workspace::{PageImage, Workspace};
use crate::config::PipelineMode;
use crate::toolchain::{
    NormalizationError, NormalizeOptions, OcrEngine, RenderError, TextExtractionError, Toolchain,
};

/// Resolution used to rasterize pages for OCR.
pub const RENDER_DPI: u32 = 300;

/// One step of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Full-document normalization pass.
    Normalize,
    /// Embedded text layer.
    DirectText,
    /// Rasterize and OCR every page.
    RasterOcr,
    /// Last resort after rasterization failed: direct result or an explanatory message.
    DirectFallback,
}

impl Stage {
    /// Name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::DirectText => "direct_text",
            Self::RasterOcr => "raster_ocr",
            Self::DirectFallback => "direct_fallback",
        }
    }
}

/// Stage-level failure; triggers the next stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Normalization pass failed.
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    /// Rasterization failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Reading the embedded text layer failed.
    #[error(transparent)]
    TextExtraction(#[from] TextExtractionError),
}

/// Result of running a single stage.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage produced the Job's text; the cascade stops.
    Extracted(Resolution),
    /// The stage had nothing to contribute.
    Skip(String),
    /// The stage failed.
    Fatal(StageError),
}

/// Inputs of one cascade run.
#[derive(Debug, Clone, Copy)]
pub struct CascadeInput<'a> {
    /// Job identifier, for logs.
    pub job_id: Uuid,
    /// Original file name, for the fallback message.
    pub filename: &'a str,
    /// The Job's workspace.
    pub workspace: &'a Workspace,
    /// Stored input document.
    pub input: &'a Path,
    /// Requested options.
    pub options: &'a ExtractionOptions,
}

/// Outcome of the direct extraction attempt, kept so the fallback never reruns it.
type DirectAttempt = Result<Option<Vec<PageText>>, String>;

#[derive(Default)]
struct CascadeState {
    direct: Option<DirectAttempt>,
}

/// Runs the strategy cascade against a toolchain.
#[derive(Clone)]
pub struct Orchestrator {
    toolchain: Toolchain,
    mode: PipelineMode,
    page_concurrency: usize,
}

impl Orchestrator {
    /// Create an orchestrator; `page_concurrency` is clamped to at least one.
    pub fn new(toolchain: Toolchain, mode: PipelineMode, page_concurrency: usize) -> Self {
        Self {
            toolchain,
            mode,
            page_concurrency: page_concurrency.max(1),
        }
    }

    /// Toolchain backing this orchestrator.
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Ordered stages for the next Job.
    ///
    /// Depends only on the pipeline mode and normalizer availability.
    pub fn plan(&self) -> Vec<Stage> {
        let mut stages = Vec::with_capacity(4);
        if self.mode == PipelineMode::Full {
            if self.toolchain.normalizer.is_available() {
                stages.push(Stage::Normalize);
            } else {
                tracing::debug!("Normalizer unavailable; planning without normalization");
            }
        }
        stages.extend([Stage::DirectText, Stage::RasterOcr, Stage::DirectFallback]);
        stages
    }

    /// Run `plan` to completion. Always resolves: the fallback stage produces a message when
    /// every extraction attempt came up empty.
    pub async fn run(&self, plan: &[Stage], input: CascadeInput<'_>) -> Resolution {
        let mut state = CascadeState::default();
        for &stage in plan {
            match self.run_stage(stage, input, &mut state).await {
                StageOutcome::Extracted(resolution) => {
                    tracing::info!(
                        job_id = %input.job_id,
                        stage = stage.as_str(),
                        strategy = %resolution.strategy,
                        pages = resolution.pages.len(),
                        "Cascade resolved"
                    );
                    return resolution;
                }
                StageOutcome::Skip(reason) => {
                    tracing::debug!(
                        job_id = %input.job_id,
                        stage = stage.as_str(),
                        reason = %reason,
                        "Stage skipped"
                    );
                }
                StageOutcome::Fatal(error) => {
                    tracing::warn!(
                        job_id = %input.job_id,
                        stage = stage.as_str(),
                        error = %error,
                        "Stage failed; continuing cascade"
                    );
                }
            }
        }

        tracing::warn!(job_id = %input.job_id, "Cascade exhausted without extracting text");
        fallback_resolution(input.filename, state.direct)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        input: CascadeInput<'_>,
        state: &mut CascadeState,
    ) -> StageOutcome {
        match stage {
            Stage::Normalize => self.normalize(input).await,
            Stage::DirectText => self.direct_text(input, state).await,
            Stage::RasterOcr => self.raster_ocr(input).await,
            Stage::DirectFallback => self.direct_fallback(input, state).await,
        }
    }

    async fn normalize(&self, input: CascadeInput<'_>) -> StageOutcome {
        let options = NormalizeOptions {
            language: input.options.language.clone(),
            optimize: input.options.optimize,
            force_ocr: input.options.force_ocr,
        };
        let output = input.workspace.output_path();
        match self
            .toolchain
            .normalizer
            .normalize(input.input, &output, &options)
            .await
        {
            Ok(document) => StageOutcome::Extracted(Resolution {
                strategy: Strategy::Normalize,
                pages: document.pages,
                notice: None,
                processed_size_bytes: Some(document.output_size_bytes),
                failed_pages: Vec::new(),
            }),
            Err(error) => StageOutcome::Fatal(error.into()),
        }
    }

    async fn direct_text(&self, input: CascadeInput<'_>, state: &mut CascadeState) -> StageOutcome {
        let attempt = self.direct_attempt(input, state).await;
        match attempt {
            Ok(Some(pages)) => StageOutcome::Extracted(Resolution {
                strategy: Strategy::Direct,
                pages: pages.clone(),
                notice: None,
                processed_size_bytes: None,
                failed_pages: Vec::new(),
            }),
            Ok(None) => StageOutcome::Skip("no embedded text layer".to_string()),
            Err(message) => StageOutcome::Skip(format!("direct extraction failed: {message}")),
        }
    }

    async fn direct_attempt<'s>(
        &self,
        input: CascadeInput<'_>,
        state: &'s mut CascadeState,
    ) -> &'s DirectAttempt {
        if state.direct.is_none() {
            let attempt = self
                .toolchain
                .extractor
                .extract(input.input)
                .await
                .map_err(|error| {
                    let error = StageError::from(error);
                    tracing::warn!(
                        job_id = %input.job_id,
                        error = %error,
                        "Direct text extraction failed"
                    );
                    error.to_string()
                });
            state.direct = Some(attempt);
        }
        state.direct.get_or_insert_with(|| Ok(None))
    }

    async fn raster_ocr(&self, input: CascadeInput<'_>) -> StageOutcome {
        let images = match self
            .toolchain
            .renderer
            .render(input.input, &input.workspace.pages_dir(), RENDER_DPI)
            .await
        {
            Ok(images) => images,
            Err(error) => return StageOutcome::Fatal(error.into()),
        };
        tracing::debug!(
            job_id = %input.job_id,
            pages = images.len(),
            concurrency = self.page_concurrency,
            "Recognizing rendered pages"
        );

        let engine = self.toolchain.ocr.as_ref();
        let language = input.options.language.as_str();
        let mut recognized: Vec<RecognizedPage> = stream::iter(images)
            .map(|image| recognize_page(engine, image, language, input.job_id))
            .buffer_unordered(self.page_concurrency)
            .collect()
            .await;
        recognized.sort_by_key(|page| page.text.page_number);

        let failed_pages = recognized
            .iter()
            .filter(|page| page.failed)
            .map(|page| page.text.page_number)
            .collect();
        StageOutcome::Extracted(Resolution {
            strategy: Strategy::Ocr,
            pages: recognized.into_iter().map(|page| page.text).collect(),
            notice: None,
            processed_size_bytes: None,
            failed_pages,
        })
    }

    async fn direct_fallback(
        &self,
        input: CascadeInput<'_>,
        state: &mut CascadeState,
    ) -> StageOutcome {
        let attempt = self.direct_attempt(input, state).await.clone();
        StageOutcome::Extracted(fallback_resolution(input.filename, Some(attempt)))
    }
}

struct RecognizedPage {
    text: PageText,
    failed: bool,
}

async fn recognize_page(
    engine: &dyn OcrEngine,
    image: PageImage,
    language: &str,
    job_id: Uuid,
) -> RecognizedPage {
    let page_number = image.page_number();
    let result = engine.recognize(image.path(), language).await;
    if let Err(error) = image.discard().await {
        tracing::warn!(
            job_id = %job_id,
            page = page_number,
            error = %error,
            "Failed to delete page image"
        );
    }
    match result {
        Ok(text) => RecognizedPage {
            text: PageText::new(page_number, text),
            failed: false,
        },
        Err(error) => {
            tracing::warn!(
                job_id = %job_id,
                page = page_number,
                error = %error,
                "Page OCR failed"
            );
            let placeholder = format!("[OCR failed for page {page_number}: {error}]");
            RecognizedPage {
                text: PageText::new(page_number, placeholder),
                failed: true,
            }
        }
    }
}

fn fallback_resolution(filename: &str, direct: Option<DirectAttempt>) -> Resolution {
    let (strategy, pages, notice) = match direct {
        Some(Ok(Some(pages))) => (Strategy::Direct, pages, None),
        Some(Err(message)) => (
            Strategy::Fallback,
            Vec::new(),
            Some(format!("Text extraction failed: {message}")),
        ),
        Some(Ok(None)) | None => (
            Strategy::Fallback,
            Vec::new(),
            Some(format!(
                "No text could be extracted from {filename}. \
                 This may be a scanned document requiring OCR."
            )),
        ),
    };
    Resolution {
        strategy,
        pages,
        notice,
        processed_size_bytes: None,
        failed_pages: Vec::new(),
    }
}

/// Marker placed before each page's text.
pub fn page_marker(page_number: u32) -> String {
    format!("--- Page {page_number} ---")
}

/// Concatenate page blocks in ascending page order, each preceded by its marker.
pub fn assemble_pages(pages: &[PageText]) -> String {
    let mut ordered: Vec<&PageText> = pages.iter().collect();
    ordered.sort_by_key(|page| page.page_number);
    ordered
        .into_iter()
        .map(|page| format!("{}\n{}", page_marker(page.page_number), page.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim_end()
        .to_string()
}
