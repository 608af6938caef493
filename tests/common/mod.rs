#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pdfocr::processing::{
    ExtractionOptions, ExtractionService, JobRequest, PageImage, PageText, ServiceSettings,
};
use pdfocr::toolchain::{
    NormalizationError, NormalizeOptions, NormalizedDocument, Normalizer, OcrEngine,
    OcrEngineError, RenderError, Renderer, TextExtractionError, TextExtractor, ToolError,
    Toolchain,
};

/// Counts invocations of each stubbed capability.
#[derive(Default)]
pub struct CallLog {
    pub render: AtomicUsize,
    pub recognize: AtomicUsize,
    pub extract: AtomicUsize,
    pub normalize: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// OCR calls that found the previous page's image still on disk.
    pub stale_images: AtomicUsize,
}

impl CallLog {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Describes how the stub toolchain behaves for a test.
#[derive(Clone, Default)]
pub struct Scenario {
    /// Pages produced by the renderer; `None` makes rendering fail.
    pub pages: Option<u32>,
    /// Embedded text layer returned by the extractor.
    pub embedded_text: Option<&'static str>,
    /// Make the extractor itself fail.
    pub extractor_fails: bool,
    /// Pages whose recognition fails.
    pub failing_pages: Vec<u32>,
    /// Base OCR latency; page `n` sleeps `ocr_delay / n`.
    pub ocr_delay: Duration,
    /// `None` when the normalizer is not installed, otherwise whether it succeeds.
    pub normalizer: Option<bool>,
}

impl Scenario {
    pub fn scanned(pages: u32) -> Self {
        Self {
            pages: Some(pages),
            ..Self::default()
        }
    }

    pub fn born_digital(text: &'static str) -> Self {
        Self {
            pages: Some(1),
            embedded_text: Some(text),
            ..Self::default()
        }
    }

    pub fn toolchain(&self, log: Arc<CallLog>) -> Toolchain {
        Toolchain {
            renderer: Arc::new(StubRenderer {
                pages: self.pages,
                log: log.clone(),
            }),
            ocr: Arc::new(StubOcr {
                failing_pages: self.failing_pages.clone(),
                delay: self.ocr_delay,
                log: log.clone(),
            }),
            extractor: Arc::new(StubExtractor {
                text: self.embedded_text,
                fails: self.extractor_fails,
                log: log.clone(),
            }),
            normalizer: Arc::new(StubNormalizer {
                behavior: self.normalizer,
                log,
            }),
        }
    }
}

pub fn service(
    scenario: &Scenario,
    root: &Path,
    tweak: impl FnOnce(&mut ServiceSettings),
) -> (ExtractionService, Arc<CallLog>) {
    let log = Arc::new(CallLog::default());
    let mut settings = ServiceSettings {
        workspace_root: Some(root.to_path_buf()),
        ..ServiceSettings::default()
    };
    tweak(&mut settings);
    let service = ExtractionService::new(settings, scenario.toolchain(log.clone()));
    (service, log)
}

pub fn pdf_request(filename: &str) -> JobRequest {
    JobRequest {
        filename: filename.to_string(),
        bytes: b"%PDF-1.7\n%stub document\n".to_vec(),
        options: ExtractionOptions::default(),
    }
}

pub fn entries(path: &Path) -> usize {
    std::fs::read_dir(path).map(|dir| dir.count()).unwrap_or(0)
}

struct StubRenderer {
    pages: Option<u32>,
    log: Arc<CallLog>,
}

#[async_trait]
impl Renderer for StubRenderer {
    fn is_available(&self) -> bool {
        self.pages.is_some()
    }

    async fn render(
        &self,
        _pdf: &Path,
        output_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PageImage>, RenderError> {
        self.log.render.fetch_add(1, Ordering::SeqCst);
        let Some(pages) = self.pages else {
            return Err(RenderError::Tool(ToolError::NotInstalled { tool: "pdftoppm" }));
        };
        tokio::fs::create_dir_all(output_dir).await?;
        let mut images = Vec::new();
        for page in 1..=pages {
            let path = output_dir.join(format!("page-{page}.png"));
            tokio::fs::write(&path, page.to_string()).await?;
            images.push(PageImage::new(page, path, dpi));
        }
        Ok(images)
    }
}

struct StubOcr {
    failing_pages: Vec<u32>,
    delay: Duration,
    log: Arc<CallLog>,
}

#[async_trait]
impl OcrEngine for StubOcr {
    fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self, image: &Path, _language: &str) -> Result<String, OcrEngineError> {
        self.log.recognize.fetch_add(1, Ordering::SeqCst);
        let current = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let page: u32 = tokio::fs::read_to_string(image)
            .await
            .ok()
            .and_then(|content| content.parse().ok())
            .unwrap_or(0);
        let previous = image.with_file_name(format!("page-{}.png", page.saturating_sub(1)));
        if page > 1 && previous.exists() {
            self.log.stale_images.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay.checked_div(page.max(1)) {
            tokio::time::sleep(delay).await;
        }
        self.log.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_pages.contains(&page) {
            return Err(OcrEngineError::Tool(ToolError::Failed {
                tool: "tesseract",
                code: Some(1),
                stderr: "image too noisy".into(),
            }));
        }
        Ok(format!("recognized page {page}"))
    }
}

struct StubExtractor {
    text: Option<&'static str>,
    fails: bool,
    log: Arc<CallLog>,
}

#[async_trait]
impl TextExtractor for StubExtractor {
    fn is_available(&self) -> bool {
        !self.fails
    }

    async fn extract(&self, _pdf: &Path) -> Result<Option<Vec<PageText>>, TextExtractionError> {
        self.log.extract.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(TextExtractionError::Tool(ToolError::NotInstalled {
                tool: "pdftotext",
            }));
        }
        Ok(self.text.map(|text| vec![PageText::new(1, text)]))
    }
}

struct StubNormalizer {
    behavior: Option<bool>,
    log: Arc<CallLog>,
}

#[async_trait]
impl Normalizer for StubNormalizer {
    fn is_available(&self) -> bool {
        self.behavior.is_some()
    }

    async fn normalize(
        &self,
        _input: &Path,
        output: &Path,
        _options: &NormalizeOptions,
    ) -> Result<NormalizedDocument, NormalizationError> {
        self.log.normalize.fetch_add(1, Ordering::SeqCst);
        if self.behavior != Some(true) {
            return Err(NormalizationError::Tool(ToolError::TimedOut {
                tool: "ocrmypdf",
                secs: 300,
            }));
        }
        tokio::fs::write(output, b"%PDF-1.7 normalized").await?;
        Ok(NormalizedDocument {
            pages: vec![
                PageText::new(1, "normalized one"),
                PageText::new(2, "normalized two"),
            ],
            output_size_bytes: 19,
        })
    }
}
