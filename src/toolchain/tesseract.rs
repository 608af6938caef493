//! Page OCR adapter backed by the `tesseract` CLI.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::{OcrEngine, OcrEngineError, ToolBinary};

/// Page segmentation mode 6: a single uniform block of text.
const PAGE_SEGMENTATION_MODE: &str = "6";

/// Runs `tesseract <image> stdout -l <lang> --psm 6` per page.
pub struct TesseractEngine {
    binary: ToolBinary,
    timeout: Duration,
}

impl TesseractEngine {
    /// Create an engine that resolves `tesseract` from `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_binary(ToolBinary::new("tesseract"), timeout)
    }

    /// Create an engine around an explicit binary.
    pub fn with_binary(binary: ToolBinary, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn is_available(&self) -> bool {
        self.binary.is_available()
    }

    async fn recognize(&self, image: &Path, language: &str) -> Result<String, OcrEngineError> {
        let output = self
            .binary
            .run(
                [
                    image.as_os_str(),
                    OsStr::new("stdout"),
                    OsStr::new("-l"),
                    OsStr::new(language),
                    OsStr::new("--psm"),
                    OsStr::new(PAGE_SEGMENTATION_MODE),
                ],
                self.timeout,
            )
            .await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolError;

    #[tokio::test]
    async fn missing_binary_is_an_engine_error() {
        let engine = TesseractEngine::with_binary(
            ToolBinary::at("tesseract", "/nonexistent/tesseract"),
            Duration::from_secs(5),
        );
        let error = engine
            .recognize(Path::new("page-1.png"), "eng")
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            OcrEngineError::Tool(ToolError::NotInstalled { tool: "tesseract" })
        ));
    }
}
