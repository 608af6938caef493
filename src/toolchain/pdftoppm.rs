//! Raster renderer backed by poppler's `pdftoppm`.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::{RenderError, Renderer, ToolBinary};
use crate::processing::PageImage;

const OUTPUT_PREFIX: &str = "page";

/// Renders PDF pages to PNG files with `pdftoppm`.
pub struct PdftoppmRenderer {
    binary: ToolBinary,
    timeout: Duration,
}

impl PdftoppmRenderer {
    /// Create a renderer that resolves `pdftoppm` from `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_binary(ToolBinary::new("pdftoppm"), timeout)
    }

    /// Create a renderer around an explicit binary.
    pub fn with_binary(binary: ToolBinary, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl Renderer for PdftoppmRenderer {
    fn is_available(&self) -> bool {
        self.binary.is_available()
    }

    async fn render(
        &self,
        pdf: &Path,
        output_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PageImage>, RenderError> {
        tokio::fs::create_dir_all(output_dir).await?;
        let dpi_arg = dpi.to_string();
        let prefix = output_dir.join(OUTPUT_PREFIX);
        self.binary
            .run(
                [
                    OsStr::new("-png"),
                    OsStr::new("-r"),
                    OsStr::new(&dpi_arg),
                    pdf.as_os_str(),
                    prefix.as_os_str(),
                ],
                self.timeout,
            )
            .await?;

        let mut pages = Vec::new();
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(page_number) = file_name.to_str().and_then(page_number_from_file_name) else {
                continue;
            };
            pages.push(PageImage::new(page_number, entry.path(), dpi));
        }

        if pages.is_empty() {
            return Err(RenderError::NoPages);
        }
        pages.sort_by_key(PageImage::page_number);
        tracing::debug!(pages = pages.len(), dpi, "Rendered page images");
        Ok(pages)
    }
}

/// Parse the page number out of a `pdftoppm` output name such as `page-007.png`.
///
/// Zero padding depends on the document's page count, so names are never compared as strings.
pub fn page_number_from_file_name(name: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(OUTPUT_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".png")?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|page| *page > 0)
}
