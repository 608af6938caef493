//! Direct text-layer extraction backed by poppler's `pdftotext`.

use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::{TextExtractionError, TextExtractor, ToolBinary};
use crate::processing::PageText;

/// `pdftotext` terminates every page with a form feed.
const PAGE_BREAK: char = '\u{000C}';

/// Reads the embedded text layer with `pdftotext <input> -`.
pub struct PdftotextExtractor {
    binary: ToolBinary,
    timeout: Duration,
}

impl PdftotextExtractor {
    /// Create an extractor that resolves `pdftotext` from `PATH`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_binary(ToolBinary::new("pdftotext"), timeout)
    }

    /// Create an extractor around an explicit binary.
    pub fn with_binary(binary: ToolBinary, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

#[async_trait]
impl TextExtractor for PdftotextExtractor {
    fn is_available(&self) -> bool {
        self.binary.is_available()
    }

    async fn extract(&self, pdf: &Path) -> Result<Option<Vec<PageText>>, TextExtractionError> {
        let output = self
            .binary
            .run([pdf.as_os_str(), OsStr::new("-")], self.timeout)
            .await?;
        let text = String::from_utf8_lossy(&output.stdout);
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(split_pages(&text)))
    }
}

/// Split `pdftotext` output into 1-based page blocks.
///
/// The trailing form feed after the last page does not start a new page. Page blocks are
/// trimmed but kept even when empty so numbering follows the document.
pub fn split_pages(text: &str) -> Vec<PageText> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let body = body.strip_suffix(PAGE_BREAK).unwrap_or(body);
    body.split(PAGE_BREAK)
        .zip(1..)
        .map(|(page, number)| PageText::new(number, page.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_form_feeds() {
        let pages = split_pages("first page\n\u{c}second page\n\u{c}");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].text, "first page");
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[1].text, "second page");
    }

    #[test]
    fn keeps_blank_pages_in_numbering() {
        let pages = split_pages("cover\u{c}\u{c}appendix\u{c}");
        let numbers: Vec<u32> = pages.iter().map(|page| page.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(pages[1].text.is_empty());
        assert_eq!(pages[2].text, "appendix");
    }

    #[test]
    fn text_without_form_feed_is_one_page() {
        let pages = split_pages("just text\n");
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "just text");
    }
}
