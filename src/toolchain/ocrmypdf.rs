//! Document normalizer backed by the `ocrmypdf` CLI.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{
    NormalizationError, NormalizeOptions, NormalizedDocument, Normalizer, TextExtractor,
    ToolBinary,
};

/// First ocrmypdf major release that rejects `--remove-background`.
const BACKGROUND_REMOVAL_DROPPED_IN: u32 = 13;

/// Deskews, cleans, rotates, strips backgrounds, and OCRs a whole document with `ocrmypdf`.
///
/// The text layer of the output is read back through a [`TextExtractor`]. Background removal is
/// only requested from releases that still accept it; the installed version is probed once.
pub struct OcrmypdfNormalizer {
    binary: ToolBinary,
    timeout: Duration,
    text_layer: Arc<dyn TextExtractor>,
    remove_background: OnceCell<bool>,
}

impl OcrmypdfNormalizer {
    /// Create a normalizer that resolves `ocrmypdf` from `PATH`.
    pub fn new(timeout: Duration, text_layer: Arc<dyn TextExtractor>) -> Self {
        Self::with_binary(ToolBinary::new("ocrmypdf"), timeout, text_layer)
    }

    /// Create a normalizer around an explicit binary.
    pub fn with_binary(
        binary: ToolBinary,
        timeout: Duration,
        text_layer: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            binary,
            timeout,
            text_layer,
            remove_background: OnceCell::new(),
        }
    }

    async fn remove_background(&self) -> bool {
        *self
            .remove_background
            .get_or_init(|| async {
                let output = match self.binary.run(["--version"], self.timeout).await {
                    Ok(output) => output,
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            "ocrmypdf version probe failed; skipping background removal"
                        );
                        return false;
                    }
                };
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                match parse_major_version(&version) {
                    Some(major) if major < BACKGROUND_REMOVAL_DROPPED_IN => true,
                    Some(_) => {
                        tracing::info!(
                            version = %version,
                            "ocrmypdf no longer accepts --remove-background; normalizing without it"
                        );
                        false
                    }
                    None => {
                        tracing::warn!(
                            version = %version,
                            "Unrecognized ocrmypdf version; skipping background removal"
                        );
                        false
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl Normalizer for OcrmypdfNormalizer {
    fn is_available(&self) -> bool {
        self.binary.is_available() && self.text_layer.is_available()
    }

    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        options: &NormalizeOptions,
    ) -> Result<NormalizedDocument, NormalizationError> {
        let remove_background = self.remove_background().await;
        self.binary
            .run(
                normalize_args(input, output, options, remove_background),
                self.timeout,
            )
            .await?;

        let output_size_bytes = tokio::fs::metadata(output).await?.len();
        let pages = self.text_layer.extract(output).await?.unwrap_or_default();
        tracing::debug!(
            pages = pages.len(),
            output_size_bytes,
            "Normalized document text layer read"
        );
        Ok(NormalizedDocument {
            pages,
            output_size_bytes,
        })
    }
}

/// Major release number from `ocrmypdf --version` output such as `16.4.2` or `v12.7.2`.
fn parse_major_version(version: &str) -> Option<u32> {
    version
        .split_whitespace()
        .next()?
        .trim_start_matches('v')
        .split('.')
        .next()?
        .parse()
        .ok()
}

fn normalize_args(
    input: &Path,
    output: &Path,
    options: &NormalizeOptions,
    remove_background: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-l", options.language.as_str(), "--deskew", "--clean"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push("--rotate-pages".into());
    if remove_background {
        args.push("--remove-background".into());
    }
    args.extend(
        [
            "--output-type",
            "pdf",
            "--optimize",
            if options.optimize { "1" } else { "0" },
            if options.force_ocr {
                "--force-ocr"
            } else {
                "--skip-text"
            },
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(input.as_os_str().to_owned());
    args.push(output.as_os_str().to_owned());
    args
}
