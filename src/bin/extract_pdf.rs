use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pdfocr::{
    config, logging,
    processing::{ExtractionOptions, ExtractionService, JobRequest},
};

#[derive(Parser)]
#[command(
    name = "extract-pdf",
    about = "Extract text from a local PDF with the installed OCR toolchain"
)]
struct Cli {
    /// PDF document to extract.
    file: PathBuf,
    /// OCR language code passed to the OCR engines.
    #[arg(long, default_value = "eng")]
    language: String,
    /// Keep the normalized document unoptimized.
    #[arg(long)]
    no_optimize: bool,
    /// Re-OCR pages that already carry text during normalization.
    #[arg(long)]
    force_ocr: bool,
    /// Print the full JSON report instead of the text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing_with(false);

    let bytes = tokio::fs::read(&cli.file)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    let filename = cli
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let service = ExtractionService::from_config();
    let report = service
        .extract(JobRequest {
            filename,
            bytes,
            options: ExtractionOptions {
                language: cli.language,
                optimize: !cli.no_optimize,
                force_ocr: cli.force_ocr,
            },
        })
        .await
        .with_context(|| format!("Extraction failed for {}", cli.file.display()))?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        println!("{}", report.text);
        eprintln!(
            "strategy={} pages={} chars={} duration_ms={}",
            report.metrics.strategy_used,
            report.metrics.page_count,
            report.metrics.text_length,
            report.metrics.duration_ms
        );
    }
    Ok(())
}
