use std::time::Duration;

use pdfocr::config::PipelineMode;
use pdfocr::processing::{
    ExtractionOptions, ExtractionService, JobRequest, ServiceSettings, Strategy,
};
use pdfocr::toolchain::Toolchain;

/// Build a one-page PDF whose content stream draws `text` with Helvetica.
fn text_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
        format!("<< /Length {} >>\nstream\n{stream}\nendstream", stream.len()),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (index, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{object}\nendobj\n", index + 1).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    pdf
}

#[tokio::test]
#[ignore = "Requires poppler and tesseract"]
async fn live_direct_extraction_reads_text_layer() {
    let root = tempfile::tempdir().unwrap();
    let service = ExtractionService::new(
        ServiceSettings {
            pipeline_mode: PipelineMode::Simple,
            workspace_root: Some(root.path().to_path_buf()),
            ..ServiceSettings::default()
        },
        Toolchain::system(Duration::from_secs(60)),
    );

    let report = service
        .extract(JobRequest {
            filename: "hello.pdf".into(),
            bytes: text_pdf("Hello pdfocr"),
            options: ExtractionOptions::default(),
        })
        .await
        .expect("live extraction");

    assert_eq!(report.metrics.strategy_used, Strategy::Direct);
    assert!(report.text.starts_with("--- Page 1 ---"));
    assert!(report.text.contains("Hello pdfocr"));
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
#[ignore = "Requires poppler and tesseract"]
async fn live_toolchain_is_detected() {
    let status = Toolchain::system(Duration::from_secs(5)).status();
    assert!(status.pdftoppm);
    assert!(status.tesseract);
    assert!(status.pdftotext);
}
