//! Submission checks that run before any workspace is allocated.

use super::types::{DEFAULT_LANGUAGE, ExtractionOptions, JobRequest, ProcessingError};

/// Every PDF starts with this signature (possibly after a few bytes of junk).
const PDF_SIGNATURE: &[u8] = b"%PDF-";
/// The PDF reference allows the header within the first 1024 bytes.
const SIGNATURE_WINDOW: usize = 1024;

/// Reject submissions that cannot be a PDF and normalize the options.
pub fn validate_request(request: JobRequest) -> Result<JobRequest, ProcessingError> {
    let JobRequest {
        filename,
        bytes,
        options,
    } = request;

    let filename = filename.trim().to_string();
    if !has_pdf_extension(&filename) {
        return Err(ProcessingError::InvalidInput(
            "Only PDF files are supported".to_string(),
        ));
    }
    if bytes.is_empty() {
        return Err(ProcessingError::InvalidInput(format!("{filename} is empty")));
    }
    if !has_pdf_signature(&bytes) {
        return Err(ProcessingError::InvalidInput(format!(
            "{filename} does not look like a PDF document"
        )));
    }

    Ok(JobRequest {
        filename,
        bytes,
        options: normalize_options(options),
    })
}

/// Case-insensitive `.pdf` suffix check.
pub fn has_pdf_extension(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".pdf")
}

fn has_pdf_signature(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
    window
        .windows(PDF_SIGNATURE.len())
        .any(|candidate| candidate == PDF_SIGNATURE)
}

fn normalize_options(options: ExtractionOptions) -> ExtractionOptions {
    let language = options.language.trim();
    let language = if language.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        language.to_string()
    };
    ExtractionOptions {
        language,
        ..options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filename: &str, bytes: &[u8]) -> JobRequest {
        JobRequest {
            filename: filename.into(),
            bytes: bytes.to_vec(),
            options: ExtractionOptions::default(),
        }
    }

    #[test]
    fn accepts_pdf_with_any_extension_case() {
        assert!(validate_request(request("Report.PDF", b"%PDF-1.7\n")).is_ok());
        assert!(validate_request(request("scan.pdf", b"\xef\xbb\xbf%PDF-1.4")).is_ok());
    }

    #[test]
    fn rejects_non_pdf_file_names() {
        let error = validate_request(request("notes.docx", b"%PDF-1.7")).unwrap_err();
        assert!(matches!(error, ProcessingError::InvalidInput(_)));
        assert!(validate_request(request("pdf", b"%PDF-1.7")).is_err());
    }

    #[test]
    fn rejects_empty_and_unsigned_bytes() {
        assert!(matches!(
            validate_request(request("a.pdf", b"")),
            Err(ProcessingError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_request(request("a.pdf", b"PK\x03\x04 not a pdf")),
            Err(ProcessingError::InvalidInput(_))
        ));
    }

    #[test]
    fn blank_language_falls_back_to_default() {
        let mut submission = request(" doc.pdf ", b"%PDF-1.7");
        submission.options.language = "  ".into();
        let validated = validate_request(submission).unwrap();
        assert_eq!(validated.filename, "doc.pdf");
        assert_eq!(validated.options.language, "eng");

        let mut submission = request("doc.pdf", b"%PDF-1.7");
        submission.options.language = " fra ".into();
        assert_eq!(validate_request(submission).unwrap().options.language, "fra");
    }
}
