//! OCR languages advertised to callers.

use serde::Serialize;

/// An OCR language offered to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// Tesseract language code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
}

impl Language {
    const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }
}

/// Languages surfaced to callers. Codes outside this list are still forwarded to the OCR
/// engine, which decides whether it supports them.
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language::new("eng", "English"),
    Language::new("ara", "Arabic"),
    Language::new("spa", "Spanish"),
    Language::new("fra", "French"),
    Language::new("deu", "German"),
    Language::new("ita", "Italian"),
    Language::new("por", "Portuguese"),
    Language::new("rus", "Russian"),
    Language::new("chi_sim", "Chinese Simplified"),
    Language::new("jpn", "Japanese"),
    Language::new("kor", "Korean"),
];

/// Whether `code` is in the advertised list.
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|language| language.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_covers_the_advertised_languages() {
        assert_eq!(SUPPORTED_LANGUAGES.len(), 11);
        assert_eq!(SUPPORTED_LANGUAGES[0].code, "eng");
        assert!(is_supported("chi_sim"));
        assert!(!is_supported("klingon"));
    }
}
