//! Document-to-text extraction. Treated as an opaque capability: PDFs go
//! through pdf-extract, everything else is read as UTF-8. Format-by-format
//! fidelity (docx and friends) is out of scope for the core.

use std::io::Write;

use crate::errors::AppError;

/// Extracts plain text from an uploaded document, dispatching on the
/// object key's extension.
pub fn extract_text(key: &str, bytes: &[u8]) -> Result<String, AppError> {
    if key.to_ascii_lowercase().ends_with(".pdf") {
        extract_pdf_text(key, bytes)
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn extract_pdf_text(key: &str, bytes: &[u8]) -> Result<String, AppError> {
    // pdf-extract wants a path, so spill to a scratch file first.
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("temp file for {key}: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("writing temp file for {key}: {e}")))?;

    pdf_extract::extract_text(tmp.path())
        .map_err(|e| AppError::UnprocessableEntity(format!("could not extract text from {key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let text = extract_text("opportunities/jd.txt", b"Senior DevOps, AWS/IaC/Docker").unwrap();
        assert_eq!(text, "Senior DevOps, AWS/IaC/Docker");
    }

    #[test]
    fn test_unknown_extension_treated_as_text() {
        let text = extract_text("opportunities/jd.md", b"# Role\nRust engineer").unwrap();
        assert!(text.contains("Rust engineer"));
    }

    #[test]
    fn test_invalid_pdf_is_unprocessable() {
        let err = extract_text("opportunities/resume.pdf", b"not a pdf at all").unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        let err = extract_text("opportunities/resume.PDF", b"junk").unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
    }
}
