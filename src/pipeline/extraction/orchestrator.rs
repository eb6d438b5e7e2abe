use std::path::Path;

use super::format::detect_format;
use super::pdf::LopdfExtractor;
use super::sanitize::sanitize_extracted_text;
use super::types::{ExtractionResult, PdfExtractor, TextExtractor};
use super::ExtractionError;
use crate::models::{ExtractionMethod, FileKind};

/// Default extractor: sniff the format, then route to the PDF text layer or
/// a UTF-8 decode. Images and unknown binaries have no recoverable text.
pub struct DocumentTextExtractor {
    pdf: Box<dyn PdfExtractor + Send + Sync>,
}

impl DocumentTextExtractor {
    pub fn new(pdf: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        Self { pdf }
    }

    fn decode(
        &self,
        bytes: &[u8],
        kind: FileKind,
    ) -> Result<(ExtractionMethod, String), ExtractionError> {
        match kind {
            FileKind::Pdf => {
                let pages = self.pdf.extract_pages(bytes)?;
                Ok((ExtractionMethod::PdfTextLayer, pages.join("\n")))
            }
            FileKind::PlainText => {
                if let Err(e) = std::str::from_utf8(bytes) {
                    let e = ExtractionError::EncodingError(e.to_string());
                    tracing::debug!(error = %e, "Invalid UTF-8 sequences dropped from text");
                }
                let text = String::from_utf8_lossy(bytes).replace(char::REPLACEMENT_CHARACTER, "");
                Ok((ExtractionMethod::PlainText, text))
            }
            FileKind::Image | FileKind::Unknown => Ok((ExtractionMethod::NoText, String::new())),
        }
    }
}

impl Default for DocumentTextExtractor {
    fn default() -> Self {
        Self::new(Box::new(LopdfExtractor))
    }
}

impl TextExtractor for DocumentTextExtractor {
    fn extract(&self, path: &Path) -> ExtractionResult {
        let format = match detect_format(path) {
            Ok(format) => format,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Extraction: file unreadable");
                return ExtractionResult::empty(0, FileKind::Unknown);
            }
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let e = ExtractionError::Io {
                    path: path.to_path_buf(),
                    source,
                };
                tracing::warn!(error = %e, "Extraction: file unreadable");
                return ExtractionResult::empty(format.file_size_bytes, format.kind);
            }
        };
        if bytes.is_empty() {
            tracing::warn!(path = %path.display(), error = %ExtractionError::EmptyFile, "Extraction skipped");
            return ExtractionResult::empty(0, format.kind);
        }
        let size_hint = bytes.len() as u64;

        let (method, raw) = match self.decode(&bytes, format.kind) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    kind = format.kind.as_str(),
                    error = %e,
                    "Extraction failed, continuing with empty text"
                );
                return ExtractionResult::empty(size_hint, format.kind);
            }
        };

        let text = sanitize_extracted_text(&raw);
        let method = if text.is_empty() {
            ExtractionMethod::NoText
        } else {
            method
        };

        tracing::debug!(
            path = %path.display(),
            kind = format.kind.as_str(),
            mime_type = %format.mime_type,
            method = method.as_str(),
            size_hint,
            text_length = text.len(),
            "Extraction complete"
        );

        ExtractionResult {
            text,
            size_hint,
            kind: format.kind,
            method,
        }
    }
}
