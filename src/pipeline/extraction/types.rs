use std::path::Path;

use super::ExtractionError;
use crate::models::{ExtractionMethod, FileKind};

/// Raw text recovered from one file. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Possibly empty.
    pub text: String,
    /// Bytes read from the source, 0 when the file could not be read.
    pub size_hint: u64,
    pub kind: FileKind,
    pub method: ExtractionMethod,
}

impl ExtractionResult {
    /// The recovered-failure shape: no text, whatever size was observed.
    pub fn empty(size_hint: u64, kind: FileKind) -> Self {
        Self {
            text: String::new(),
            size_hint,
            kind,
            method: ExtractionMethod::NoText,
        }
    }
}

/// PDF text layer abstraction (allows mocking for tests)
pub trait PdfExtractor {
    /// One string per page, in page order.
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// File → text. Implementations must not fail: errors are recovered into
/// `ExtractionResult::empty`.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> ExtractionResult;
}
