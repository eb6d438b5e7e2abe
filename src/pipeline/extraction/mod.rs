//! Text Extractor.
//!
//! Turns an uploaded file into `ExtractionResult { text, size_hint }`.
//! PDFs go through the lopdf text layer, plain text is decoded as UTF-8,
//! images and unknown binaries yield no text. Nothing in here fails the
//! pipeline: every internal error is logged and degrades to empty text.

pub mod types;
pub mod format;
pub mod sanitize;
pub mod pdf;
pub mod orchestrator;

pub use types::*;
pub use format::{detect_format, FormatDetection};
pub use sanitize::sanitize_extracted_text;
pub use pdf::LopdfExtractor;
pub use orchestrator::DocumentTextExtractor;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("File is empty")]
    EmptyFile,
}
