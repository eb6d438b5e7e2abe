use std::io::Read;
use std::path::Path;

use mime_guess::mime;

use super::ExtractionError;
use crate::models::FileKind;

/// Result of format detection
#[derive(Debug, Clone)]
pub struct FormatDetection {
    pub mime_type: String,
    pub kind: FileKind,
    pub file_size_bytes: u64,
}

/// Detect file kind from magic bytes first, then from the declared
/// extension when the content itself is not recognisable.
pub fn detect_format(path: &Path) -> Result<FormatDetection, ExtractionError> {
    let io_err = |source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file_size = std::fs::metadata(path).map_err(io_err)?.len();

    // Read first 16 bytes for magic number detection
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut header = [0u8; 16];
    let bytes_read = file.read(&mut header).map_err(io_err)?;

    let sniffed = match &header[..bytes_read.min(8)] {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some(("application/pdf", FileKind::Pdf)),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some(("image/jpeg", FileKind::Image)),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(("image/png", FileKind::Image)),
        // GIF87a / GIF89a
        [0x47, 0x49, 0x46, 0x38, ..] => Some(("image/gif", FileKind::Image)),
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => {
            Some(("image/tiff", FileKind::Image))
        }
        // HEIC/HEIF: "ftyp" at offset 4
        _ if bytes_read >= 12 && &header[4..8] == b"ftyp" => Some(("image/heic", FileKind::Image)),
        _ => None,
    };

    let (mime_type, kind) = match sniffed {
        Some((mime_type, kind)) => (mime_type.to_string(), kind),
        None if is_likely_text(path)? => ("text/plain".to_string(), FileKind::PlainText),
        None => declared_kind(path),
    };

    Ok(FormatDetection {
        mime_type,
        kind,
        file_size_bytes: file_size,
    })
}

/// Kind implied by the file extension alone.
fn declared_kind(path: &Path) -> (String, FileKind) {
    let Some(guess) = mime_guess::from_path(path).first() else {
        return ("application/octet-stream".to_string(), FileKind::Unknown);
    };
    let kind = if guess == mime::APPLICATION_PDF {
        FileKind::Pdf
    } else if guess.type_() == mime::IMAGE {
        FileKind::Image
    } else if guess.type_() == mime::TEXT {
        FileKind::PlainText
    } else {
        FileKind::Unknown
    };
    (guess.essence_str().to_string(), kind)
}

/// Check if a file is likely plain text: mostly printable once decoded,
/// with invalid UTF-8 sequences counted against it rather than rejecting
/// the whole file (Latin-1 bytes in otherwise ASCII receipts).
fn is_likely_text(path: &Path) -> Result<bool, ExtractionError> {
    let io_err = |source| ExtractionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut buffer = vec![0u8; 4096];
    let n = file.read(&mut buffer).map_err(io_err)?;
    buffer.truncate(n);

    if n == 0 {
        return Ok(false);
    }

    let text = String::from_utf8_lossy(&buffer);

    // At least 80% printable characters (or whitespace)
    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    Ok(printable as f64 / total as f64 > 0.80)
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .take(200)
        .collect();

    if clean.is_empty() {
        "document".to_string()
    } else {
        clean
    }
}
