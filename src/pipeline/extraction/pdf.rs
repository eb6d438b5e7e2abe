use lopdf::Document;

use super::types::PdfExtractor;
use super::ExtractionError;

/// PDF text layer extractor backed by lopdf.
/// Handles digital PDFs with embedded text; scans come back as empty pages.
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let document = Document::load_mem(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(ExtractionError::PdfParsing("document has no pages".into()));
        }

        let mut texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            // One undecodable page should not cost the whole document its text.
            let text = match document.extract_text(&[*page_number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(page = page_number, error = %e, "PDF page has no decodable text");
                    String::new()
                }
            };
            texts.push(text);
        }

        Ok(texts)
    }
}
