/// Clean extracted text before it reaches the classifier and rules.
///
/// Drops control characters (keeping line structure), trims each line and
/// removes blank lines. Currency symbols and separators are kept intact.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\t' || c == '\r' { ' ' } else { c })
        .filter(|c| *c == '\n' || !c.is_control())
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_bytes() {
        let clean = sanitize_extracted_text("Total\x00 due");
        assert!(!clean.contains('\x00'));
        assert_eq!(clean, "Total due");
    }

    #[test]
    fn keeps_currency_and_separators() {
        let clean = sanitize_extracted_text("Invoice total: $1,234.56 / €45,00 / £9");
        assert_eq!(clean, "Invoice total: $1,234.56 / €45,00 / £9");
    }

    #[test]
    fn drops_blank_lines_and_trims() {
        let clean = sanitize_extracted_text("  line one  \r\n\n\t\nline two\n");
        assert_eq!(clean, "line one\nline two");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(sanitize_extracted_text(""), "");
        assert_eq!(sanitize_extracted_text("\x01\x02\n\n"), "");
    }
}
