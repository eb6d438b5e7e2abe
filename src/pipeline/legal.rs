//! Legal-agreement screen. A keyword hit routes the document to
//! `PENDING_LEGAL` before the classifier is consulted.

use regex::{Regex, RegexBuilder};

/// Case-insensitive whole-word keyword matcher (simple plurals included).
///
/// Keywords only match as whole words: `disagreement` or `agreement123` do
/// not trigger, which keeps short keywords like `nda` from firing inside
/// `monday` or `calendar`.
#[derive(Debug, Clone)]
pub struct LegalScreen {
    pattern: Option<Regex>,
}

impl LegalScreen {
    pub fn new(keywords: &[String]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(&k.to_lowercase()))
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&format!(r"\b({})(?:e?s)?\b", alternatives.join("|")))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// First legal keyword found in `text`, lower-cased.
    pub fn find(&self, text: &str) -> Option<String> {
        let pattern = self.pattern.as_ref()?;
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
    }
}
