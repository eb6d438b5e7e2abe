//! Rule Engine: (category, text, amount, size) → (status, payload).
//!
//! Pure and deterministic. Category rules come from configuration; any
//! category without a rule (including the unclassified fallback) is routed
//! on word count, or on a size-derived proxy when the document has bytes
//! but no words (scans, photos).
//!
//! Amount convention, fixed regardless of locale: the last `.` or `,` is a
//! decimal point when 1-2 digits follow it; every other separator groups
//! thousands. `45,000` is 45000, `45,00` is 45.00, `1.234,56` is 1234.56.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TriageConfig;
use crate::models::{ConfidenceBasis, DocumentData, DocumentStatus, RecordPatch};
use crate::pipeline::classifier::Category;

/// Optional currency symbol, a grouped or plain integer part, optional
/// 1-2 digit decimal part.
static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[$€£]\s?)?((?:[0-9]{1,3}(?:[.,][0-9]{3})+|[0-9]+)(?:[.,][0-9]{1,2})?)\b")
        .expect("Invalid amount regex pattern")
});

/// What to do with a document of a given category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAction {
    /// Compare the extracted amount with the approval threshold.
    /// The threshold itself routes to `at_or_above`.
    AmountThreshold {
        below: DocumentStatus,
        at_or_above: DocumentStatus,
    },
    /// Always route to `status`.
    Fixed {
        status: DocumentStatus,
        #[serde(default)]
        discard_amount: bool,
    },
}

/// Terminal status plus the payload to store with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status: DocumentStatus,
    pub data: DocumentData,
}

impl Decision {
    /// Legal keyword hit, classifier bypassed.
    pub fn pending_legal(keyword: &str) -> Self {
        Self {
            status: DocumentStatus::PendingLegal,
            data: DocumentData {
                summary: format!("Legal document detected (keyword: {keyword})"),
                amount: 0.0,
                confidence: ConfidenceBasis::Measured,
            },
        }
    }

    /// Analysis could not complete; a human has to look at it.
    pub fn degraded(diagnostic: &str) -> Self {
        Self {
            status: DocumentStatus::ReviewNeeded,
            data: DocumentData {
                summary: format!("Analysis failed: {diagnostic}"),
                amount: 0.0,
                confidence: ConfidenceBasis::Degraded,
            },
        }
    }

    pub fn into_patch(self) -> RecordPatch {
        RecordPatch {
            status: self.status,
            data: self.data,
        }
    }
}

/// First amount in `text`, or `0.0` when none is present.
pub fn extract_amount(text: &str) -> f64 {
    AMOUNT_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| normalize_amount(m.as_str()))
        .unwrap_or(0.0)
}

fn normalize_amount(raw: &str) -> Option<f64> {
    let (int_part, fraction) = match raw.rfind(['.', ',']) {
        Some(idx) if raw.len() - idx - 1 <= 2 => (&raw[..idx], Some(&raw[idx + 1..])),
        _ => (raw, None),
    };
    let digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = match fraction {
        Some(fraction) => format!("{digits}.{fraction}"),
        None => digits,
    };
    normalized.parse().ok()
}

/// Runs of alphanumeric characters.
pub fn count_words(text: &str) -> usize {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .count()
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    approval_amount: f64,
    review_word_count: f64,
    scan_min_bytes: u64,
    bytes_per_word: f64,
    rules: Vec<(Category, RuleAction)>,
}

impl RuleEngine {
    pub fn from_config(config: &TriageConfig) -> Self {
        Self {
            approval_amount: config.thresholds.approval_amount,
            review_word_count: config.thresholds.review_word_count,
            scan_min_bytes: config.scan_fallback.min_bytes,
            bytes_per_word: config.scan_fallback.bytes_per_word,
            rules: config
                .category_rules
                .iter()
                .map(|r| (Category::new(&r.category), r.action.clone()))
                .collect(),
        }
    }

    pub fn approval_threshold(&self) -> f64 {
        self.approval_amount
    }

    pub fn review_threshold(&self) -> f64 {
        self.review_word_count
    }

    fn rule_for(&self, category: &Category) -> Option<&RuleAction> {
        if category.is_unclassified() {
            return None;
        }
        self.rules
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, action)| action)
    }

    /// Proxy magnitude for a document with bytes but no words.
    /// `None` when the document is too small to be a plausible scan.
    pub fn scan_proxy(&self, size_hint: u64) -> Option<f64> {
        (size_hint > self.scan_min_bytes).then(|| size_hint as f64 / self.bytes_per_word)
    }

    pub fn decide(
        &self,
        category: &Category,
        raw_text: &str,
        amount: f64,
        size_hint: u64,
    ) -> Decision {
        match self.rule_for(category) {
            Some(RuleAction::AmountThreshold { below, at_or_above }) => {
                let status = if amount < self.approval_amount {
                    *below
                } else {
                    *at_or_above
                };
                measured(status, format!("{category} detected"), amount)
            }
            Some(RuleAction::Fixed {
                status,
                discard_amount,
            }) => {
                let amount = if *discard_amount { 0.0 } else { amount };
                measured(*status, format!("{category} detected"), amount)
            }
            None => self.decide_without_rule(category, raw_text, amount, size_hint),
        }
    }

    fn decide_without_rule(
        &self,
        category: &Category,
        raw_text: &str,
        amount: f64,
        size_hint: u64,
    ) -> Decision {
        let label = if category.is_unclassified() {
            "Unclassified".to_string()
        } else {
            format!("{category} (no routing rule)")
        };
        let route = |signal: f64| {
            if signal > self.review_word_count {
                DocumentStatus::AutoApproved
            } else {
                DocumentStatus::ReviewNeeded
            }
        };

        let words = count_words(raw_text);
        if words > 0 {
            return measured(
                route(words as f64),
                format!("{label} document ({words} words)"),
                amount,
            );
        }

        match self.scan_proxy(size_hint) {
            Some(proxy) => Decision {
                status: route(proxy),
                data: DocumentData {
                    summary: format!("{label} scan (estimated from {size_hint} bytes)"),
                    amount: proxy,
                    confidence: ConfidenceBasis::Estimated,
                },
            },
            None => measured(
                DocumentStatus::ReviewNeeded,
                format!("{label} document (no text)"),
                0.0,
            ),
        }
    }
}

fn measured(status: DocumentStatus, summary: String, amount: f64) -> Decision {
    Decision {
        status,
        data: DocumentData {
            summary,
            amount,
            confidence: ConfidenceBasis::Measured,
        },
    }
}
