//! Triage configuration.
//!
//! Every policy value the pipeline consumes lives here: thresholds, the scan
//! fallback, the training corpus, the category → status rules and the legal
//! keyword list. Defaults are overridden by an optional JSON file
//! (`DOCTRIAGE_CONFIG`) and then by individual environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::DocumentStatus;
use crate::pipeline::rules::RuleAction;

/// Application-level constants
pub const APP_NAME: &str = "doctriage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CONFIG_PATH_ENV: &str = "DOCTRIAGE_CONFIG";

/// Data directory: `<local data dir>/doctriage`, or `./doctriage` when the
/// platform has no such directory.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Where uploaded file bytes are written.
pub fn default_upload_dir() -> PathBuf {
    app_data_dir().join("uploads")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "doctriage=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Numeric routing thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// INVOICE amounts strictly below this are auto-approved; at or above
    /// need approval. The source system used 20; other deployments used
    /// larger limits, so treat this as policy.
    pub approval_amount: f64,
    /// Unclassified documents whose word count (or scan proxy) exceeds this
    /// are auto-approved.
    pub review_word_count: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            approval_amount: 20.0,
            review_word_count: 50.0,
        }
    }
}

/// Size-based estimate for documents that have bytes but no text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFallback {
    /// Documents at or below this size with no words are not estimated.
    pub min_bytes: u64,
    /// proxy = size_hint / bytes_per_word
    pub bytes_per_word: f64,
}

impl Default for ScanFallback {
    fn default() -> Self {
        Self {
            min_bytes: 1024,
            bytes_per_word: 10.0,
        }
    }
}

/// One labelled training snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub category: String,
    pub text: String,
}

impl CorpusEntry {
    pub fn new(category: &str, text: &str) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// Routing rule for one classifier category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub action: RuleAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub thresholds: Thresholds,
    pub scan_fallback: ScanFallback,
    pub corpus: Vec<CorpusEntry>,
    pub category_rules: Vec<CategoryRule>,
    pub legal_keywords: Vec<String>,
    /// Upper bound for one analysis. `None` disables the bound.
    pub analysis_timeout_secs: Option<u64>,
    pub upload_dir: PathBuf,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            scan_fallback: ScanFallback::default(),
            corpus: default_corpus(),
            category_rules: default_category_rules(),
            legal_keywords: default_legal_keywords(),
            analysis_timeout_secs: Some(120),
            upload_dir: default_upload_dir(),
            bind_addr: "127.0.0.1:5000".into(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// The fixed starter corpus: two snippets per business category.
pub fn default_corpus() -> Vec<CorpusEntry> {
    vec![
        CorpusEntry::new("INVOICE", "invoice bill total amount due payment tax vat"),
        CorpusEntry::new("INVOICE", "payment received purchase order cost fee"),
        CorpusEntry::new(
            "RECEIPT",
            "market store receipt cash change card total rewe aldi lidl",
        ),
        CorpusEntry::new("RECEIPT", "thank you for shopping visit again"),
        CorpusEntry::new(
            "RESUME",
            "resume cv experience education skills references profile worked",
        ),
        CorpusEntry::new(
            "RESUME",
            "university bachelor master graduated email phone",
        ),
    ]
}

pub fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule {
            category: "INVOICE".into(),
            action: RuleAction::AmountThreshold {
                below: DocumentStatus::AutoApproved,
                at_or_above: DocumentStatus::RequiresApproval,
            },
        },
        CategoryRule {
            category: "RECEIPT".into(),
            action: RuleAction::Fixed {
                status: DocumentStatus::AutoApproved,
                discard_amount: false,
            },
        },
        CategoryRule {
            category: "RESUME".into(),
            action: RuleAction::Fixed {
                status: DocumentStatus::ArchivedHr,
                discard_amount: true,
            },
        },
    ]
}

pub fn default_legal_keywords() -> Vec<String> {
    ["agreement", "contract", "non-disclosure", "nda", "terms and conditions"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl TriageConfig {
    /// Defaults, then `DOCTRIAGE_CONFIG` file, then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_json_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply `DOCTRIAGE_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOCTRIAGE_APPROVAL_THRESHOLD") {
            self.thresholds.approval_amount = parse_env("DOCTRIAGE_APPROVAL_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("DOCTRIAGE_REVIEW_THRESHOLD") {
            self.thresholds.review_word_count = parse_env("DOCTRIAGE_REVIEW_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("DOCTRIAGE_SCAN_MIN_BYTES") {
            self.scan_fallback.min_bytes = parse_env("DOCTRIAGE_SCAN_MIN_BYTES", &v)?;
        }
        if let Some(v) = lookup("DOCTRIAGE_ANALYSIS_TIMEOUT_SECS") {
            let secs: u64 = parse_env("DOCTRIAGE_ANALYSIS_TIMEOUT_SECS", &v)?;
            // 0 disables the bound
            self.analysis_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = lookup("DOCTRIAGE_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOCTRIAGE_BIND_ADDR") {
            self.bind_addr = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !t.approval_amount.is_finite() || t.approval_amount < 0.0 {
            return Err(invalid("thresholds.approval_amount", "must be a non-negative number"));
        }
        if !t.review_word_count.is_finite() || t.review_word_count < 0.0 {
            return Err(invalid("thresholds.review_word_count", "must be a non-negative number"));
        }
        let bpw = self.scan_fallback.bytes_per_word;
        if !bpw.is_finite() || bpw <= 0.0 {
            return Err(invalid("scan_fallback.bytes_per_word", "must be positive"));
        }
        if self.corpus.is_empty() {
            return Err(invalid("corpus", "at least one training entry is required"));
        }
        if self.corpus.iter().any(|e| e.category.trim().is_empty()) {
            return Err(invalid("corpus", "category labels must not be empty"));
        }
        if self.legal_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(invalid("legal_keywords", "keywords must not be empty"));
        }
        for rule in &self.category_rules {
            let statuses = match &rule.action {
                RuleAction::AmountThreshold { below, at_or_above } => vec![*below, *at_or_above],
                RuleAction::Fixed { status, .. } => vec![*status],
            };
            if statuses.iter().any(|s| !s.is_terminal()) {
                return Err(invalid("category_rules", "rule statuses must be terminal"));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        field,
        reason: format!("{value:?}: {e}"),
    })
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}
