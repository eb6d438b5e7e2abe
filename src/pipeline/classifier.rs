//! Naive Bayes document classifier.
//!
//! Trained once from the configured corpus (category → example snippets)
//! before any document is analysed, then read-only. Classification is a pure
//! function of the normalized input: lower-cased alphanumeric tokens scored
//! with Laplace-smoothed multinomial likelihoods.
//!
//! Ties between the best categories go to the category trained first.
//! Input with no vocabulary hits, or scores that are uniform across every
//! category, yields `Category::unclassified()`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::CorpusEntry;

/// Label of the implicit fallback category.
pub const UNCLASSIFIED: &str = "UNCLASSIFIED";

/// Scores closer than this are treated as equal.
const UNIFORM_EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Training corpus is empty")]
    EmptyCorpus,

    #[error("Training entry has an empty category label")]
    EmptyLabel,

    #[error("Category {0} is reserved for the fallback outcome")]
    ReservedLabel(String),
}

/// Classifier label. Upper-cased on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(label: &str) -> Self {
        Self(label.trim().to_uppercase())
    }

    pub fn unclassified() -> Self {
        Self(UNCLASSIFIED.to_string())
    }

    pub fn is_unclassified(&self) -> bool {
        self.0 == UNCLASSIFIED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    /// Posterior of the chosen category; `0.0` when unclassified.
    pub probability: f64,
}

impl Classification {
    fn unclassified() -> Self {
        Self {
            category: Category::unclassified(),
            probability: 0.0,
        }
    }
}

/// Lower-case and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug)]
struct CategoryStats {
    category: Category,
    documents: usize,
    word_counts: HashMap<String, u32>,
    total_words: u64,
}

#[derive(Debug)]
pub struct BayesClassifier {
    /// First-trained order; drives tie-breaking.
    stats: Vec<CategoryStats>,
    vocabulary: HashSet<String>,
    total_documents: usize,
}

impl BayesClassifier {
    /// Accumulate per-category word frequencies from the labelled corpus.
    pub fn train(corpus: &[CorpusEntry]) -> Result<Self, ClassifierError> {
        if corpus.is_empty() {
            return Err(ClassifierError::EmptyCorpus);
        }

        let mut stats: Vec<CategoryStats> = Vec::new();
        let mut vocabulary = HashSet::new();

        for entry in corpus {
            let category = Category::new(&entry.category);
            if category.as_str().is_empty() {
                return Err(ClassifierError::EmptyLabel);
            }
            if category.is_unclassified() {
                return Err(ClassifierError::ReservedLabel(category.0));
            }

            let idx = match stats.iter().position(|s| s.category == category) {
                Some(idx) => idx,
                None => {
                    stats.push(CategoryStats {
                        category,
                        documents: 0,
                        word_counts: HashMap::new(),
                        total_words: 0,
                    });
                    stats.len() - 1
                }
            };

            let slot = &mut stats[idx];
            slot.documents += 1;
            for token in tokenize(&entry.text) {
                *slot.word_counts.entry(token.clone()).or_insert(0) += 1;
                slot.total_words += 1;
                vocabulary.insert(token);
            }
        }

        tracing::info!(
            categories = stats.len(),
            vocabulary = vocabulary.len(),
            examples = corpus.len(),
            "Classifier training complete"
        );

        Ok(Self {
            stats,
            vocabulary,
            total_documents: corpus.len(),
        })
    }

    /// Trained categories in first-trained order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.stats.iter().map(|s| &s.category)
    }

    pub fn classify(&self, text: &str) -> Classification {
        let tokens: Vec<String> = tokenize(text)
            .into_iter()
            .filter(|t| self.vocabulary.contains(t))
            .collect();

        if tokens.is_empty() {
            return Classification::unclassified();
        }

        let scores: Vec<f64> = self.stats.iter().map(|s| self.log_score(s, &tokens)).collect();

        let mut best = 0;
        for (idx, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best] + UNIFORM_EPSILON {
                best = idx;
            }
        }

        let worst = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        if scores.len() > 1 && scores[best] - worst < UNIFORM_EPSILON {
            return Classification::unclassified();
        }

        // Softmax over log scores for a normalized posterior.
        let max = scores[best];
        let denom: f64 = scores.iter().map(|s| (s - max).exp()).sum();

        Classification {
            category: self.stats[best].category.clone(),
            probability: 1.0 / denom,
        }
    }

    fn log_score(&self, stats: &CategoryStats, tokens: &[String]) -> f64 {
        let prior = stats.documents as f64 / self.total_documents as f64;
        let denom = stats.total_words as f64 + self.vocabulary.len() as f64;
        tokens.iter().fold(prior.ln(), |acc, token| {
            let count = stats.word_counts.get(token).copied().unwrap_or(0) as f64;
            acc + ((count + 1.0) / denom).ln()
        })
    }
}
