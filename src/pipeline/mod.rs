//! Document analysis pipeline: extraction, legal screen, classification and
//! rule-based routing, driven per document by the orchestrator.

pub mod classifier;
pub mod extraction;
pub mod legal;
pub mod orchestrator;
pub mod rules;

pub use orchestrator::{AnalysisOrchestrator, AnalysisOutcome, Analyzer};

/// Failures building the pipeline from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineSetupError {
    #[error("classifier training failed: {0}")]
    Classifier(#[from] classifier::ClassifierError),

    #[error("invalid legal keyword pattern: {0}")]
    LegalKeywords(#[from] regex::Error),
}
