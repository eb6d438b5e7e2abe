//! Analysis Orchestrator.
//!
//! Drives extract → legal screen → classify → decide for one document, off
//! the request path, and writes the outcome back with exactly one
//! `update_by_id`:
//!
//! ```text
//! trigger_analysis ─spawn─▶ analyze ─spawn_blocking─▶ Analyzer::analyze_file
//!                                   ◀──── Decision ───┘
//!                           └─▶ DocumentStore::update_by_id
//! ```
//!
//! Any failure on the way (worker panic, timeout) becomes a `REVIEW_NEEDED`
//! decision with a diagnostic summary, so a record never stays `PROCESSING`.
//! At most one analysis per document id runs at a time; documents run
//! concurrently with no ordering between their completions.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use uuid::Uuid;

use super::classifier::BayesClassifier;
use super::extraction::{ExtractionResult, TextExtractor};
use super::legal::LegalScreen;
use super::rules::{extract_amount, Decision, RuleEngine};
use super::PipelineSetupError;
use crate::config::TriageConfig;
use crate::models::DocumentRecord;
use crate::pipeline::extraction::DocumentTextExtractor;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis worker failed: {0}")]
    WorkerFailed(String),

    #[error("analysis timed out after {0:?}")]
    TimedOut(Duration),
}

/// How one `analyze` call ended.
#[derive(Debug)]
pub enum AnalysisOutcome {
    /// The record reached its terminal status.
    Updated(DocumentRecord),
    /// The record disappeared before the result was ready; result discarded.
    TargetMissing,
    /// Another analysis of the same id is running; nothing was done.
    AlreadyInFlight,
    /// The store refused the write (already terminal, or lock poisoned).
    Rejected(StoreError),
}

/// The synchronous part of the pipeline. Shared read-only across tasks.
pub struct Analyzer {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    classifier: BayesClassifier,
    rules: RuleEngine,
    legal: LegalScreen,
}

impl Analyzer {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        classifier: BayesClassifier,
        rules: RuleEngine,
        legal: LegalScreen,
    ) -> Self {
        Self {
            extractor,
            classifier,
            rules,
            legal,
        }
    }

    /// Train the classifier and compile the legal screen from `config`.
    pub fn from_config(
        config: &TriageConfig,
        extractor: Box<dyn TextExtractor + Send + Sync>,
    ) -> Result<Self, PipelineSetupError> {
        Ok(Self::new(
            extractor,
            BayesClassifier::train(&config.corpus)?,
            RuleEngine::from_config(config),
            LegalScreen::new(&config.legal_keywords)?,
        ))
    }

    pub fn classifier(&self) -> &BayesClassifier {
        &self.classifier
    }

    pub fn analyze_file(&self, path: &Path) -> Decision {
        let extraction = self.extractor.extract(path);
        self.decide(&extraction)
    }

    pub fn decide(&self, extraction: &ExtractionResult) -> Decision {
        let normalized = extraction.text.to_lowercase();

        if let Some(keyword) = self.legal.find(&normalized) {
            tracing::info!(keyword = %keyword, "Legal keyword matched, classifier bypassed");
            return Decision::pending_legal(&keyword);
        }

        let classification = self.classifier.classify(&normalized);
        let amount = extract_amount(&extraction.text);
        tracing::debug!(
            category = %classification.category,
            probability = classification.probability,
            amount,
            size_hint = extraction.size_hint,
            "Classified document"
        );

        self.rules.decide(
            &classification.category,
            &extraction.text,
            amount,
            extraction.size_hint,
        )
    }
}

/// Releases the in-flight claim on drop, including on panic.
struct InFlightGuard {
    id: Uuid,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.id);
        }
    }
}

pub struct AnalysisOrchestrator {
    analyzer: Arc<Analyzer>,
    store: Arc<DocumentStore>,
    timeout: Option<Duration>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl AnalysisOrchestrator {
    pub fn new(analyzer: Arc<Analyzer>, store: Arc<DocumentStore>, timeout: Option<Duration>) -> Self {
        Self {
            analyzer,
            store,
            timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Orchestrator with the default extractor, configured from `config`.
    pub fn from_config(
        config: &TriageConfig,
        store: Arc<DocumentStore>,
    ) -> Result<Self, PipelineSetupError> {
        let analyzer = Analyzer::from_config(config, Box::new(DocumentTextExtractor::default()))?;
        Ok(Self::new(
            Arc::new(analyzer),
            store,
            config.analysis_timeout_secs.map(Duration::from_secs),
        ))
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn is_in_flight(&self, id: &Uuid) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    fn claim(&self, id: Uuid) -> Option<InFlightGuard> {
        // A poisoned set only ever held ids; keep using it.
        let mut set = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(id) {
            return None;
        }
        Some(InFlightGuard {
            id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Fire-and-forget: spawn the analysis and return immediately.
    ///
    /// Returns `None` when an analysis of `document_id` is already running.
    /// The handle may be dropped; the task keeps running.
    /// Must be called from within a tokio runtime.
    pub fn trigger_analysis(
        self: &Arc<Self>,
        document_id: Uuid,
        path: PathBuf,
    ) -> Option<JoinHandle<()>> {
        let Some(guard) = self.claim(document_id) else {
            tracing::warn!(document_id = %document_id, "Analysis already in flight, trigger ignored");
            return None;
        };
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            this.run_claimed(document_id, path, guard).await;
        }))
    }

    /// Analyse one document to completion and commit the result.
    pub async fn analyze(&self, document_id: Uuid, path: PathBuf) -> AnalysisOutcome {
        match self.claim(document_id) {
            Some(guard) => self.run_claimed(document_id, path, guard).await,
            None => AnalysisOutcome::AlreadyInFlight,
        }
    }

    async fn run_claimed(
        &self,
        document_id: Uuid,
        path: PathBuf,
        _guard: InFlightGuard,
    ) -> AnalysisOutcome {
        let started = Instant::now();
        tracing::info!(document_id = %document_id, path = %path.display(), "Analysis started");

        let decision = match self.run_pipeline(path).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(document_id = %document_id, error = %e, "Analysis degraded to review");
                Decision::degraded(&e.to_string())
            }
        };
        let decision = if decision.status.is_terminal() {
            decision
        } else {
            tracing::error!(
                document_id = %document_id,
                status = decision.status.as_str(),
                "Routing produced a non-terminal status"
            );
            Decision::degraded(&format!("routing produced non-terminal status {}", decision.status))
        };

        let status = decision.status;
        match self.store.update_by_id(&document_id, decision.into_patch()) {
            Ok(Some(record)) => {
                tracing::info!(
                    document_id = %document_id,
                    status = status.as_str(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Analysis complete"
                );
                AnalysisOutcome::Updated(record)
            }
            Ok(None) => {
                tracing::warn!(
                    document_id = %document_id,
                    status = status.as_str(),
                    "Analysis target missing, result discarded"
                );
                AnalysisOutcome::TargetMissing
            }
            Err(e) => {
                tracing::error!(document_id = %document_id, error = %e, "Analysis result rejected by store");
                AnalysisOutcome::Rejected(e)
            }
        }
    }

    async fn run_pipeline(&self, path: PathBuf) -> Result<Decision, AnalysisError> {
        let analyzer = Arc::clone(&self.analyzer);
        let task = tokio::task::spawn_blocking(move || analyzer.analyze_file(&path));

        // On timeout the blocking worker is left to finish on its own; its
        // result is dropped.
        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| AnalysisError::TimedOut(limit))?,
            None => task.await,
        };

        joined.map_err(|e| {
            let reason = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            AnalysisError::WorkerFailed(reason)
        })
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ConfidenceBasis, DocumentStatus, ExtractionMethod, FileKind, NewDocument,
    };
    use crate::pipeline::classifier::Category;

    struct PanickingExtractor;

    impl TextExtractor for PanickingExtractor {
        fn extract(&self, _path: &Path) -> ExtractionResult {
            panic!("decoder blew up");
        }
    }

    struct SlowExtractor(Duration);

    impl TextExtractor for SlowExtractor {
        fn extract(&self, _path: &Path) -> ExtractionResult {
            std::thread::sleep(self.0);
            ExtractionResult {
                text: "Invoice total: $5.00".into(),
                size_hint: 20,
                kind: FileKind::PlainText,
                method: ExtractionMethod::PlainText,
            }
        }
    }

    fn setup_with(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        timeout: Option<Duration>,
    ) -> (Arc<AnalysisOrchestrator>, Arc<DocumentStore>) {
        let config = TriageConfig::default();
        let store = Arc::new(DocumentStore::new());
        let analyzer = Analyzer::from_config(&config, extractor).unwrap();
        let orchestrator = AnalysisOrchestrator::new(Arc::new(analyzer), store.clone(), timeout);
        (Arc::new(orchestrator), store)
    }

    fn setup() -> (Arc<AnalysisOrchestrator>, Arc<DocumentStore>) {
        setup_with(Box::new(DocumentTextExtractor::default()), None)
    }

    fn ingest(store: &DocumentStore, dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> (Uuid, PathBuf) {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        let record = store
            .create(&NewDocument {
                original_name: name.into(),
                file_name: name.into(),
                stored_path: path.clone(),
            })
            .unwrap();
        (record.id, path)
    }

    fn expect_updated(outcome: AnalysisOutcome) -> DocumentRecord {
        match outcome {
            AnalysisOutcome::Updated(record) => record,
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invoice_over_threshold_requires_approval() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "inv.txt", b"Invoice total: $45.00\nPayment due");

        let record = expect_updated(orchestrator.analyze(id, path).await);

        assert_eq!(record.status, DocumentStatus::RequiresApproval);
        let data = record.data.unwrap();
        assert_eq!(data.amount, 45.0);
        assert_eq!(data.summary, "INVOICE detected");
        assert_eq!(data.confidence, ConfidenceBasis::Measured);
        assert_eq!(store.find_by_id(&id).unwrap().unwrap().status, DocumentStatus::RequiresApproval);
    }

    #[tokio::test]
    async fn latin1_invoice_is_still_classified() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(
            &store,
            &dir,
            "inv.txt",
            b"Invoice bill total amount due payment tax vat: $45.00 Caf\xE9",
        );

        let record = expect_updated(orchestrator.analyze(id, path).await);
        assert_eq!(record.status, DocumentStatus::RequiresApproval);
        let data = record.data.unwrap();
        assert_eq!(data.summary, "INVOICE detected");
        assert_eq!(data.amount, 45.0);
    }

    #[tokio::test]
    async fn small_invoice_auto_approved() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "inv.txt", b"Invoice bill: $12.50 tax included");

        let record = expect_updated(orchestrator.analyze(id, path).await);
        assert_eq!(record.status, DocumentStatus::AutoApproved);
        assert_eq!(record.data.unwrap().amount, 12.5);
    }

    #[tokio::test]
    async fn legal_keyword_takes_precedence_over_classifier() {
        let (orchestrator, store) = setup();
        let text = "Service agreement: invoice payment total due, tax and vat";
        assert_eq!(
            orchestrator.analyzer().classifier().classify(&text.to_lowercase()).category,
            Category::new("INVOICE")
        );

        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "contract.txt", text.as_bytes());
        let record = expect_updated(orchestrator.analyze(id, path).await);

        assert_eq!(record.status, DocumentStatus::PendingLegal);
        assert!(record.data.unwrap().summary.contains("agreement"));
    }

    #[tokio::test]
    async fn resume_archived_for_hr() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(
            &store,
            &dir,
            "cv.pdf",
            &crate::pipeline::extraction::pdf::test_support::make_test_pdf(&[
                "Resume - experience 2019 education university skills",
            ]),
        );

        let record = expect_updated(orchestrator.analyze(id, path).await);
        assert_eq!(record.status, DocumentStatus::ArchivedHr);
        assert_eq!(record.data.unwrap().amount, 0.0);
    }

    #[tokio::test]
    async fn large_scan_without_text_is_estimated() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.resize(50_000, 0x11);
        let (id, path) = ingest(&store, &dir, "scan.jpg", &jpeg);

        let record = expect_updated(orchestrator.analyze(id, path).await);
        assert_eq!(record.status, DocumentStatus::AutoApproved);
        assert_eq!(record.data.unwrap().confidence, ConfidenceBasis::Estimated);
    }

    #[tokio::test]
    async fn unreadable_file_still_reaches_terminal_status() {
        let (orchestrator, store) = setup();
        let record = store
            .create(&NewDocument {
                original_name: "gone.pdf".into(),
                file_name: "gone.pdf".into(),
                stored_path: PathBuf::from("/nonexistent/gone.pdf"),
            })
            .unwrap();

        let updated = expect_updated(
            orchestrator
                .analyze(record.id, PathBuf::from("/nonexistent/gone.pdf"))
                .await,
        );
        assert_eq!(updated.status, DocumentStatus::ReviewNeeded);
    }

    #[tokio::test]
    async fn worker_panic_degrades_to_review() {
        let (orchestrator, store) = setup_with(Box::new(PanickingExtractor), None);
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "x.txt", b"anything");

        let record = expect_updated(orchestrator.analyze(id, path).await);
        assert_eq!(record.status, DocumentStatus::ReviewNeeded);
        let data = record.data.unwrap();
        assert_eq!(data.confidence, ConfidenceBasis::Degraded);
        assert!(data.summary.contains("decoder blew up"));
        assert!(!orchestrator.is_in_flight(&id));
    }

    #[tokio::test]
    async fn timeout_degrades_to_review() {
        let (orchestrator, store) = setup_with(
            Box::new(SlowExtractor(Duration::from_millis(500))),
            Some(Duration::from_millis(20)),
        );
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "x.txt", b"anything");

        let record = expect_updated(orchestrator.analyze(id, path).await);
        assert_eq!(record.status, DocumentStatus::ReviewNeeded);
        assert!(record.data.unwrap().summary.contains("timed out"));
    }

    #[tokio::test]
    async fn non_terminal_rule_degrades_to_review() {
        // Bypasses TriageConfig::validate, which would reject this rule.
        let config = TriageConfig::from_json_str(
            r#"{ "category_rules": [
                { "category": "RECEIPT", "action": { "kind": "fixed", "status": "PROCESSING" } }
            ] }"#,
        )
        .unwrap();
        let store = Arc::new(DocumentStore::new());
        let analyzer =
            Analyzer::from_config(&config, Box::new(DocumentTextExtractor::default())).unwrap();
        let orchestrator = AnalysisOrchestrator::new(Arc::new(analyzer), store.clone(), None);

        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "r.txt", b"thank you for shopping, card total 9.99");
        let record = expect_updated(orchestrator.analyze(id, path).await);

        assert_eq!(record.status, DocumentStatus::ReviewNeeded);
        let data = record.data.unwrap();
        assert_eq!(data.confidence, ConfidenceBasis::Degraded);
        assert!(data.summary.contains("non-terminal"));
    }

    #[tokio::test]
    async fn missing_target_discards_result() {
        let (orchestrator, _store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.txt");
        std::fs::write(&path, "Invoice total: $45.00").unwrap();

        let outcome = orchestrator.analyze(Uuid::new_v4(), path).await;
        assert!(matches!(outcome, AnalysisOutcome::TargetMissing));
    }

    #[tokio::test]
    async fn completed_document_is_not_reanalysed() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "inv.txt", b"Invoice total: $45.00");

        expect_updated(orchestrator.analyze(id, path.clone()).await);
        let second = orchestrator.analyze(id, path).await;
        assert!(matches!(second, AnalysisOutcome::Rejected(StoreError::AlreadyFinalized(_))));
    }

    #[tokio::test]
    async fn trigger_is_single_flight_per_document() {
        let (orchestrator, store) =
            setup_with(Box::new(SlowExtractor(Duration::from_millis(200))), None);
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "inv.txt", b"ignored");

        let first = orchestrator.trigger_analysis(id, path.clone());
        assert!(first.is_some());
        assert!(orchestrator.is_in_flight(&id));
        assert!(orchestrator.trigger_analysis(id, path).is_none());

        first.unwrap().await.unwrap();
        let record = store.find_by_id(&id).unwrap().unwrap();
        assert_eq!(record.status, DocumentStatus::AutoApproved);
        assert!(!orchestrator.is_in_flight(&id));
    }

    #[tokio::test]
    async fn trigger_returns_before_analysis_completes() {
        let (orchestrator, store) =
            setup_with(Box::new(SlowExtractor(Duration::from_millis(200))), None);
        let dir = tempfile::tempdir().unwrap();
        let (id, path) = ingest(&store, &dir, "inv.txt", b"ignored");

        let handle = orchestrator.trigger_analysis(id, path).unwrap();
        assert_eq!(
            store.find_by_id(&id).unwrap().unwrap().status,
            DocumentStatus::Processing
        );
        handle.await.unwrap();
        assert!(store.find_by_id(&id).unwrap().unwrap().status.is_terminal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_documents_analysed_concurrently() {
        let (orchestrator, store) = setup();
        let dir = tempfile::tempdir().unwrap();

        let mut handles = Vec::new();
        let mut ids = Vec::new();
        for i in 0..20 {
            let body = format!("Receipt from the store, thank you for shopping. Total {i}.99");
            let (id, path) = ingest(&store, &dir, &format!("r{i}.txt"), body.as_bytes());
            ids.push((id, i));
            handles.push(orchestrator.trigger_analysis(id, path).unwrap());
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for (id, i) in ids {
            let record = store.find_by_id(&id).unwrap().unwrap();
            assert_eq!(record.status, DocumentStatus::AutoApproved);
            assert!((record.data.unwrap().amount - (i as f64 + 0.99)).abs() < 1e-9);
        }
    }
}
