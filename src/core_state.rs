//! Process-scoped application state.
//!
//! `CoreState` is built once at startup and shared (`Arc`) with the HTTP
//! layer. It owns the record store, the trained pipeline and the config;
//! request handlers never construct any of these themselves.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{ConfigError, TriageConfig};
use crate::models::{DocumentRecord, NewDocument};
use crate::pipeline::extraction::format::sanitize_filename;
use crate::pipeline::{AnalysisOrchestrator, PipelineSetupError};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline setup failed: {0}")]
    Setup(#[from] PipelineSetupError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Upload storage error at {path}: {source}")]
    Upload {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct CoreState {
    pub config: TriageConfig,
    store: Arc<DocumentStore>,
    orchestrator: Arc<AnalysisOrchestrator>,
}

impl CoreState {
    /// Validate `config`, train the classifier and wire store + orchestrator from `config`.
    pub fn new(config: TriageConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let store = Arc::new(DocumentStore::new());
        let orchestrator = Arc::new(AnalysisOrchestrator::from_config(&config, store.clone())?);
        Ok(Self {
            config,
            store,
            orchestrator,
        })
    }

    /// Assemble from pre-built parts (tests inject extractors this way).
    pub fn from_parts(
        config: TriageConfig,
        store: Arc<DocumentStore>,
        orchestrator: Arc<AnalysisOrchestrator>,
    ) -> Self {
        Self {
            config,
            store,
            orchestrator,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &Arc<AnalysisOrchestrator> {
        &self.orchestrator
    }

    /// Create the `PROCESSING` record and start its analysis in the
    /// background. Returns as soon as the record exists.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ingest(&self, new: NewDocument) -> Result<DocumentRecord, CoreError> {
        let record = self.store.create(&new)?;
        tracing::info!(
            document_id = %record.id,
            original_name = %record.original_name,
            "Document ingested"
        );
        // The record was just created, so the id cannot be in flight yet.
        let _ = self
            .orchestrator
            .trigger_analysis(record.id, new.stored_path);
        Ok(record)
    }

    /// Persist uploaded bytes as `<millis>-<sanitized name>` under the upload
    /// directory, then ingest.
    pub async fn accept_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<DocumentRecord, CoreError> {
        let dir = &self.config.upload_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| CoreError::Upload {
                path: dir.clone(),
                source,
            })?;

        let file_name = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            sanitize_filename(original_name)
        );
        let stored_path = dir.join(&file_name);
        tokio::fs::write(&stored_path, bytes)
            .await
            .map_err(|source| CoreError::Upload {
                path: stored_path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %stored_path.display(),
            size = bytes.len(),
            "Upload stored"
        );

        self.ingest(NewDocument {
            original_name: original_name.to_string(),
            file_name,
            stored_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;

    fn state_in(dir: &tempfile::TempDir) -> CoreState {
        let config = TriageConfig {
            upload_dir: dir.path().join("uploads"),
            ..TriageConfig::default()
        };
        CoreState::new(config).unwrap()
    }

    async fn wait_terminal(state: &CoreState, id: &uuid::Uuid) -> DocumentRecord {
        for _ in 0..200 {
            let record = state.store().find_by_id(id).unwrap().unwrap();
            if record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("document {id} never left PROCESSING");
    }

    #[tokio::test]
    async fn ingest_returns_processing_record() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);
        let path = dir.path().join("r.txt");
        std::fs::write(&path, "thank you for shopping, card total 9.99").unwrap();

        let record = state
            .ingest(NewDocument {
                original_name: "r.txt".into(),
                file_name: "r.txt".into(),
                stored_path: path,
            })
            .unwrap();

        assert_eq!(record.status, DocumentStatus::Processing);
        assert!(record.data.is_none());
        assert_eq!(state.store().len(), 1);

        let done = wait_terminal(&state, &record.id).await;
        assert_eq!(done.status, DocumentStatus::AutoApproved);
    }

    #[tokio::test]
    async fn accept_upload_stores_sanitized_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(&dir);

        let record = state
            .accept_upload("../../etc/invoice.txt", b"Invoice total: $45.00")
            .await
            .unwrap();

        assert_eq!(record.original_name, "../../etc/invoice.txt");
        assert!(record.file_name.ends_with("-invoice.txt"));
        assert!(!record.file_name.contains('/'));
        assert!(dir.path().join("uploads").join(&record.file_name).exists());

        let done = wait_terminal(&state, &record.id).await;
        assert_eq!(done.status, DocumentStatus::RequiresApproval);
    }

    #[test]
    fn invalid_config_fails_setup() {
        let config = TriageConfig {
            corpus: Vec::new(),
            ..TriageConfig::default()
        };
        assert!(matches!(CoreState::new(config), Err(CoreError::Config(_))));

        let config = TriageConfig::from_json_str(
            r#"{ "category_rules": [
                { "category": "RECEIPT", "action": { "kind": "fixed", "status": "PROCESSING" } }
            ] }"#,
        )
        .unwrap();
        assert!(matches!(CoreState::new(config), Err(CoreError::Config(_))));
    }
}
