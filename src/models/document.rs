use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ConfidenceBasis, DocumentStatus};

/// One uploaded document and its triage outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: Uuid,
    pub original_name: String,
    pub file_name: String,
    pub status: DocumentStatus,
    pub upload_time: DateTime<Utc>,
    /// `None` while `status == Processing`.
    pub data: Option<DocumentData>,
}

/// Result payload written by the single terminal update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    pub summary: String,
    pub amount: f64,
    pub confidence: ConfidenceBasis,
}

/// Fields supplied by the ingestion side when a record is created.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub original_name: String,
    pub file_name: String,
    pub stored_path: PathBuf,
}

/// Terminal update applied by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPatch {
    pub status: DocumentStatus,
    pub data: DocumentData,
}

impl DocumentRecord {
    /// Fresh record in `PROCESSING` with no payload.
    pub fn processing(new: &NewDocument) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_name: new.original_name.clone(),
            file_name: new.file_name.clone(),
            status: DocumentStatus::Processing,
            upload_time: Utc::now(),
            data: None,
        }
    }
}
