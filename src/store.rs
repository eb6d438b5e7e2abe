//! Process-scoped document record store.
//!
//! Owns every `DocumentRecord`. Readers get clones; the only mutation after
//! creation is `update_by_id`, which performs its read-modify-write under the
//! write lock so no reader ever observes a half-applied patch.
//!
//! Records are never deleted here. Retention is an external concern.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::{DocumentRecord, DocumentStatus, NewDocument, RecordPatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record store lock poisoned")]
    LockPoisoned,

    #[error("Document {0} already reached a terminal status")]
    AlreadyFinalized(Uuid),

    #[error("Document id {0} already exists")]
    DuplicateId(Uuid),

    #[error("Refusing to patch document {id} with non-terminal status {status}")]
    NonTerminalPatch { id: Uuid, status: DocumentStatus },
}

struct Slot {
    /// Insertion order, breaks upload-time ties in `list_all`.
    seq: u64,
    record: DocumentRecord,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<Uuid, Slot>,
    next_seq: u64,
}

/// In-memory, single-process document table.
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<Inner>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record in `PROCESSING` for a freshly ingested file.
    pub fn create(&self, new: &NewDocument) -> Result<DocumentRecord, StoreError> {
        self.insert(DocumentRecord::processing(new))
    }

    /// Insert a fully-formed record. Ids are never reused.
    pub fn insert(&self, record: DocumentRecord) -> Result<DocumentRecord, StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        if inner.slots.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.slots.insert(
            record.id,
            Slot {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    /// All records, newest upload first.
    pub fn list_all(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut slots: Vec<&Slot> = inner.slots.values().collect();
        slots.sort_by(|a, b| {
            b.record
                .upload_time
                .cmp(&a.record.upload_time)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(slots.into_iter().map(|s| s.record.clone()).collect())
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<DocumentRecord>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.slots.get(id).map(|s| s.record.clone()))
    }

    /// Apply the terminal patch to `id`.
    ///
    /// Returns `Ok(None)` when the id is unknown (record purged externally).
    /// A record that already left `PROCESSING` is never patched again, and a
    /// patch must itself carry a terminal status.
    pub fn update_by_id(
        &self,
        id: &Uuid,
        patch: RecordPatch,
    ) -> Result<Option<DocumentRecord>, StoreError> {
        if !patch.status.is_terminal() {
            return Err(StoreError::NonTerminalPatch {
                id: *id,
                status: patch.status,
            });
        }
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(slot) = inner.slots.get_mut(id) else {
            return Ok(None);
        };
        if slot.record.status.is_terminal() {
            return Err(StoreError::AlreadyFinalized(*id));
        }
        slot.record.status = patch.status;
        slot.record.data = Some(patch.data);
        Ok(Some(slot.record.clone()))
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
