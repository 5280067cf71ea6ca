//! In-memory repository fakes for pipeline and scheduler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use veridoc_core::{
    new_v7, CreateDocumentRequest, CreateExtractionResult, Document, DocumentRepository,
    DocumentStatus, DocumentType, Error, ExtractionRepository, ExtractionResult, Result,
    StorageBackend, VerificationRecord, VerificationRepository,
};

/// Map-backed DocumentRepository with the same single-claimer semantics
/// as the conditional UPDATE in Postgres.
#[derive(Default)]
pub struct InMemoryDocuments {
    rows: Mutex<HashMap<Uuid, Document>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot a row for assertions.
    pub fn snapshot(&self, id: Uuid) -> Option<Document> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    /// Pull `next_attempt_at` into the past so the document is claimable
    /// without waiting out the backoff.
    pub fn make_eligible(&self, id: Uuid) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.get_mut(&id) {
            doc.next_attempt_at = Utc::now() - Duration::seconds(1);
        }
    }

    /// Age a claim so it looks abandoned by a crashed worker.
    pub fn backdate_processing(&self, id: Uuid, secs: i64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(doc) = rows.get_mut(&id) {
            doc.processing_started_at = Some(Utc::now() - Duration::seconds(secs));
        }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocuments {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document> {
        let now = Utc::now();
        let document = Document {
            id: new_v7(),
            owner_id: req.owner_id,
            doc_type: req.doc_type,
            status: DocumentStatus::Uploaded,
            storage_path: req.storage_path,
            content_hash: req.content_hash,
            size_bytes: req.size_bytes,
            mime_type: req.mime_type,
            file_name: req.file_name,
            uploaded_at: now,
            claim_token: None,
            retry_count: 0,
            next_attempt_at: now,
            processing_started_at: None,
            processing_completed_at: None,
            last_error: None,
        };
        self.rows
            .lock()
            .unwrap()
            .insert(document.id, document.clone());
        Ok(document)
    }

    async fn get(&self, id: Uuid) -> Result<Document> {
        self.rows
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn claim_next(&self, claim_token: Uuid) -> Result<Option<Document>> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        let candidate = rows
            .values()
            .filter(|d| d.status == DocumentStatus::Uploaded && d.next_attempt_at <= now)
            .min_by_key(|d| d.uploaded_at)
            .map(|d| d.id);
        let Some(id) = candidate else {
            return Ok(None);
        };
        let doc = rows.get_mut(&id).expect("candidate row");
        doc.status = DocumentStatus::Processing;
        doc.claim_token = Some(claim_token);
        doc.processing_started_at = Some(now);
        Ok(Some(doc.clone()))
    }

    async fn set_document_type(&self, id: Uuid, doc_type: DocumentType) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let doc = rows.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.doc_type = doc_type;
        Ok(())
    }

    async fn release_for_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let doc = rows.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.status = DocumentStatus::Uploaded;
        doc.claim_token = None;
        doc.retry_count = retry_count;
        doc.next_attempt_at = next_attempt_at;
        doc.last_error = Some(error.to_string());
        doc.processing_started_at = None;
        Ok(())
    }

    async fn mark_rejected(&self, id: Uuid, error: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let doc = rows.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.status = DocumentStatus::Rejected;
        doc.claim_token = None;
        doc.last_error = Some(error.to_string());
        doc.processing_completed_at = Some(Utc::now());
        Ok(())
    }

    async fn finish(&self, id: Uuid, status: DocumentStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let doc = rows.get_mut(&id).ok_or(Error::DocumentNotFound(id))?;
        doc.status = status;
        doc.claim_token = None;
        doc.processing_completed_at = Some(Utc::now());
        Ok(())
    }

    async fn release_stale_claims(&self, max_age_secs: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::seconds(max_age_secs);
        let mut rows = self.rows.lock().unwrap();
        let mut released = 0;
        for doc in rows.values_mut() {
            if doc.status == DocumentStatus::Processing
                && doc.processing_started_at.is_some_and(|t| t < cutoff)
            {
                doc.status = DocumentStatus::Uploaded;
                doc.claim_token = None;
                doc.processing_started_at = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn pending_count(&self) -> Result<i64> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.status == DocumentStatus::Uploaded && d.next_attempt_at <= now)
            .count() as i64)
    }
}

/// Vec-backed append-only ExtractionRepository.
#[derive(Default)]
pub struct InMemoryExtractions {
    rows: Mutex<Vec<ExtractionResult>>,
}

impl InMemoryExtractions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_for(&self, document_id: Uuid) -> usize {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.document_id == document_id)
            .count()
    }
}

#[async_trait]
impl ExtractionRepository for InMemoryExtractions {
    async fn insert(&self, req: CreateExtractionResult) -> Result<ExtractionResult> {
        let result = ExtractionResult {
            id: new_v7(),
            document_id: req.document_id,
            classified_type: req.classified_type,
            overall_confidence: req.overall_confidence,
            raw_text: req.raw_text,
            fields: req.fields,
            validation_errors: req.validation_errors,
            status: req.status,
            processed_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(result.clone());
        Ok(result)
    }

    async fn latest_for_document(&self, document_id: Uuid) -> Result<Option<ExtractionResult>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.document_id == document_id)
            .max_by_key(|r| (r.processed_at, r.id))
            .cloned())
    }

    async fn history_for_document(&self, document_id: Uuid) -> Result<Vec<ExtractionResult>> {
        let mut rows: Vec<ExtractionResult> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse((r.processed_at, r.id)));
        Ok(rows)
    }
}

/// Vec-backed VerificationRepository with supersede-on-insert semantics.
#[derive(Default)]
pub struct InMemoryVerifications {
    rows: Mutex<Vec<VerificationRecord>>,
}

impl InMemoryVerifications {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VerificationRepository for InMemoryVerifications {
    async fn insert_current(&self, mut record: VerificationRecord) -> Result<VerificationRecord> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap();
        for row in rows.iter_mut() {
            if row.document_id == record.document_id && row.superseded_at.is_none() {
                row.superseded_at = Some(now);
            }
        }
        record.superseded_at = None;
        rows.push(record.clone());
        Ok(record)
    }

    async fn current_for_document(&self, document_id: Uuid) -> Result<Option<VerificationRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.document_id == document_id && r.superseded_at.is_none())
            .cloned())
    }

    async fn history_for_document(&self, document_id: Uuid) -> Result<Vec<VerificationRecord>> {
        let mut rows: Vec<VerificationRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse((r.created_at, r.id)));
        Ok(rows)
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<VerificationRecord>> {
        use veridoc_core::VerificationStatus;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.superseded_at.is_none()
                    && !matches!(
                        r.status,
                        VerificationStatus::Rejected | VerificationStatus::Expired
                    )
                    && r.expires_at.is_some_and(|t| t < now)
            })
            .cloned()
            .collect())
    }
}

/// Map-backed StorageBackend.
#[derive(Default)]
pub struct InMemoryStorage {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no blob at {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(path))
    }
}
