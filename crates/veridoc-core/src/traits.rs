//! Core traits for veridoc abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability. Postgres
//! implementations live in `veridoc-db`; OCR engine adapters live in
//! `veridoc-jobs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// DOCUMENT REPOSITORY
// =============================================================================

/// Request for creating a document row on upload.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub owner_id: Uuid,
    pub doc_type: DocumentType,
    pub storage_path: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub file_name: String,
}

/// Repository for document rows and claim bookkeeping.
///
/// The claim is the pipeline's sole concurrency-control point: a single
/// conditional write that either claims the document or affects no row.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document (status `Uploaded`, no claim token).
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document>;

    /// Fetch a document by ID.
    async fn get(&self, id: Uuid) -> Result<Document>;

    /// Atomically claim the oldest eligible document.
    ///
    /// Eligible: status `Uploaded` and `next_attempt_at <= now`, taken
    /// oldest-upload-first. Returns `None` when nothing is eligible or
    /// another claimer won the race (a claim conflict is not an error).
    async fn claim_next(&self, claim_token: Uuid) -> Result<Option<Document>>;

    /// Persist the classified type on a document.
    async fn set_document_type(&self, id: Uuid, doc_type: DocumentType) -> Result<()>;

    /// Release a claim back to `Uploaded` for a later retry attempt.
    async fn release_for_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()>;

    /// Terminally reject a document, recording the last error.
    async fn mark_rejected(&self, id: Uuid, error: &str) -> Result<()>;

    /// Write the post-extraction status and clear the claim.
    async fn finish(&self, id: Uuid, status: DocumentStatus) -> Result<()>;

    /// Release claims older than `max_age_secs` back to `Uploaded`.
    ///
    /// Run at startup so a crashed worker never leaves a document
    /// permanently claimed. Returns the number of documents released.
    async fn release_stale_claims(&self, max_age_secs: i64) -> Result<u64>;

    /// Count documents eligible for pickup.
    async fn pending_count(&self) -> Result<i64>;
}

// =============================================================================
// EXTRACTION RESULT REPOSITORY
// =============================================================================

/// Request for appending an extraction result.
#[derive(Debug, Clone)]
pub struct CreateExtractionResult {
    pub document_id: Uuid,
    pub classified_type: DocumentType,
    pub overall_confidence: f64,
    pub raw_text: String,
    pub fields: Vec<ExtractedField>,
    pub validation_errors: Vec<String>,
    pub status: ExtractionStatus,
}

/// Append-only store of per-attempt extraction results.
#[async_trait]
pub trait ExtractionRepository: Send + Sync {
    /// Append a result for a document.
    async fn insert(&self, req: CreateExtractionResult) -> Result<ExtractionResult>;

    /// The newest result for a document, if any.
    async fn latest_for_document(&self, document_id: Uuid) -> Result<Option<ExtractionResult>>;

    /// Full attempt history, newest first.
    async fn history_for_document(&self, document_id: Uuid) -> Result<Vec<ExtractionResult>>;
}

// =============================================================================
// VERIFICATION REPOSITORY
// =============================================================================

/// Append-only store of verification records; one current per document.
#[async_trait]
pub trait VerificationRepository: Send + Sync {
    /// Insert a record as the document's current one, superseding any
    /// previous current record in the same transaction.
    async fn insert_current(&self, record: VerificationRecord) -> Result<VerificationRecord>;

    /// The current record for a document, if any.
    async fn current_for_document(&self, document_id: Uuid) -> Result<Option<VerificationRecord>>;

    /// Full record history, newest first.
    async fn history_for_document(&self, document_id: Uuid) -> Result<Vec<VerificationRecord>>;

    /// Current records whose expiry timestamp has elapsed and whose
    /// status still accepts the `Expire` event.
    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<VerificationRecord>>;
}

// =============================================================================
// OCR ENGINE
// =============================================================================

/// Interface to whatever turns bytes into text, fields, and confidences.
///
/// Transport problems (engine unreachable, timeout) are `Err` and belong
/// to the transient error class; a reachable engine that could not process
/// the document returns `Ok` with [`OcrStatus::Failed`]. Both are distinct
/// from completing with low confidence.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Run OCR over `data`, hinting the expected document type.
    async fn extract(&self, data: &[u8], expected_type: DocumentType) -> Result<OcrOutput>;

    /// Human-readable engine name for logs.
    fn name(&self) -> &'static str;
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend trait for different blob storage implementations.
///
/// Allows abstracting over filesystem, S3, or other storage providers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}
