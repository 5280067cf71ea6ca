//! IntakeService — the operations exposed to callers of this subsystem.
//!
//! Upload, latest-result and status reads, reviewer decisions, and the
//! template listing. Status reads apply expiry lazily; a periodic
//! [`IntakeService::expire_overdue`] sweep catches records nobody reads.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use veridoc_core::{
    available_templates, new_v7, transition, CreateDocumentRequest, Document, DocumentRepository,
    DocumentStatus, DocumentTemplate, DocumentType, Error, ExtractionRepository, ExtractionResult,
    Result, ReviewerDecision, StorageBackend, VerificationEvent, VerificationRecord,
    VerificationRepository, VerificationStatus,
};

use veridoc_db::storage::upload_blob;

use crate::pipeline::PipelineConfig;

/// Caller-facing facade over the intake pipeline's persistent state.
pub struct IntakeService {
    documents: Arc<dyn DocumentRepository>,
    extractions: Arc<dyn ExtractionRepository>,
    verifications: Arc<dyn VerificationRepository>,
    storage: Arc<dyn StorageBackend>,
    config: PipelineConfig,
}

impl IntakeService {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        extractions: Arc<dyn ExtractionRepository>,
        verifications: Arc<dyn VerificationRepository>,
        storage: Arc<dyn StorageBackend>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            documents,
            extractions,
            verifications,
            storage,
            config,
        }
    }

    /// Store an upload's bytes and create its document row.
    ///
    /// The document enters the queue as `Uploaded` and will be picked up
    /// by the scheduler on its next cycle.
    pub async fn upload_document(
        &self,
        owner_id: Uuid,
        declared_type: DocumentType,
        file_name: &str,
        data: &[u8],
    ) -> Result<Document> {
        let stored = upload_blob(self.storage.as_ref(), data).await?;
        let document = self
            .documents
            .insert(CreateDocumentRequest {
                owner_id,
                doc_type: declared_type,
                storage_path: stored.path,
                content_hash: stored.content_hash,
                size_bytes: stored.size_bytes,
                mime_type: stored.mime_type,
                file_name: file_name.to_string(),
            })
            .await?;

        info!(
            subsystem = "jobs",
            component = "intake",
            document_id = %document.id,
            doc_type = %document.doc_type,
            size = document.size_bytes,
            "document uploaded"
        );
        Ok(document)
    }

    /// The newest extraction result for a document, if any attempt ran.
    pub async fn get_latest_extraction_result(
        &self,
        document_id: Uuid,
    ) -> Result<Option<ExtractionResult>> {
        self.extractions.latest_for_document(document_id).await
    }

    /// The current verification record for a document.
    ///
    /// Applies expiry lazily: an overdue record is transitioned to
    /// `Expired` (through the state machine) before being returned.
    pub async fn get_verification_status(
        &self,
        document_id: Uuid,
    ) -> Result<Option<VerificationRecord>> {
        let Some(record) = self.verifications.current_for_document(document_id).await? else {
            return Ok(None);
        };
        if Self::is_overdue(&record) {
            return Ok(Some(self.expire_record(record).await?));
        }
        Ok(Some(record))
    }

    /// Apply a reviewer's verdict to a document in manual review.
    ///
    /// Illegal states (already approved, rejected, expired) surface as
    /// [`Error::InvalidTransition`]; a rejection without a reason or
    /// without required corrections is [`Error::InvalidInput`].
    pub async fn submit_reviewer_decision(
        &self,
        document_id: Uuid,
        decision: ReviewerDecision,
    ) -> Result<VerificationRecord> {
        let current = self
            .verifications
            .current_for_document(document_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("no verification record for document {}", document_id))
            })?;

        // An overdue record expires before the decision applies; the
        // transition out of Expired then fails as it should.
        let current = if Self::is_overdue(&current) {
            self.expire_record(current).await?
        } else {
            current
        };

        let now = Utc::now();
        let record = match decision {
            ReviewerDecision::Approve { reviewer_id, notes } => {
                let status = transition(current.status, &VerificationEvent::ReviewerApproved)?;
                VerificationRecord {
                    id: new_v7(),
                    status,
                    reviewer_id: Some(reviewer_id),
                    reviewer_notes: notes,
                    created_at: now,
                    verified_at: Some(now),
                    expires_at: Some(now + Duration::days(self.config.verification_ttl_days)),
                    superseded_at: None,
                    ..current
                }
            }
            ReviewerDecision::Reject {
                reviewer_id,
                reason,
                required_corrections,
            } => {
                if reason.trim().is_empty() {
                    return Err(Error::InvalidInput(
                        "rejection requires a non-empty reason".into(),
                    ));
                }
                if required_corrections.is_empty() {
                    return Err(Error::InvalidInput(
                        "rejection requires at least one required correction".into(),
                    ));
                }
                let status = transition(current.status, &VerificationEvent::ReviewerRejected)?;
                VerificationRecord {
                    id: new_v7(),
                    status,
                    issues: required_corrections,
                    reviewer_id: Some(reviewer_id),
                    reviewer_notes: Some(reason),
                    created_at: now,
                    verified_at: Some(now),
                    expires_at: None,
                    superseded_at: None,
                    ..current
                }
            }
        };

        let doc_status = match record.status {
            VerificationStatus::Approved => DocumentStatus::Approved,
            VerificationStatus::Rejected => DocumentStatus::Rejected,
            other => {
                return Err(Error::Internal(format!(
                    "reviewer decision produced unexpected status {:?}",
                    other
                )))
            }
        };

        let record = self.verifications.insert_current(record).await?;
        self.documents.finish(document_id, doc_status).await?;

        info!(
            subsystem = "jobs",
            component = "intake",
            document_id = %document_id,
            status = ?record.status,
            reviewer_id = ?record.reviewer_id,
            "reviewer decision recorded"
        );
        Ok(record)
    }

    /// Document templates this deployment understands.
    pub fn get_available_templates(&self) -> &'static [DocumentTemplate] {
        available_templates()
    }

    /// Expire every overdue current record. Returns how many expired.
    pub async fn expire_overdue(&self) -> Result<u64> {
        let overdue = self.verifications.list_overdue(Utc::now()).await?;
        let mut expired = 0;
        for record in overdue {
            let document_id = record.document_id;
            match self.expire_record(record).await {
                Ok(_) => expired += 1,
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "intake",
                    document_id = %document_id,
                    error = %e,
                    "failed to expire verification record"
                ),
            }
        }
        Ok(expired)
    }

    fn is_overdue(record: &VerificationRecord) -> bool {
        !matches!(
            record.status,
            VerificationStatus::Rejected | VerificationStatus::Expired
        ) && record.expires_at.is_some_and(|t| t < Utc::now())
    }

    /// Supersede a record with its `Expired` successor and mark the
    /// document terminal.
    async fn expire_record(&self, record: VerificationRecord) -> Result<VerificationRecord> {
        let document_id = record.document_id;
        let status = transition(record.status, &VerificationEvent::Expire)?;
        let now = Utc::now();
        let expired = self
            .verifications
            .insert_current(VerificationRecord {
                id: new_v7(),
                status,
                created_at: now,
                superseded_at: None,
                ..record
            })
            .await?;
        self.documents
            .finish(document_id, DocumentStatus::Expired)
            .await?;

        info!(
            subsystem = "jobs",
            component = "intake",
            document_id = %document_id,
            "verification record expired"
        );
        Ok(expired)
    }
}
