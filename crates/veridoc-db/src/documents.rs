//! Document repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use veridoc_core::{
    new_v7, CreateDocumentRequest, Document, DocumentRepository, DocumentStatus, DocumentType,
    Error, Result,
};

/// PostgreSQL implementation of DocumentRepository.
///
/// The claim is a single conditional UPDATE over a `FOR UPDATE SKIP
/// LOCKED` subselect, so concurrent scheduler instances never claim the
/// same document and the loser simply sees no row.
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    /// Create a new PgDocumentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert DocumentStatus to string for database.
    fn status_to_str(status: DocumentStatus) -> &'static str {
        match status {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::ReviewRequired => "review_required",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Expired => "expired",
        }
    }

    /// Convert string from database to DocumentStatus.
    fn str_to_status(s: &str) -> DocumentStatus {
        match s {
            "uploaded" => DocumentStatus::Uploaded,
            "processing" => DocumentStatus::Processing,
            "review_required" => DocumentStatus::ReviewRequired,
            "approved" => DocumentStatus::Approved,
            "rejected" => DocumentStatus::Rejected,
            "expired" => DocumentStatus::Expired,
            _ => DocumentStatus::Uploaded, // fallback
        }
    }

    /// Convert string from database to DocumentType.
    fn str_to_doc_type(s: &str) -> DocumentType {
        s.parse().unwrap_or(DocumentType::Unknown)
    }

    /// Parse a document row into a Document struct.
    fn parse_document_row(row: sqlx::postgres::PgRow) -> Document {
        Document {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            doc_type: Self::str_to_doc_type(row.get("doc_type")),
            status: Self::str_to_status(row.get("status")),
            storage_path: row.get("storage_path"),
            content_hash: row.get("content_hash"),
            size_bytes: row.get("size_bytes"),
            mime_type: row.get("mime_type"),
            file_name: row.get("file_name"),
            uploaded_at: row.get("uploaded_at"),
            claim_token: row.get("claim_token"),
            retry_count: row.get("retry_count"),
            next_attempt_at: row.get("next_attempt_at"),
            processing_started_at: row.get("processing_started_at"),
            processing_completed_at: row.get("processing_completed_at"),
            last_error: row.get("last_error"),
        }
    }
}

const DOCUMENT_COLUMNS: &str = "id, owner_id, doc_type, status, storage_path, content_hash, \
     size_bytes, mime_type, file_name, uploaded_at, claim_token, retry_count, next_attempt_at, \
     processing_started_at, processing_completed_at, last_error";

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document> {
        let id = new_v7();
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "INSERT INTO documents \
             (id, owner_id, doc_type, status, storage_path, content_hash, size_bytes, \
              mime_type, file_name, uploaded_at, retry_count, next_attempt_at) \
             VALUES ($1, $2, $3, 'uploaded', $4, $5, $6, $7, $8, $9, 0, $9) \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(req.owner_id)
        .bind(req.doc_type.as_str())
        .bind(&req.storage_path)
        .bind(&req.content_hash)
        .bind(req.size_bytes)
        .bind(&req.mime_type)
        .bind(&req.file_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_document_row(row))
    }

    async fn get(&self, id: Uuid) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_document_row)
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn claim_next(&self, claim_token: Uuid) -> Result<Option<Document>> {
        let now = Utc::now();

        // FOR UPDATE SKIP LOCKED makes the claim safe under multiple
        // scheduler instances without a distributed lock.
        let row = sqlx::query(&format!(
            "UPDATE documents \
             SET status = 'processing', claim_token = $1, processing_started_at = $2 \
             WHERE id = ( \
                 SELECT id FROM documents \
                 WHERE status = 'uploaded' AND next_attempt_at <= $2 \
                 ORDER BY uploaded_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(claim_token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_document_row))
    }

    async fn set_document_type(&self, id: Uuid, doc_type: DocumentType) -> Result<()> {
        sqlx::query("UPDATE documents SET doc_type = $1 WHERE id = $2")
            .bind(doc_type.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn release_for_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents \
             SET status = 'uploaded', claim_token = NULL, retry_count = $1, \
                 next_attempt_at = $2, last_error = $3, processing_started_at = NULL \
             WHERE id = $4",
        )
        .bind(retry_count)
        .bind(next_attempt_at)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn mark_rejected(&self, id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE documents \
             SET status = 'rejected', claim_token = NULL, last_error = $1, \
                 processing_completed_at = $2 \
             WHERE id = $3",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn finish(&self, id: Uuid, status: DocumentStatus) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE documents \
             SET status = $1, claim_token = NULL, processing_completed_at = $2 \
             WHERE id = $3",
        )
        .bind(Self::status_to_str(status))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn release_stale_claims(&self, max_age_secs: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::seconds(max_age_secs);
        let result = sqlx::query(
            "UPDATE documents \
             SET status = 'uploaded', claim_token = NULL, processing_started_at = NULL \
             WHERE status = 'processing' AND processing_started_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> Result<i64> {
        let now = Utc::now();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents \
             WHERE status = 'uploaded' AND next_attempt_at <= $1",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_to_str_all_variants() {
        assert_eq!(
            PgDocumentRepository::status_to_str(DocumentStatus::Uploaded),
            "uploaded"
        );
        assert_eq!(
            PgDocumentRepository::status_to_str(DocumentStatus::Processing),
            "processing"
        );
        assert_eq!(
            PgDocumentRepository::status_to_str(DocumentStatus::ReviewRequired),
            "review_required"
        );
        assert_eq!(
            PgDocumentRepository::status_to_str(DocumentStatus::Approved),
            "approved"
        );
        assert_eq!(
            PgDocumentRepository::status_to_str(DocumentStatus::Rejected),
            "rejected"
        );
        assert_eq!(
            PgDocumentRepository::status_to_str(DocumentStatus::Expired),
            "expired"
        );
    }

    #[test]
    fn test_status_round_trip() {
        let statuses = [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::ReviewRequired,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
            DocumentStatus::Expired,
        ];
        for status in statuses {
            let s = PgDocumentRepository::status_to_str(status);
            assert_eq!(PgDocumentRepository::str_to_status(s), status);
        }
    }

    #[test]
    fn test_str_to_status_unknown_fallback() {
        assert_eq!(
            PgDocumentRepository::str_to_status("garbage"),
            DocumentStatus::Uploaded
        );
        assert_eq!(
            PgDocumentRepository::str_to_status(""),
            DocumentStatus::Uploaded
        );
    }

    #[test]
    fn test_str_to_doc_type_fallback() {
        assert_eq!(
            PgDocumentRepository::str_to_doc_type("w2"),
            DocumentType::W2
        );
        assert_eq!(
            PgDocumentRepository::str_to_doc_type("pay_stub"),
            DocumentType::Unknown
        );
    }

    #[test]
    fn test_status_strings_are_unique() {
        let statuses = [
            DocumentStatus::Uploaded,
            DocumentStatus::Processing,
            DocumentStatus::ReviewRequired,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
            DocumentStatus::Expired,
        ];
        let strings: Vec<&str> = statuses
            .iter()
            .map(|s| PgDocumentRepository::status_to_str(*s))
            .collect();
        let mut unique = strings.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(strings.len(), unique.len());
    }
}
