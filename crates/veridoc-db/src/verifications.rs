//! Verification record repository implementation.
//!
//! Records are append-only history with exactly one current row per
//! document (`superseded_at IS NULL`). Superseding the previous current
//! record and inserting the new one happen in a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use veridoc_core::{
    Error, Result, VerificationCheck, VerificationRecord, VerificationRepository,
    VerificationStatus,
};

/// PostgreSQL implementation of VerificationRepository.
pub struct PgVerificationRepository {
    pool: Pool<Postgres>,
}

impl PgVerificationRepository {
    /// Create a new PgVerificationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a verification_records row into a VerificationRecord.
    fn parse_record_row(row: sqlx::postgres::PgRow) -> Result<VerificationRecord> {
        let checks: Vec<VerificationCheck> = serde_json::from_value(row.get("checks"))?;
        let issues: Vec<String> = serde_json::from_value(row.get("issues"))?;
        let status: VerificationStatus = row
            .get::<String, _>("status")
            .parse()
            .map_err(Error::Serialization)?;

        Ok(VerificationRecord {
            id: row.get("id"),
            document_id: row.get("document_id"),
            status,
            score: row.get("score"),
            checks,
            issues,
            reviewer_id: row.get("reviewer_id"),
            reviewer_notes: row.get("reviewer_notes"),
            created_at: row.get("created_at"),
            verified_at: row.get("verified_at"),
            expires_at: row.get("expires_at"),
            superseded_at: row.get("superseded_at"),
        })
    }

}

const RECORD_COLUMNS: &str = "id, document_id, status, score, checks, issues, reviewer_id, \
     reviewer_notes, created_at, verified_at, expires_at, superseded_at";

#[async_trait]
impl VerificationRepository for PgVerificationRepository {
    async fn insert_current(&self, record: VerificationRecord) -> Result<VerificationRecord> {
        let now = Utc::now();
        let checks = serde_json::to_value(&record.checks)?;
        let issues = serde_json::to_value(&record.issues)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "UPDATE verification_records SET superseded_at = $1 \
             WHERE document_id = $2 AND superseded_at IS NULL",
        )
        .bind(now)
        .bind(record.document_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "INSERT INTO verification_records \
             (id, document_id, status, score, checks, issues, reviewer_id, reviewer_notes, \
              created_at, verified_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.id)
        .bind(record.document_id)
        .bind(record.status.as_str())
        .bind(record.score)
        .bind(&checks)
        .bind(&issues)
        .bind(record.reviewer_id)
        .bind(&record.reviewer_notes)
        .bind(record.created_at)
        .bind(record.verified_at)
        .bind(record.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Self::parse_record_row(row)
    }

    async fn current_for_document(&self, document_id: Uuid) -> Result<Option<VerificationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM verification_records \
             WHERE document_id = $1 AND superseded_at IS NULL"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_record_row).transpose()
    }

    async fn history_for_document(&self, document_id: Uuid) -> Result<Vec<VerificationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM verification_records \
             WHERE document_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_record_row).collect()
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<VerificationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM verification_records \
             WHERE superseded_at IS NULL \
               AND expires_at IS NOT NULL AND expires_at < $1 \
               AND status NOT IN ('rejected', 'expired')"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_record_row).collect()
    }
}
