//! Extraction result repository implementation.
//!
//! Results are append-only: every attempt inserts a new row and callers
//! read the latest by `processed_at` (then id, since ids are UUIDv7 and
//! time-ordered).

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use veridoc_core::{
    new_v7, CreateExtractionResult, Error, ExtractedField, ExtractionRepository, ExtractionResult,
    ExtractionStatus, Result,
};

/// PostgreSQL implementation of ExtractionRepository.
pub struct PgExtractionRepository {
    pool: Pool<Postgres>,
}

impl PgExtractionRepository {
    /// Create a new PgExtractionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse an extraction_results row into an ExtractionResult.
    fn parse_result_row(row: sqlx::postgres::PgRow) -> Result<ExtractionResult> {
        let fields: Vec<ExtractedField> = serde_json::from_value(row.get("fields"))?;
        let validation_errors: Vec<String> = serde_json::from_value(row.get("validation_errors"))?;
        let status: ExtractionStatus = row
            .get::<String, _>("status")
            .parse()
            .map_err(Error::Serialization)?;

        Ok(ExtractionResult {
            id: row.get("id"),
            document_id: row.get("document_id"),
            classified_type: row
                .get::<String, _>("classified_type")
                .parse()
                .unwrap_or_default(),
            overall_confidence: row.get("overall_confidence"),
            raw_text: row.get("raw_text"),
            fields,
            validation_errors,
            status,
            processed_at: row.get("processed_at"),
        })
    }
}

const RESULT_COLUMNS: &str = "id, document_id, classified_type, overall_confidence, raw_text, \
     fields, validation_errors, status, processed_at";

#[async_trait]
impl ExtractionRepository for PgExtractionRepository {
    async fn insert(&self, req: CreateExtractionResult) -> Result<ExtractionResult> {
        let id = new_v7();
        let now = Utc::now();
        let fields = serde_json::to_value(&req.fields)?;
        let validation_errors = serde_json::to_value(&req.validation_errors)?;

        let row = sqlx::query(&format!(
            "INSERT INTO extraction_results \
             (id, document_id, classified_type, overall_confidence, raw_text, fields, \
              validation_errors, status, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {RESULT_COLUMNS}"
        ))
        .bind(id)
        .bind(req.document_id)
        .bind(req.classified_type.as_str())
        .bind(req.overall_confidence)
        .bind(&req.raw_text)
        .bind(&fields)
        .bind(&validation_errors)
        .bind(req.status.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_result_row(row)
    }

    async fn latest_for_document(&self, document_id: Uuid) -> Result<Option<ExtractionResult>> {
        let row = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM extraction_results \
             WHERE document_id = $1 \
             ORDER BY processed_at DESC, id DESC \
             LIMIT 1"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_result_row).transpose()
    }

    async fn history_for_document(&self, document_id: Uuid) -> Result<Vec<ExtractionResult>> {
        let rows = sqlx::query(&format!(
            "SELECT {RESULT_COLUMNS} FROM extraction_results \
             WHERE document_id = $1 \
             ORDER BY processed_at DESC, id DESC"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_result_row).collect()
    }
}
