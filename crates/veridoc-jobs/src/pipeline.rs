//! Extraction coordinator: classify → extract → validate → persist → verify.
//!
//! [`DocumentPipeline::process`] takes a claimed document and guarantees it
//! leaves in a well-defined status — finished, released for retry with
//! backoff, or terminally rejected. Errors from the classifier, engine, or
//! blob store are caught per document and feed the retry ladder.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{error, info, instrument, warn};

use veridoc_core::{
    defaults, new_v7, overall_confidence, template_for, transition, validate_fields,
    CreateExtractionResult, Document, DocumentRepository, DocumentStatus, DocumentType, Error,
    EvaluationInput, ExtractionRepository, ExtractionStatus, OcrEngine, OcrStatus, Result,
    StorageBackend, VerificationEvaluator, VerificationEvent, VerificationRecord,
    VerificationRepository, VerificationStatus, VerificationThresholds,
};

use crate::classify::TypeClassifier;

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Overall confidence below this routes the document to manual review.
    pub review_threshold: f64,
    /// Minimum verification score for the auto-approved path.
    pub auto_approve_threshold: f64,
    /// Minimum classification confidence accepted without review.
    pub classification_threshold: f64,
    /// Attempts before a document is terminally rejected.
    pub max_retries: i32,
    /// Days until a fresh verification record expires.
    pub verification_ttl_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            review_threshold: defaults::REVIEW_THRESHOLD,
            auto_approve_threshold: defaults::AUTO_APPROVE_THRESHOLD,
            classification_threshold: defaults::CLASSIFICATION_THRESHOLD,
            max_retries: defaults::MAX_RETRIES,
            verification_ttl_days: defaults::VERIFICATION_TTL_DAYS,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VERIDOC_REVIEW_THRESHOLD` | `0.80` | Confidence floor before review |
    /// | `VERIDOC_AUTO_APPROVE_THRESHOLD` | `0.90` | Score floor for auto-approval |
    /// | `VERIDOC_CLASSIFICATION_THRESHOLD` | `0.70` | Classification confidence floor |
    /// | `VERIDOC_MAX_RETRIES` | `3` | Attempts before terminal rejection |
    /// | `VERIDOC_VERIFICATION_TTL_DAYS` | `90` | Verification record lifetime |
    pub fn from_env() -> Self {
        fn read<T: std::str::FromStr>(var: &str, default: T) -> T {
            std::env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            review_threshold: read("VERIDOC_REVIEW_THRESHOLD", defaults::REVIEW_THRESHOLD),
            auto_approve_threshold: read(
                "VERIDOC_AUTO_APPROVE_THRESHOLD",
                defaults::AUTO_APPROVE_THRESHOLD,
            ),
            classification_threshold: read(
                "VERIDOC_CLASSIFICATION_THRESHOLD",
                defaults::CLASSIFICATION_THRESHOLD,
            ),
            max_retries: read("VERIDOC_MAX_RETRIES", defaults::MAX_RETRIES),
            verification_ttl_days: read(
                "VERIDOC_VERIFICATION_TTL_DAYS",
                defaults::VERIFICATION_TTL_DAYS,
            ),
        }
    }

    /// Set the review threshold.
    pub fn with_review_threshold(mut self, threshold: f64) -> Self {
        self.review_threshold = threshold;
        self
    }

    /// Set the auto-approve threshold.
    pub fn with_auto_approve_threshold(mut self, threshold: f64) -> Self {
        self.auto_approve_threshold = threshold;
        self
    }

    /// Set the maximum retry count.
    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn thresholds(&self) -> VerificationThresholds {
        VerificationThresholds {
            review_threshold: self.review_threshold,
            auto_approve_threshold: self.auto_approve_threshold,
            classification_threshold: self.classification_threshold,
        }
    }
}

/// How a document left the pipeline.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Extraction and verification finished; document carries `status`.
    Finished { status: DocumentStatus },
    /// Transient failure; released for retry attempt `attempt`.
    Retried {
        attempt: i32,
        next_attempt_at: DateTime<Utc>,
    },
    /// Retries exhausted; terminally rejected with the last error.
    Rejected { error: String },
}

/// Orchestrates one document's classify → extract → validate → verify run.
pub struct DocumentPipeline {
    documents: Arc<dyn DocumentRepository>,
    extractions: Arc<dyn ExtractionRepository>,
    verifications: Arc<dyn VerificationRepository>,
    storage: Arc<dyn StorageBackend>,
    engine: Arc<dyn OcrEngine>,
    classifier: TypeClassifier,
    evaluator: VerificationEvaluator,
    config: PipelineConfig,
}

impl DocumentPipeline {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        extractions: Arc<dyn ExtractionRepository>,
        verifications: Arc<dyn VerificationRepository>,
        storage: Arc<dyn StorageBackend>,
        engine: Arc<dyn OcrEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            documents,
            extractions,
            verifications,
            storage,
            classifier: TypeClassifier::new(engine.clone()),
            evaluator: VerificationEvaluator::new(config.thresholds()),
            engine,
            config,
        }
    }

    /// Process a claimed document end to end.
    ///
    /// Never returns an error: failures are absorbed into the retry ladder
    /// so the document always leaves `Processing`.
    #[instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn process(&self, document: Document) -> ProcessOutcome {
        let started = std::time::Instant::now();
        match self.run(&document).await {
            Ok(status) => {
                info!(
                    subsystem = "jobs",
                    component = "pipeline",
                    doc_type = %document.doc_type,
                    status = ?status,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "document processed"
                );
                ProcessOutcome::Finished { status }
            }
            Err(e) => self.handle_failure(&document, e).await,
        }
    }

    async fn run(&self, document: &Document) -> Result<DocumentStatus> {
        let data = self
            .storage
            .read(&document.storage_path)
            .await
            .map_err(|e| Error::Storage(format!("blob read failed: {}", e)))?;

        // (a) resolve the document type when the upload declared none
        let (doc_type, classification_confidence) =
            if document.doc_type == DocumentType::Unknown {
                let (doc_type, confidence) = self.classifier.classify(&data).await?;
                self.documents
                    .set_document_type(document.id, doc_type)
                    .await?;
                (doc_type, Some(confidence))
            } else {
                (document.doc_type, None)
            };

        // (b) extract with the now-known expected type
        let output = self.engine.extract(&data, doc_type).await?;
        if output.status == OcrStatus::Failed {
            return Err(Error::Ocr(format!(
                "{} engine reported extraction failure",
                self.engine.name()
            )));
        }

        // (c) validate fields, flagging the low-confidence ones
        let mut fields = output.fields;
        for field in &mut fields {
            field.requires_validation = field
                .confidence
                .is_some_and(|c| c < self.config.review_threshold);
        }
        let validation_errors = validate_fields(&fields);

        // (d) overall confidence = mean of per-field confidences
        let overall = overall_confidence(&fields);

        let extraction_status =
            if !validation_errors.is_empty() || overall < self.config.review_threshold {
                ExtractionStatus::RequiresReview
            } else {
                ExtractionStatus::Completed
            };

        // (e) persist the attempt's result
        let result = self
            .extractions
            .insert(CreateExtractionResult {
                document_id: document.id,
                classified_type: doc_type,
                overall_confidence: overall,
                raw_text: output.raw_text,
                fields,
                validation_errors,
                status: extraction_status,
            })
            .await?;

        // (f) derive the next status through the verification state machine
        let outcome = self.evaluator.evaluate(&EvaluationInput {
            fields: &result.fields,
            validation_errors: &result.validation_errors,
            overall_confidence: overall,
            classification_confidence,
            template: template_for(doc_type),
        })?;

        let now = Utc::now();
        let record = self
            .verifications
            .insert_current(VerificationRecord {
                id: new_v7(),
                document_id: document.id,
                status: outcome.status,
                score: outcome.score,
                checks: outcome.checks,
                issues: outcome.issues,
                reviewer_id: None,
                reviewer_notes: None,
                created_at: now,
                verified_at: None,
                expires_at: Some(now + Duration::days(self.config.verification_ttl_days)),
                superseded_at: None,
            })
            .await?;

        let doc_status = match record.status {
            VerificationStatus::AutoApproved => {
                // Promotion is its own audit entry, so the trail always
                // shows how approval was reached.
                let promoted = transition(record.status, &VerificationEvent::Promote)?;
                let promoted_at = Utc::now();
                self.verifications
                    .insert_current(VerificationRecord {
                        id: new_v7(),
                        status: promoted,
                        created_at: promoted_at,
                        verified_at: Some(promoted_at),
                        superseded_at: None,
                        ..record
                    })
                    .await?;
                DocumentStatus::Approved
            }
            VerificationStatus::ManualReviewRequired => DocumentStatus::ReviewRequired,
            other => {
                return Err(Error::Internal(format!(
                    "evaluator produced unexpected status {:?}",
                    other
                )))
            }
        };

        // (g) release the claim with the derived status
        self.documents.finish(document.id, doc_status).await?;
        Ok(doc_status)
    }

    /// Apply the retry ladder after a failed attempt.
    async fn handle_failure(&self, document: &Document, error: Error) -> ProcessOutcome {
        let attempt = document.retry_count + 1;
        let message = error.to_string();

        if attempt < self.config.max_retries {
            let next_attempt_at = Utc::now() + backoff_delay(attempt);
            if let Err(e) = self
                .documents
                .release_for_retry(document.id, attempt, next_attempt_at, &message)
                .await
            {
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    document_id = %document.id,
                    error = %e,
                    "failed to release document for retry"
                );
            }
            warn!(
                subsystem = "jobs",
                component = "pipeline",
                document_id = %document.id,
                attempt,
                error = %message,
                "extraction failed, scheduled retry"
            );
            ProcessOutcome::Retried {
                attempt,
                next_attempt_at,
            }
        } else {
            if let Err(e) = self.documents.mark_rejected(document.id, &message).await {
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    document_id = %document.id,
                    error = %e,
                    "failed to mark document rejected"
                );
            }
            error!(
                subsystem = "jobs",
                component = "pipeline",
                document_id = %document.id,
                attempt,
                error = %message,
                "retries exhausted, document rejected"
            );
            ProcessOutcome::Rejected { error: message }
        }
    }
}

/// Exponential backoff: `2^attempt` minutes plus a little jitter so a
/// burst of failures does not come back in lockstep.
fn backoff_delay(attempt: i32) -> Duration {
    let exponent = attempt.clamp(0, 16) as u32;
    let base_secs = defaults::BACKOFF_BASE_SECS * (1_i64 << exponent);
    let jitter = rand::thread_rng().gen_range(0..=defaults::BACKOFF_JITTER_SECS);
    Duration::seconds(base_secs + jitter)
}
