//! Core data models for veridoc.
//!
//! These types are shared across all veridoc crates and represent the
//! domain entities of the intake/extraction/verification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Semantic type of an uploaded document.
///
/// `Unknown` marks a document awaiting classification; the pipeline
/// resolves it before extraction and persists the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// IRS Form W-2 (Wage and Tax Statement)
    W2,
    /// Federal tax return (Form 1040 family)
    TaxReturn,
    /// Bank account statement
    BankStatement,
    /// Academic transcript
    Transcript,
    /// Recognized upload with no matching template
    Other,
    /// Declared type not yet known; classified during processing
    #[default]
    Unknown,
}

impl DocumentType {
    /// String form used in the database and wire formats.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::W2 => "w2",
            DocumentType::TaxReturn => "tax_return",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::Transcript => "transcript",
            DocumentType::Other => "other",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "w2" => Ok(DocumentType::W2),
            "tax_return" => Ok(DocumentType::TaxReturn),
            "bank_statement" => Ok(DocumentType::BankStatement),
            "transcript" => Ok(DocumentType::Transcript),
            "other" => Ok(DocumentType::Other),
            "unknown" => Ok(DocumentType::Unknown),
            _ => Err(format!("unrecognized document type: {}", s)),
        }
    }
}

/// Processing status of a document row.
///
/// `Approved`, `Rejected`, and `Expired` are terminal: the scheduler never
/// re-dispatches a document in one of those states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Created on upload, eligible for pickup
    Uploaded,
    /// Claimed by a worker; claim token is set
    Processing,
    /// Routed to a human reviewer
    ReviewRequired,
    /// Verified, automatically or by a reviewer
    Approved,
    /// Terminally rejected (reviewer decision or retries exhausted)
    Rejected,
    /// Verification lapsed past its expiry timestamp
    Expired,
}

impl DocumentStatus {
    /// Whether no further automated transition occurs from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Approved | DocumentStatus::Rejected | DocumentStatus::Expired
        )
    }
}

/// A user-owned file under processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    /// Path of the raw bytes within the blob store.
    pub storage_path: String,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub content_hash: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
    /// Set while a worker holds the document; null means eligible for pickup.
    pub claim_token: Option<Uuid>,
    pub retry_count: i32,
    /// Earliest time the scheduler may (re)claim this document.
    pub next_attempt_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// =============================================================================
// EXTRACTION TYPES
// =============================================================================

/// Declared data type of an extracted field value.
///
/// Unrecognized kinds deserialize to `Text` and never fail validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Monetary amount, parseable as a decimal
    Currency,
    /// Calendar date
    Date,
    /// Plain numeric value
    Number,
    /// Social security number (9 digits after separator stripping)
    Ssn,
    /// Email address
    Email,
    /// Free text; always passes validation
    #[default]
    Text,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Currency => "currency",
            FieldKind::Date => "date",
            FieldKind::Number => "number",
            FieldKind::Ssn => "ssn",
            FieldKind::Email => "email",
            FieldKind::Text => "text",
        }
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "currency" => Ok(FieldKind::Currency),
            "date" => Ok(FieldKind::Date),
            "number" => Ok(FieldKind::Number),
            "ssn" => Ok(FieldKind::Ssn),
            "email" => Ok(FieldKind::Email),
            "text" => Ok(FieldKind::Text),
            _ => Err(format!("unrecognized field kind: {}", s)),
        }
    }
}

// Unrecognized kinds degrade to Text instead of failing the whole payload.
impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_default())
    }
}

/// One named value lifted from a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: String,
    pub value: String,
    pub kind: FieldKind,
    /// 0.0-1.0 engine estimate; None when the engine reports no score.
    pub confidence: Option<f64>,
    /// True when confidence fell below the configured review threshold.
    pub requires_validation: bool,
}

impl ExtractedField {
    /// Convenience constructor for a field with a confidence score.
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind,
            confidence: None,
            requires_validation: false,
        }
    }

    /// Attach a confidence score.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Engine-reported completion state of an OCR call.
///
/// `Failed` is the engine saying "I could not process this" — distinct
/// from a transport error (an `Err` return) and from completing with low
/// confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrStatus {
    Completed,
    Failed,
}

/// Raw outcome of a single OCR engine call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOutput {
    pub raw_text: String,
    pub fields: Vec<ExtractedField>,
    /// The engine's own best guess at the document type.
    pub classified_type: DocumentType,
    pub status: OcrStatus,
}

/// Processing status recorded on an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Completed,
    Failed,
    RequiresReview,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Failed => "failed",
            ExtractionStatus::RequiresReview => "requires_review",
        }
    }
}

impl std::str::FromStr for ExtractionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ExtractionStatus::Completed),
            "failed" => Ok(ExtractionStatus::Failed),
            "requires_review" => Ok(ExtractionStatus::RequiresReview),
            _ => Err(format!("unrecognized extraction status: {}", s)),
        }
    }
}

/// The one-per-document-per-attempt OCR outcome.
///
/// Results are append-only: later attempts supersede earlier ones and
/// callers always read the latest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: Uuid,
    pub document_id: Uuid,
    pub classified_type: DocumentType,
    /// Arithmetic mean of the per-field confidences that are present;
    /// 0.0 when no field carries one.
    pub overall_confidence: f64,
    pub raw_text: String,
    pub fields: Vec<ExtractedField>,
    pub validation_errors: Vec<String>,
    pub status: ExtractionStatus,
    pub processed_at: DateTime<Utc>,
}

/// Mean of the per-field confidences that are present; 0.0 with none.
pub fn overall_confidence(fields: &[ExtractedField]) -> f64 {
    let scored: Vec<f64> = fields.iter().filter_map(|f| f.confidence).collect();
    if scored.is_empty() {
        return 0.0;
    }
    scored.iter().sum::<f64>() / scored.len() as f64
}

// =============================================================================
// VERIFICATION TYPES
// =============================================================================

/// State of a verification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Created, not yet evaluated
    Pending,
    /// Automated checks running
    InProgress,
    /// All automated checks passed above the auto-approval threshold
    AutoApproved,
    /// Needs a human reviewer
    ManualReviewRequired,
    /// Final approval (automatic promotion or reviewer action)
    Approved,
    /// Final rejection with a required reason
    Rejected,
    /// Lapsed past the expiry timestamp
    Expired,
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Approved
                | VerificationStatus::Rejected
                | VerificationStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::InProgress => "in_progress",
            VerificationStatus::AutoApproved => "auto_approved",
            VerificationStatus::ManualReviewRequired => "manual_review_required",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "in_progress" => Ok(VerificationStatus::InProgress),
            "auto_approved" => Ok(VerificationStatus::AutoApproved),
            "manual_review_required" => Ok(VerificationStatus::ManualReviewRequired),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            "expired" => Ok(VerificationStatus::Expired),
            _ => Err(format!("unrecognized verification status: {}", s)),
        }
    }
}

/// Event driving a verification state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum VerificationEvent {
    /// Automated checks started
    BeginChecks,
    /// Automated checks finished; `auto_approve` carries the evaluator verdict
    ChecksEvaluated { auto_approve: bool },
    /// Reviewer approved the document
    ReviewerApproved,
    /// Reviewer rejected the document
    ReviewerRejected,
    /// Automatic promotion of an auto-approved record
    Promote,
    /// Expiry timestamp elapsed
    Expire,
}

/// Category of an automated verification check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Every extracted field passed its data-type validation
    FieldValidation,
    /// Overall extraction confidence met the review threshold
    ExtractionConfidence,
    /// Classification confidence met its own threshold
    ClassificationConfidence,
    /// All template-required fields were extracted
    RequiredFields,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::FieldValidation => "field_validation",
            CheckKind::ExtractionConfidence => "extraction_confidence",
            CheckKind::ClassificationConfidence => "classification_confidence",
            CheckKind::RequiredFields => "required_fields",
        }
    }
}

/// One named pass/fail check in a verification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub kind: CheckKind,
    pub passed: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The approval/rejection audit trail entry for a document.
///
/// Exactly one record per document is current; prior records are retained
/// as history and never mutated after reaching a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub status: VerificationStatus,
    pub score: f64,
    pub checks: Vec<VerificationCheck>,
    pub issues: Vec<String>,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Set when a later record replaced this one; null means current.
    pub superseded_at: Option<DateTime<Utc>>,
}

/// A human reviewer's verdict on a document in manual review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum ReviewerDecision {
    Approve {
        reviewer_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    Reject {
        reviewer_id: Uuid,
        reason: String,
        required_corrections: Vec<String>,
    },
}

// =============================================================================
// TEMPLATES
// =============================================================================

/// Expected field within a document template.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TemplateField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

/// Describes the fields a well-formed document of a given type carries.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DocumentTemplate {
    pub doc_type: DocumentType,
    pub display_name: &'static str,
    pub expected_fields: &'static [TemplateField],
}

// =============================================================================
// STORAGE TYPES
// =============================================================================

/// Metadata returned after persisting raw bytes to the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: Uuid,
    pub path: String,
    pub size_bytes: i64,
    /// SHA-256 of the stored bytes, hex encoded.
    pub content_hash: String,
    pub mime_type: String,
}
