//! Engine-backed document type classification.
//!
//! Wraps an [`OcrEngine`] to obtain text for the keyword classifier in
//! `veridoc-core`, reconciling the engine's own classification guess with
//! the keyword signals. Classification never fails: an unreachable engine
//! or empty text degrades to `(Other, 0.0)`.

use std::sync::Arc;

use tracing::{debug, warn};

use veridoc_core::{classify_text, DocumentType, OcrEngine, OcrStatus, Result};

/// Confidence when engine and keyword classification agree.
const AGREEMENT_CONFIDENCE: f64 = 0.90;

/// Confidence when only the engine produced a concrete type.
const ENGINE_ONLY_CONFIDENCE: f64 = 0.75;

/// Resolves the type of a document whose declared type is `Unknown`.
pub struct TypeClassifier {
    engine: Arc<dyn OcrEngine>,
}

impl TypeClassifier {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// Best-guess document type plus a confidence in [0, 1].
    pub async fn classify(&self, data: &[u8]) -> Result<(DocumentType, f64)> {
        let output = match self.engine.extract(data, DocumentType::Unknown).await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "classifier",
                    error = %e,
                    "engine unreachable during classification, returning Other"
                );
                return Ok((DocumentType::Other, 0.0));
            }
        };

        if output.status == OcrStatus::Failed {
            return Ok((DocumentType::Other, 0.0));
        }

        let (keyword_type, keyword_confidence) = classify_text(&output.raw_text);
        let resolved = match output.classified_type {
            // Engine offered nothing usable; the keyword signals decide.
            DocumentType::Unknown | DocumentType::Other => (keyword_type, keyword_confidence),
            engine_type if engine_type == keyword_type => {
                (engine_type, keyword_confidence.max(AGREEMENT_CONFIDENCE))
            }
            engine_type if keyword_type == DocumentType::Other => {
                (engine_type, ENGINE_ONLY_CONFIDENCE)
            }
            // Disagreement: the text signals are the ground truth.
            _ => (keyword_type, keyword_confidence),
        };

        debug!(
            subsystem = "jobs",
            component = "classifier",
            engine_guess = %output.classified_type,
            doc_type = %resolved.0,
            confidence = resolved.1,
            "document classified"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockOcrEngine;
    use veridoc_core::{ExtractedField, OcrOutput};

    fn output(text: &str, classified: DocumentType) -> OcrOutput {
        OcrOutput {
            raw_text: text.to_string(),
            fields: Vec::<ExtractedField>::new(),
            classified_type: classified,
            status: OcrStatus::Completed,
        }
    }

    #[tokio::test]
    async fn test_keyword_only_classification() {
        let engine = Arc::new(MockOcrEngine::completing(output(
            "Form W-2 Wage and Tax Statement",
            DocumentType::Unknown,
        )));
        let classifier = TypeClassifier::new(engine);
        let (doc_type, confidence) = classifier.classify(b"bytes").await.unwrap();
        assert_eq!(doc_type, DocumentType::W2);
        assert!(confidence > 0.5);
    }

    #[tokio::test]
    async fn test_agreement_boosts_confidence() {
        let engine = Arc::new(MockOcrEngine::completing(output(
            "bank statement",
            DocumentType::BankStatement,
        )));
        let classifier = TypeClassifier::new(engine);
        let (doc_type, confidence) = classifier.classify(b"bytes").await.unwrap();
        assert_eq!(doc_type, DocumentType::BankStatement);
        assert!(confidence >= AGREEMENT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_engine_only_guess_is_moderate() {
        let engine = Arc::new(MockOcrEngine::completing(output(
            "no recognizable signals here",
            DocumentType::Transcript,
        )));
        let classifier = TypeClassifier::new(engine);
        let (doc_type, confidence) = classifier.classify(b"bytes").await.unwrap();
        assert_eq!(doc_type, DocumentType::Transcript);
        assert!((confidence - ENGINE_ONLY_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_disagreement_trusts_the_text() {
        let engine = Arc::new(MockOcrEngine::completing(output(
            "Form 1040 tax return",
            DocumentType::BankStatement,
        )));
        let classifier = TypeClassifier::new(engine);
        let (doc_type, _) = classifier.classify(b"bytes").await.unwrap();
        assert_eq!(doc_type, DocumentType::TaxReturn);
    }

    #[tokio::test]
    async fn test_unreachable_engine_degrades_to_other() {
        let engine = Arc::new(MockOcrEngine::erroring("connect refused"));
        let classifier = TypeClassifier::new(engine);
        let (doc_type, confidence) = classifier.classify(b"bytes").await.unwrap();
        assert_eq!(doc_type, DocumentType::Other);
        assert_eq!(confidence, 0.0);
    }

    #[tokio::test]
    async fn test_engine_failure_degrades_to_other() {
        let engine = Arc::new(MockOcrEngine::failing());
        let classifier = TypeClassifier::new(engine);
        let (doc_type, confidence) = classifier.classify(b"bytes").await.unwrap();
        assert_eq!(doc_type, DocumentType::Other);
        assert_eq!(confidence, 0.0);
    }
}
