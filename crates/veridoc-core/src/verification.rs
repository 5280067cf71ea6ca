//! Verification state machine and automated check evaluation.
//!
//! The state machine is an explicit function `(current, event) -> new
//! state`, independently testable without the rest of the pipeline. Every
//! illegal pair returns [`Error::InvalidTransition`]; nothing is silently
//! clamped.

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::{
    CheckKind, DocumentTemplate, ExtractedField, VerificationCheck, VerificationEvent,
    VerificationStatus,
};

/// Apply an event to a verification state.
pub fn transition(
    current: VerificationStatus,
    event: &VerificationEvent,
) -> Result<VerificationStatus> {
    use VerificationEvent as E;
    use VerificationStatus as S;

    let next = match (current, event) {
        (S::Pending, E::BeginChecks) => S::InProgress,
        (S::Pending | S::InProgress, E::ChecksEvaluated { auto_approve }) => {
            if *auto_approve {
                S::AutoApproved
            } else {
                S::ManualReviewRequired
            }
        }
        (S::ManualReviewRequired, E::ReviewerApproved) => S::Approved,
        (S::ManualReviewRequired, E::ReviewerRejected) => S::Rejected,
        (S::AutoApproved, E::Promote) => S::Approved,
        // Expiry reaches every non-terminal state and Approved; a lapsed
        // approval must stop counting as verified.
        (
            S::Pending | S::InProgress | S::AutoApproved | S::ManualReviewRequired | S::Approved,
            E::Expire,
        ) => S::Expired,
        (from, event) => {
            return Err(Error::InvalidTransition {
                from,
                event: event.clone(),
            })
        }
    };
    Ok(next)
}

/// Threshold knobs for the evaluator. Defaults come from
/// [`crate::defaults`]; callers may override any of them.
#[derive(Debug, Clone, Copy)]
pub struct VerificationThresholds {
    /// Overall extraction confidence below this fails the confidence check.
    pub review_threshold: f64,
    /// Minimum verification score for auto-approval.
    pub auto_approve_threshold: f64,
    /// Minimum classification confidence accepted without review.
    pub classification_threshold: f64,
}

impl Default for VerificationThresholds {
    fn default() -> Self {
        Self {
            review_threshold: defaults::REVIEW_THRESHOLD,
            auto_approve_threshold: defaults::AUTO_APPROVE_THRESHOLD,
            classification_threshold: defaults::CLASSIFICATION_THRESHOLD,
        }
    }
}

/// Input to one evaluation pass.
#[derive(Debug, Clone)]
pub struct EvaluationInput<'a> {
    pub fields: &'a [ExtractedField],
    pub validation_errors: &'a [String],
    pub overall_confidence: f64,
    /// None when the uploader declared the type (treated as certain).
    pub classification_confidence: Option<f64>,
    /// Template for the classified type, when one exists.
    pub template: Option<&'a DocumentTemplate>,
}

/// Result of one evaluation pass, ready to persist on a record.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub status: VerificationStatus,
    pub score: f64,
    pub checks: Vec<VerificationCheck>,
    pub issues: Vec<String>,
}

/// Runs the ordered automated checks and drives the state machine from
/// `Pending` to the post-evaluation status.
#[derive(Debug, Clone, Default)]
pub struct VerificationEvaluator {
    thresholds: VerificationThresholds,
}

impl VerificationEvaluator {
    pub fn new(thresholds: VerificationThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate an extraction outcome into a verification verdict.
    ///
    /// The overall score is the weakest check confidence, so one marginal
    /// check cannot be averaged away by the others. Auto-approval requires
    /// every check to pass, a score at or above the auto-approve
    /// threshold, and no outstanding issues.
    pub fn evaluate(&self, input: &EvaluationInput<'_>) -> Result<EvaluationOutcome> {
        let mut checks = Vec::with_capacity(4);
        let mut issues = Vec::new();

        checks.push(self.check_field_validation(input, &mut issues));
        checks.push(self.check_extraction_confidence(input, &mut issues));
        checks.push(self.check_classification_confidence(input, &mut issues));
        checks.push(self.check_required_fields(input, &mut issues));

        let score = checks
            .iter()
            .map(|c| c.confidence)
            .fold(f64::INFINITY, f64::min);
        let score = if score.is_finite() { score } else { 0.0 };

        let all_passed = checks.iter().all(|c| c.passed);
        let auto_approve =
            all_passed && score >= self.thresholds.auto_approve_threshold && issues.is_empty();

        let status = transition(VerificationStatus::Pending, &VerificationEvent::BeginChecks)?;
        let status = transition(status, &VerificationEvent::ChecksEvaluated { auto_approve })?;

        Ok(EvaluationOutcome {
            status,
            score,
            checks,
            issues,
        })
    }

    fn check_field_validation(
        &self,
        input: &EvaluationInput<'_>,
        issues: &mut Vec<String>,
    ) -> VerificationCheck {
        let passed = input.validation_errors.is_empty();
        let confidence = if input.fields.is_empty() {
            if passed {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - input.validation_errors.len() as f64 / input.fields.len() as f64
        };
        if !passed {
            issues.extend(input.validation_errors.iter().cloned());
        }
        VerificationCheck {
            kind: CheckKind::FieldValidation,
            passed,
            confidence: confidence.max(0.0),
            detail: (!passed)
                .then(|| format!("{} field(s) failed validation", input.validation_errors.len())),
        }
    }

    fn check_extraction_confidence(
        &self,
        input: &EvaluationInput<'_>,
        issues: &mut Vec<String>,
    ) -> VerificationCheck {
        let passed = input.overall_confidence >= self.thresholds.review_threshold;
        if !passed {
            issues.push(format!(
                "overall extraction confidence {:.2} below review threshold {:.2}",
                input.overall_confidence, self.thresholds.review_threshold
            ));
        }
        VerificationCheck {
            kind: CheckKind::ExtractionConfidence,
            passed,
            confidence: input.overall_confidence,
            detail: None,
        }
    }

    fn check_classification_confidence(
        &self,
        input: &EvaluationInput<'_>,
        issues: &mut Vec<String>,
    ) -> VerificationCheck {
        match input.classification_confidence {
            None => VerificationCheck {
                kind: CheckKind::ClassificationConfidence,
                passed: true,
                confidence: 1.0,
                detail: Some("type declared by uploader".to_string()),
            },
            Some(confidence) => {
                let passed = confidence >= self.thresholds.classification_threshold;
                if !passed {
                    issues.push(format!(
                        "classification confidence {:.2} below threshold {:.2}",
                        confidence, self.thresholds.classification_threshold
                    ));
                }
                VerificationCheck {
                    kind: CheckKind::ClassificationConfidence,
                    passed,
                    confidence,
                    detail: None,
                }
            }
        }
    }

    fn check_required_fields(
        &self,
        input: &EvaluationInput<'_>,
        issues: &mut Vec<String>,
    ) -> VerificationCheck {
        let Some(template) = input.template else {
            // No template to check against (Other/Unknown documents).
            return VerificationCheck {
                kind: CheckKind::RequiredFields,
                passed: true,
                confidence: 1.0,
                detail: Some("no template for document type".to_string()),
            };
        };

        let required: Vec<&str> = template
            .expected_fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();
        if required.is_empty() {
            return VerificationCheck {
                kind: CheckKind::RequiredFields,
                passed: true,
                confidence: 1.0,
                detail: None,
            };
        }

        let missing: Vec<&str> = required
            .iter()
            .filter(|name| {
                !input
                    .fields
                    .iter()
                    .any(|f| f.name.eq_ignore_ascii_case(name))
            })
            .copied()
            .collect();

        let passed = missing.is_empty();
        let confidence = 1.0 - missing.len() as f64 / required.len() as f64;
        if !passed {
            for name in &missing {
                issues.push(format!("required field '{}' was not extracted", name));
            }
        }
        VerificationCheck {
            kind: CheckKind::RequiredFields,
            passed,
            confidence,
            detail: (!passed).then(|| format!("missing: {}", missing.join(", "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, FieldKind};
    use crate::templates;

    fn scored_fields(confidences: &[f64]) -> Vec<ExtractedField> {
        confidences
            .iter()
            .enumerate()
            .map(|(i, c)| {
                ExtractedField::new(format!("field_{}", i), "value", FieldKind::Text)
                    .with_confidence(*c)
            })
            .collect()
    }

    fn w2_fields() -> Vec<ExtractedField> {
        templates::template_for(DocumentType::W2)
            .unwrap()
            .expected_fields
            .iter()
            .map(|tf| ExtractedField::new(tf.name, "value", tf.kind).with_confidence(0.95))
            .collect()
    }

    // ───── state machine ─────

    #[test]
    fn test_happy_path_auto_approval_chain() {
        let s = transition(VerificationStatus::Pending, &VerificationEvent::BeginChecks).unwrap();
        assert_eq!(s, VerificationStatus::InProgress);
        let s = transition(s, &VerificationEvent::ChecksEvaluated { auto_approve: true }).unwrap();
        assert_eq!(s, VerificationStatus::AutoApproved);
        let s = transition(s, &VerificationEvent::Promote).unwrap();
        assert_eq!(s, VerificationStatus::Approved);
    }

    #[test]
    fn test_manual_review_chain() {
        let s = transition(
            VerificationStatus::InProgress,
            &VerificationEvent::ChecksEvaluated {
                auto_approve: false,
            },
        )
        .unwrap();
        assert_eq!(s, VerificationStatus::ManualReviewRequired);
        assert_eq!(
            transition(s, &VerificationEvent::ReviewerApproved).unwrap(),
            VerificationStatus::Approved
        );
        assert_eq!(
            transition(s, &VerificationEvent::ReviewerRejected).unwrap(),
            VerificationStatus::Rejected
        );
    }

    #[test]
    fn test_checks_evaluated_straight_from_pending() {
        // InProgress is optional when evaluation is synchronous.
        let s = transition(
            VerificationStatus::Pending,
            &VerificationEvent::ChecksEvaluated { auto_approve: true },
        )
        .unwrap();
        assert_eq!(s, VerificationStatus::AutoApproved);
    }

    #[test]
    fn test_expire_from_non_terminal_and_approved() {
        for s in [
            VerificationStatus::Pending,
            VerificationStatus::InProgress,
            VerificationStatus::AutoApproved,
            VerificationStatus::ManualReviewRequired,
            VerificationStatus::Approved,
        ] {
            assert_eq!(
                transition(s, &VerificationEvent::Expire).unwrap(),
                VerificationStatus::Expired
            );
        }
    }

    #[test]
    fn test_approved_rejects_pending_style_events() {
        for event in [
            VerificationEvent::BeginChecks,
            VerificationEvent::ChecksEvaluated { auto_approve: true },
            VerificationEvent::ReviewerApproved,
            VerificationEvent::ReviewerRejected,
            VerificationEvent::Promote,
        ] {
            let err = transition(VerificationStatus::Approved, &event).unwrap_err();
            assert!(matches!(err, Error::InvalidTransition { .. }));
        }
    }

    #[test]
    fn test_no_transition_out_of_rejected_or_expired() {
        for from in [VerificationStatus::Rejected, VerificationStatus::Expired] {
            for event in [
                VerificationEvent::BeginChecks,
                VerificationEvent::ChecksEvaluated {
                    auto_approve: false,
                },
                VerificationEvent::ReviewerApproved,
                VerificationEvent::ReviewerRejected,
                VerificationEvent::Promote,
                VerificationEvent::Expire,
            ] {
                assert!(
                    transition(from, &event).is_err(),
                    "{:?} must not accept {:?}",
                    from,
                    event
                );
            }
        }
    }

    #[test]
    fn test_invalid_transition_error_carries_context() {
        let err = transition(
            VerificationStatus::Rejected,
            &VerificationEvent::BeginChecks,
        )
        .unwrap_err();
        match err {
            Error::InvalidTransition { from, event } => {
                assert_eq!(from, VerificationStatus::Rejected);
                assert_eq!(event, VerificationEvent::BeginChecks);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    // ───── evaluator ─────

    #[test]
    fn test_clean_high_confidence_auto_approves() {
        let fields = w2_fields();
        let evaluator = VerificationEvaluator::default();
        let outcome = evaluator
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.95,
                classification_confidence: None,
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::AutoApproved);
        assert!(outcome.issues.is_empty());
        assert!(outcome.checks.iter().all(|c| c.passed));
        assert!((outcome.score - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_auto_approval_boundary_at_exact_threshold() {
        let fields = w2_fields();
        let evaluator = VerificationEvaluator::default();
        let base = EvaluationInput {
            fields: &fields,
            validation_errors: &[],
            overall_confidence: 0.90,
            classification_confidence: None,
            template: templates::template_for(DocumentType::W2),
        };

        let at = evaluator.evaluate(&base).unwrap();
        assert_eq!(at.status, VerificationStatus::AutoApproved);

        let just_below = evaluator
            .evaluate(&EvaluationInput {
                overall_confidence: 0.8999,
                ..base
            })
            .unwrap();
        assert_eq!(just_below.status, VerificationStatus::ManualReviewRequired);
    }

    #[test]
    fn test_validation_errors_force_manual_review() {
        let fields = w2_fields();
        let errors = vec!["wages: 'abc' is not a valid currency amount".to_string()];
        let outcome = VerificationEvaluator::default()
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &errors,
                overall_confidence: 0.95,
                classification_confidence: None,
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::ManualReviewRequired);
        // The specific failing message survives for the reviewer UI.
        assert!(outcome.issues.iter().any(|i| i.contains("wages")));
        let check = &outcome.checks[0];
        assert_eq!(check.kind, CheckKind::FieldValidation);
        assert!(!check.passed);
    }

    #[test]
    fn test_low_classification_confidence_forces_manual_review() {
        let fields = w2_fields();
        let outcome = VerificationEvaluator::default()
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.95,
                classification_confidence: Some(0.4),
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::ManualReviewRequired);
        assert!(outcome
            .issues
            .iter()
            .any(|i| i.contains("classification confidence")));
    }

    #[test]
    fn test_missing_required_field_forces_manual_review() {
        let mut fields = w2_fields();
        fields.retain(|f| f.name != "wages");
        let outcome = VerificationEvaluator::default()
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.95,
                classification_confidence: None,
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::ManualReviewRequired);
        assert!(outcome.issues.iter().any(|i| i.contains("wages")));
    }

    #[test]
    fn test_no_template_passes_required_fields_check() {
        let fields = scored_fields(&[0.95, 0.92]);
        let outcome = VerificationEvaluator::default()
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.93,
                classification_confidence: Some(0.85),
                template: None,
            })
            .unwrap();

        assert_eq!(outcome.status, VerificationStatus::AutoApproved);
    }

    #[test]
    fn test_score_is_weakest_check() {
        let fields = w2_fields();
        let outcome = VerificationEvaluator::default()
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.85,
                classification_confidence: Some(0.75),
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();

        // All checks pass, but the weakest (classification 0.75) is the
        // score, which sits below the auto-approve threshold.
        assert!(outcome.checks.iter().all(|c| c.passed));
        assert!((outcome.score - 0.75).abs() < f64::EPSILON);
        assert_eq!(outcome.status, VerificationStatus::ManualReviewRequired);
    }

    #[test]
    fn test_custom_thresholds() {
        let fields = w2_fields();
        let lax = VerificationEvaluator::new(VerificationThresholds {
            review_threshold: 0.5,
            auto_approve_threshold: 0.6,
            classification_threshold: 0.5,
        });
        let outcome = lax
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.65,
                classification_confidence: Some(0.7),
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();
        assert_eq!(outcome.status, VerificationStatus::AutoApproved);
    }

    #[test]
    fn test_check_order_is_stable() {
        let fields = w2_fields();
        let outcome = VerificationEvaluator::default()
            .evaluate(&EvaluationInput {
                fields: &fields,
                validation_errors: &[],
                overall_confidence: 0.95,
                classification_confidence: Some(0.9),
                template: templates::template_for(DocumentType::W2),
            })
            .unwrap();
        let kinds: Vec<CheckKind> = outcome.checks.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                CheckKind::FieldValidation,
                CheckKind::ExtractionConfidence,
                CheckKind::ClassificationConfidence,
                CheckKind::RequiredFields,
            ]
        );
    }
}
