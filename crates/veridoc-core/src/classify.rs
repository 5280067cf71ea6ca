//! Keyword-signal document classification.
//!
//! Pure text-side half of the classifier: given extracted text, produce a
//! best-guess [`DocumentType`] and a confidence in [0, 1]. The engine-facing
//! wrapper that obtains the text lives in `veridoc-jobs`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::DocumentType;

/// Confidence assigned when no signal matches but text was present.
pub const NO_SIGNAL_CONFIDENCE: f64 = 0.10;

/// Base confidence for a single matched signal; each additional distinct
/// signal for the winning type adds [`SIGNAL_INCREMENT`], capped at 0.95.
const SIGNAL_BASE: f64 = 0.55;
const SIGNAL_INCREMENT: f64 = 0.20;
const SIGNAL_CAP: f64 = 0.95;

struct SignalSet {
    doc_type: DocumentType,
    signals: &'static [&'static str],
    /// All of these must also be present (e.g. transcripts need a school
    /// context word to avoid matching court transcripts).
    co_signals: &'static [&'static str],
}

static SIGNAL_TABLE: &[SignalSet] = &[
    SignalSet {
        doc_type: DocumentType::W2,
        signals: &["w-2", "w2 ", "wage and tax statement"],
        co_signals: &[],
    },
    SignalSet {
        doc_type: DocumentType::TaxReturn,
        signals: &["form 1040", "1040", "tax return", "adjusted gross income"],
        co_signals: &[],
    },
    SignalSet {
        doc_type: DocumentType::BankStatement,
        signals: &["bank statement", "account summary", "beginning balance", "ending balance"],
        co_signals: &[],
    },
    SignalSet {
        doc_type: DocumentType::Transcript,
        signals: &["transcript"],
        co_signals: &["high school", "gpa", "grade point", "graduation"],
    },
];

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Classify extracted text into a document type with a confidence score.
///
/// Empty (or whitespace-only) text yields `(Other, 0.0)`; text with no
/// matching signal yields `(Other, NO_SIGNAL_CONFIDENCE)`. Never fails.
pub fn classify_text(text: &str) -> (DocumentType, f64) {
    if text.trim().is_empty() {
        return (DocumentType::Other, 0.0);
    }

    // Normalize: lowercase, collapse whitespace so signals match across
    // OCR line breaks.
    let normalized = WHITESPACE_RE
        .replace_all(&text.to_lowercase(), " ")
        .into_owned();

    let mut best: Option<(DocumentType, usize)> = None;
    for set in SIGNAL_TABLE {
        let hits = set
            .signals
            .iter()
            .filter(|s| normalized.contains(*s))
            .count();
        if hits == 0 {
            continue;
        }
        if !set.co_signals.is_empty()
            && !set.co_signals.iter().any(|s| normalized.contains(*s))
        {
            continue;
        }
        match best {
            Some((_, best_hits)) if best_hits >= hits => {}
            _ => best = Some((set.doc_type, hits)),
        }
    }

    match best {
        Some((doc_type, hits)) => {
            let confidence =
                (SIGNAL_BASE + SIGNAL_INCREMENT * (hits as f64 - 1.0)).min(SIGNAL_CAP);
            (doc_type, confidence)
        }
        None => (DocumentType::Other, NO_SIGNAL_CONFIDENCE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_other_zero() {
        assert_eq!(classify_text(""), (DocumentType::Other, 0.0));
        assert_eq!(classify_text("   \n\t "), (DocumentType::Other, 0.0));
    }

    #[test]
    fn test_no_signal_is_other_low_confidence() {
        let (doc_type, confidence) = classify_text("lorem ipsum dolor sit amet");
        assert_eq!(doc_type, DocumentType::Other);
        assert!((confidence - NO_SIGNAL_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_w2_signal() {
        let (doc_type, confidence) =
            classify_text("Form W-2 Wage and Tax Statement 2025\nEmployer: Acme Corp");
        assert_eq!(doc_type, DocumentType::W2);
        assert!(confidence > 0.6);
    }

    #[test]
    fn test_tax_return_signal() {
        let (doc_type, _) = classify_text("Form 1040 U.S. Individual Income Tax Return");
        assert_eq!(doc_type, DocumentType::TaxReturn);
    }

    #[test]
    fn test_bank_statement_signal() {
        let (doc_type, confidence) =
            classify_text("Monthly Bank Statement\nBeginning balance: $1,203.44");
        assert_eq!(doc_type, DocumentType::BankStatement);
        assert!(confidence > 0.6);
    }

    #[test]
    fn test_transcript_needs_school_context() {
        let (doc_type, _) = classify_text("Official Transcript\nHigh School Diploma, GPA 3.8");
        assert_eq!(doc_type, DocumentType::Transcript);

        // A bare "transcript" without a school co-signal is not enough.
        let (doc_type, _) = classify_text("deposition transcript, case no. 42");
        assert_eq!(doc_type, DocumentType::Other);
    }

    #[test]
    fn test_more_signals_raise_confidence() {
        let (_, one) = classify_text("bank statement");
        let (_, two) = classify_text("bank statement with a beginning balance of $5");
        assert!(two > one);
    }

    #[test]
    fn test_confidence_is_capped() {
        let (_, confidence) = classify_text(
            "bank statement account summary beginning balance ending balance",
        );
        assert!(confidence <= 0.95);
    }

    #[test]
    fn test_signals_match_across_line_breaks() {
        let (doc_type, _) = classify_text("wage and\n   tax statement");
        assert_eq!(doc_type, DocumentType::W2);
    }
}
