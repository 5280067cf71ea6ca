//! MockOcrEngine — scripted OCR outcomes for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use veridoc_core::{DocumentType, Error, OcrEngine, OcrOutput, OcrStatus, Result};

/// One scripted engine response.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this output.
    Complete(OcrOutput),
    /// Engine reachable but reports it could not process the document.
    EngineFailure,
    /// Transport-level error (`Err` from the adapter).
    TransportError(String),
}

/// Test double replaying a script of outcomes, one per `extract` call.
///
/// When the script runs out, the last outcome repeats, so a single-entry
/// script behaves like a constant engine.
pub struct MockOcrEngine {
    script: Mutex<VecDeque<MockOutcome>>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    /// Engine that replays `outcomes` in order, repeating the last.
    pub fn scripted(outcomes: Vec<MockOutcome>) -> Self {
        assert!(!outcomes.is_empty(), "mock script must not be empty");
        Self {
            script: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Engine that always completes with `output`.
    pub fn completing(output: OcrOutput) -> Self {
        Self::scripted(vec![MockOutcome::Complete(output)])
    }

    /// Engine that always reports an engine-level failure.
    pub fn failing() -> Self {
        Self::scripted(vec![MockOutcome::EngineFailure])
    }

    /// Engine that always errors at the transport level.
    pub fn erroring(message: &str) -> Self {
        Self::scripted(vec![MockOutcome::TransportError(message.to_string())])
    }

    /// Number of `extract` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        let mut script = self.script.lock().expect("mock script lock");
        if script.len() > 1 {
            script.pop_front().expect("non-empty script")
        } else {
            script.front().cloned().expect("non-empty script")
        }
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn extract(&self, _data: &[u8], _expected_type: DocumentType) -> Result<OcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_outcome() {
            MockOutcome::Complete(output) => Ok(output),
            MockOutcome::EngineFailure => Ok(OcrOutput {
                raw_text: String::new(),
                fields: Vec::new(),
                classified_type: DocumentType::Unknown,
                status: OcrStatus::Failed,
            }),
            MockOutcome::TransportError(message) => Err(Error::Ocr(message)),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(text: &str) -> OcrOutput {
        OcrOutput {
            raw_text: text.to_string(),
            fields: Vec::new(),
            classified_type: DocumentType::Other,
            status: OcrStatus::Completed,
        }
    }

    #[tokio::test]
    async fn test_script_replays_in_order_then_repeats() {
        let engine = MockOcrEngine::scripted(vec![
            MockOutcome::TransportError("down".into()),
            MockOutcome::Complete(completed("ok")),
        ]);

        assert!(engine.extract(b"x", DocumentType::W2).await.is_err());
        let out = engine.extract(b"x", DocumentType::W2).await.unwrap();
        assert_eq!(out.raw_text, "ok");
        // Last outcome repeats.
        let out = engine.extract(b"x", DocumentType::W2).await.unwrap();
        assert_eq!(out.raw_text, "ok");
        assert_eq!(engine.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_engine_reports_failed_status() {
        let engine = MockOcrEngine::failing();
        let out = engine.extract(b"x", DocumentType::Unknown).await.unwrap();
        assert_eq!(out.status, OcrStatus::Failed);
    }
}
