//! OCR engine adapters.
//!
//! Each adapter implements [`veridoc_core::OcrEngine`]: `TesseractEngine`
//! shells out to a local tesseract install, `RemoteOcrEngine` talks to a
//! vendor-neutral HTTP endpoint, and `MockOcrEngine` replays scripted
//! outcomes for tests.

mod mock;
mod remote;
mod tesseract;

pub use mock::{MockOcrEngine, MockOutcome};
pub use remote::RemoteOcrEngine;
pub use tesseract::TesseractEngine;
