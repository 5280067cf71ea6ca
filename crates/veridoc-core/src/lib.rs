//! # veridoc-core
//!
//! Core types, traits, and pipeline algorithms for veridoc.
//!
//! This crate provides the foundational data structures, the field
//! validator, the keyword classifier, and the verification state machine
//! that the other veridoc crates depend on.

pub mod classify;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod templates;
pub mod traits;
pub mod validate;
pub mod verification;

// Re-export commonly used types at crate root
pub use classify::classify_text;
pub use error::{Error, Result};
pub use models::*;
pub use templates::{available_templates, template_for};
pub use traits::*;
pub use validate::{validate_field, validate_fields};
pub use verification::{
    transition, EvaluationInput, EvaluationOutcome, VerificationEvaluator, VerificationThresholds,
};

/// Generate a time-ordered UUIDv7 for new rows.
pub fn new_v7() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}
