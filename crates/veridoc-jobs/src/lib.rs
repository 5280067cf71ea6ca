//! # veridoc-jobs
//!
//! Scheduler, extraction pipeline, and OCR adapters for veridoc.
//!
//! This crate provides:
//! - A polling scheduler with a bounded worker pool and conditional claims
//! - The extraction coordinator (classify → extract → validate → verify)
//! - Retry logic with exponential backoff and terminal rejection
//! - OCR engine adapters (tesseract, remote HTTP, test mock)
//! - The caller-facing [`IntakeService`] facade
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use veridoc_db::{Database, FilesystemBackend};
//! use veridoc_jobs::{
//!     DocumentPipeline, PipelineConfig, Scheduler, SchedulerConfig, TesseractEngine,
//! };
//!
//! let db = Database::connect("postgres://...").await?;
//! let storage = Arc::new(FilesystemBackend::new("/var/veridoc/blobs"));
//! let engine = Arc::new(TesseractEngine::new());
//!
//! let documents = Arc::new(db.documents);
//! let pipeline = Arc::new(DocumentPipeline::new(
//!     documents.clone(),
//!     Arc::new(db.extractions),
//!     Arc::new(db.verifications),
//!     storage,
//!     engine,
//!     PipelineConfig::from_env(),
//! ));
//!
//! let handle = Scheduler::new(documents, pipeline, SchedulerConfig::from_env()).start();
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod classify;
pub mod pipeline;
pub mod service;
pub mod worker;

// Re-export core types
pub use veridoc_core::*;

// Re-export pipeline types
pub use classify::TypeClassifier;
pub use pipeline::{DocumentPipeline, PipelineConfig, ProcessOutcome};
pub use service::IntakeService;
pub use worker::{Scheduler, SchedulerConfig, SchedulerEvent, SchedulerHandle};

// Re-export engine adapters
pub use adapters::{MockOcrEngine, MockOutcome, RemoteOcrEngine, TesseractEngine};
