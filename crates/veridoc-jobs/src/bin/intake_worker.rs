//! intake-worker — the veridoc background processing daemon.
//!
//! Connects to Postgres, validates blob storage, and runs the document
//! scheduler plus a periodic verification-expiry sweep until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use veridoc_db::{Database, FilesystemBackend};
use veridoc_jobs::{
    DocumentPipeline, IntakeService, OcrEngine, PipelineConfig, RemoteOcrEngine, Scheduler,
    SchedulerConfig, StorageBackend, TesseractEngine,
};

/// Seconds between verification-expiry sweeps.
const EXPIRY_SWEEP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let storage_path =
        std::env::var("VERIDOC_STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());

    let db = Database::connect(&database_url)
        .await
        .context("failed to connect to database")?;

    let backend = FilesystemBackend::new(&storage_path);
    backend
        .validate()
        .await
        .map_err(|e| anyhow::anyhow!("storage validation failed: {}", e))?;
    let storage: Arc<dyn StorageBackend> = Arc::new(backend);

    // A remote OCR endpoint takes precedence; otherwise use local tesseract.
    let engine: Arc<dyn OcrEngine> = match std::env::var("VERIDOC_OCR_URL") {
        Ok(url) => {
            info!(ocr_url = %url, "Using remote OCR engine");
            Arc::new(RemoteOcrEngine::new(url)?)
        }
        Err(_) => {
            info!("Using local tesseract OCR engine");
            Arc::new(TesseractEngine::new())
        }
    };

    let pipeline_config = PipelineConfig::from_env();
    let documents = Arc::new(veridoc_db::PgDocumentRepository::new(db.pool.clone()));
    let extractions = Arc::new(veridoc_db::PgExtractionRepository::new(db.pool.clone()));
    let verifications = Arc::new(veridoc_db::PgVerificationRepository::new(db.pool.clone()));

    let pipeline = Arc::new(DocumentPipeline::new(
        documents.clone(),
        extractions.clone(),
        verifications.clone(),
        storage.clone(),
        engine,
        pipeline_config.clone(),
    ));

    let service = Arc::new(IntakeService::new(
        documents.clone(),
        extractions,
        verifications,
        storage,
        pipeline_config,
    ));

    // Periodic expiry sweep alongside the scheduler.
    let sweep_service = service.clone();
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(EXPIRY_SWEEP_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            match sweep_service.expire_overdue().await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "Expired overdue verification records"),
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    });

    let handle = Scheduler::new(documents, pipeline, SchedulerConfig::from_env()).start();
    info!("intake-worker running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    handle.shutdown().await?;

    Ok(())
}
