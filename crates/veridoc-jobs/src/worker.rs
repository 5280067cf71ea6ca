//! Polling scheduler and bounded worker pool for document extraction.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use veridoc_core::defaults;
use veridoc_core::{Document, DocumentRepository, DocumentStatus, DocumentType};

use crate::pipeline::{DocumentPipeline, ProcessOutcome};

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Polling interval in seconds.
    pub poll_interval_secs: u64,
    /// Maximum number of documents processed concurrently.
    pub worker_count: usize,
    /// Claims older than this are released by the startup sweep.
    pub max_processing_secs: i64,
    /// Whether to enable document processing.
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::POLL_INTERVAL_SECS,
            worker_count: defaults::WORKER_COUNT,
            max_processing_secs: defaults::MAX_PROCESSING_SECS,
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VERIDOC_SCHEDULER_ENABLED` | `true` | Enable/disable processing |
    /// | `VERIDOC_WORKER_COUNT` | `5` | Max concurrent extractions |
    /// | `VERIDOC_POLL_INTERVAL_SECS` | `30` | Polling interval when idle |
    /// | `VERIDOC_MAX_PROCESSING_SECS` | `900` | Stale-claim cutoff |
    pub fn from_env() -> Self {
        let enabled = std::env::var("VERIDOC_SCHEDULER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let worker_count = std::env::var("VERIDOC_WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_COUNT)
            .max(1);

        let poll_interval_secs = std::env::var("VERIDOC_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::POLL_INTERVAL_SECS);

        let max_processing_secs = std::env::var("VERIDOC_MAX_PROCESSING_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults::MAX_PROCESSING_SECS);

        Self {
            poll_interval_secs,
            worker_count,
            max_processing_secs,
            enabled,
        }
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the worker count.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Enable or disable processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Candidate cap per polling cycle (2x the worker count).
    pub fn batch_size(&self) -> usize {
        self.worker_count * defaults::BATCH_FACTOR
    }
}

/// Event emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A document was claimed and dispatched.
    DocumentStarted {
        document_id: Uuid,
        doc_type: DocumentType,
    },
    /// A document finished with a derived status.
    DocumentFinished {
        document_id: Uuid,
        status: DocumentStatus,
    },
    /// A document failed transiently and was released for retry.
    DocumentRetried { document_id: Uuid, attempt: i32 },
    /// A document exhausted its retries and was rejected.
    DocumentRejected { document_id: Uuid, error: String },
    /// Scheduler started.
    SchedulerStarted,
    /// Scheduler stopped.
    SchedulerStopped,
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<SchedulerEvent>,
}

impl SchedulerHandle {
    /// Signal the scheduler to shut down gracefully.
    ///
    /// The loop stops claiming immediately; in-flight extractions are
    /// allowed to finish (a hard kill is covered by the startup sweep).
    pub async fn shutdown(&self) -> veridoc_core::Result<()> {
        self.shutdown_tx.send(()).await.map_err(|_| {
            veridoc_core::Error::Internal("Failed to send shutdown signal".into())
        })?;
        Ok(())
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Scheduler that claims pending documents and feeds the worker pool.
pub struct Scheduler {
    documents: Arc<dyn DocumentRepository>,
    pipeline: Arc<DocumentPipeline>,
    config: SchedulerConfig,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        pipeline: Arc<DocumentPipeline>,
        config: SchedulerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            documents,
            pipeline,
            config,
            event_tx,
        }
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the scheduler and return a handle for control.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let scheduler = Arc::new(self);
        let scheduler_clone = scheduler.clone();

        tokio::spawn(async move {
            scheduler_clone.run(&mut shutdown_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the polling loop with concurrent document processing.
    ///
    /// Claims up to `worker_count` documents per wave and joins each wave
    /// before claiming more; a cycle claims at most `batch_size()` before
    /// sleeping. Only sleeps when nothing was claimed.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Scheduler is disabled, not starting");
            return;
        }

        // A crashed run must not leave documents permanently claimed.
        match self
            .documents
            .release_stale_claims(self.config.max_processing_secs)
            .await
        {
            Ok(0) => {}
            Ok(released) => warn!(released, "Released stale claims from a previous run"),
            Err(e) => error!(error = %e, "Stale-claim sweep failed"),
        }

        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            worker_count = self.config.worker_count,
            "Scheduler started"
        );
        let _ = self.event_tx.send(SchedulerEvent::SchedulerStarted);

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);

        'outer: loop {
            // Check for shutdown before claiming documents
            if shutdown_rx.try_recv().is_ok() {
                info!("Scheduler received shutdown signal");
                break;
            }

            let mut claimed_this_cycle = 0;
            while claimed_this_cycle < self.config.batch_size() {
                let wave_limit = self
                    .config
                    .worker_count
                    .min(self.config.batch_size() - claimed_this_cycle);
                let claimed = self.run_wave(wave_limit).await;
                claimed_this_cycle += claimed;
                if claimed == 0 {
                    break;
                }
                if shutdown_rx.try_recv().is_ok() {
                    info!("Scheduler received shutdown signal");
                    break 'outer;
                }
            }

            if claimed_this_cycle == 0 {
                // Queue empty — sleep before polling again
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed = claimed_this_cycle, "Processed claim cycle");
            }
        }

        let _ = self.event_tx.send(SchedulerEvent::SchedulerStopped);
        info!("Scheduler stopped");
    }

    /// Claim up to `limit` documents and process them concurrently.
    ///
    /// Returns the number claimed. Waits for the whole wave: the pool is
    /// saturated once `worker_count` documents are in flight, and excess
    /// candidates stay pending for the next cycle.
    async fn run_wave(&self, limit: usize) -> usize {
        let mut tasks = tokio::task::JoinSet::new();
        let mut claimed = 0;

        for _ in 0..limit {
            match self.claim_one().await {
                Some(document) => {
                    claimed += 1;
                    let _ = self.event_tx.send(SchedulerEvent::DocumentStarted {
                        document_id: document.id,
                        doc_type: document.doc_type,
                    });
                    let pipeline = self.pipeline.clone();
                    let event_tx = self.event_tx.clone();
                    tasks.spawn(async move {
                        let document_id = document.id;
                        let outcome = pipeline.process(document).await;
                        let event = match outcome {
                            ProcessOutcome::Finished { status } => {
                                SchedulerEvent::DocumentFinished {
                                    document_id,
                                    status,
                                }
                            }
                            ProcessOutcome::Retried { attempt, .. } => {
                                SchedulerEvent::DocumentRetried {
                                    document_id,
                                    attempt,
                                }
                            }
                            ProcessOutcome::Rejected { error } => {
                                SchedulerEvent::DocumentRejected { document_id, error }
                            }
                        };
                        let _ = event_tx.send(event);
                    });
                }
                None => break,
            }
        }

        // One panicking document must not take down the pool.
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = ?e, "Document task panicked");
            }
        }
        claimed
    }

    /// Claim the next eligible document, swallowing claim conflicts.
    async fn claim_one(&self) -> Option<Document> {
        let claim_token = Uuid::new_v4();
        match self.documents.claim_next(claim_token).await {
            Ok(Some(document)) => {
                debug!(
                    document_id = %document.id,
                    claim_token = %claim_token,
                    "Claimed document"
                );
                Some(document)
            }
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, "Failed to claim document");
                None
            }
        }
    }
}
