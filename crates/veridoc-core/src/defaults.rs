//! Centralized default constants for the veridoc pipeline.
//!
//! **This module is the single source of truth** for all shared default
//! values. The scheduler, pipeline, and verification evaluator reference
//! these constants instead of defining their own magic numbers; every one
//! of them can be overridden through the corresponding `VERIDOC_*`
//! environment variable read by the `from_env()` constructors.

// =============================================================================
// SCHEDULER
// =============================================================================

/// Polling interval between claim cycles, in seconds.
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Maximum number of documents processed concurrently.
pub const WORKER_COUNT: usize = 5;

/// Candidate window per polling cycle, as a multiple of the worker count.
pub const BATCH_FACTOR: usize = 2;

/// A claim older than this is considered stale and released at startup.
pub const MAX_PROCESSING_SECS: i64 = 900;

/// Broadcast channel capacity for scheduler events.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// RETRY / BACKOFF
// =============================================================================

/// Maximum extraction attempts before a document is terminally rejected.
pub const MAX_RETRIES: i32 = 3;

/// Backoff delay after failure n is `2^n` of these units (minutes).
pub const BACKOFF_BASE_SECS: i64 = 60;

/// Upper bound on the random jitter added to each backoff delay, in seconds.
pub const BACKOFF_JITTER_SECS: i64 = 15;

// =============================================================================
// VERIFICATION THRESHOLDS
// =============================================================================

/// Overall confidence below this routes the document to manual review.
pub const REVIEW_THRESHOLD: f64 = 0.80;

/// Minimum verification score for the auto-approved path.
pub const AUTO_APPROVE_THRESHOLD: f64 = 0.90;

/// Minimum classification confidence accepted without review.
pub const CLASSIFICATION_THRESHOLD: f64 = 0.70;

/// Days until a verification record expires.
pub const VERIFICATION_TTL_DAYS: i64 = 90;

// =============================================================================
// OCR
// =============================================================================

/// Timeout for a single external OCR command invocation, in seconds.
pub const OCR_CMD_TIMEOUT_SECS: u64 = 60;

/// Timeout for a remote OCR HTTP request, in seconds.
pub const OCR_HTTP_TIMEOUT_SECS: u64 = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_ordered() {
        // Review routing must trigger before auto-approval can.
        assert!(REVIEW_THRESHOLD < AUTO_APPROVE_THRESHOLD);
        assert!(CLASSIFICATION_THRESHOLD <= REVIEW_THRESHOLD);
    }

    #[test]
    fn test_batch_window_exceeds_workers() {
        assert!(BATCH_FACTOR >= 2);
        assert!(WORKER_COUNT * BATCH_FACTOR > WORKER_COUNT);
    }
}
