//! Ledger trait and error types

use crate::ledger::work::{Stage, StageCounts, WorkRecord, WorkStatus};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No active job; call begin_job first")]
    NoActiveJob,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job '{name}' was started from a different keyword list; rerun with --fresh to restart it")]
    JobMismatch { name: String },

    #[error("Work item not found: ({stage}, {key})")]
    WorkItemNotFound { stage: Stage, key: String },

    #[error("Invalid status transition for ({stage}, {key}): {from} -> {to}")]
    InvalidTransition {
        stage: Stage,
        key: String,
        from: WorkStatus,
        to: WorkStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Trait for the progress ledger backing a job
///
/// The ledger is the single source of truth for resumability: every stage
/// asks it for pending work on startup instead of recomputing from scratch,
/// and commits status changes through it. Writes to a given key are
/// serialized; a key is held by at most one worker via `claim`.
pub trait Ledger {
    // ===== Work items =====

    /// Inserts a work item if absent
    ///
    /// Returns true if the item was inserted, false if the key already
    /// existed (re-adding is a no-op).
    fn add_work(&mut self, stage: Stage, key: &str) -> LedgerResult<bool>;

    /// Gets a work item by stage and key
    fn get(&self, stage: Stage, key: &str) -> LedgerResult<Option<WorkRecord>>;

    /// Atomically claims a pending item for processing
    ///
    /// Returns true if this caller won the pending -> in-progress
    /// transition, false if the item was not pending (already claimed,
    /// finished, or unknown).
    fn claim(&mut self, stage: Stage, key: &str) -> LedgerResult<bool>;

    /// Records a failed attempt without changing status
    ///
    /// Increments the attempt counter and stores the error. Returns the new
    /// attempt count so callers can compare against their retry ceiling.
    fn record_attempt(&mut self, stage: Stage, key: &str, error: &str) -> LedgerResult<u32>;

    /// Marks an in-progress item done
    fn mark_done(&mut self, stage: Stage, key: &str) -> LedgerResult<()>;

    /// Marks an in-progress item as a terminal failure with its last error
    fn mark_failed(&mut self, stage: Stage, key: &str, error: &str) -> LedgerResult<()>;

    /// Returns an in-progress item to pending (cancellation path)
    fn release(&mut self, stage: Stage, key: &str) -> LedgerResult<()>;

    /// Gets keys of a stage with the given status, in insertion order
    fn keys_by_status(&self, stage: Stage, status: WorkStatus) -> LedgerResult<Vec<String>>;

    /// Gets pending keys of a stage, in insertion order
    fn pending_keys(&self, stage: Stage) -> LedgerResult<Vec<String>> {
        self.keys_by_status(stage, WorkStatus::Pending)
    }

    /// Resets all in-progress items to pending (crash recovery)
    ///
    /// Returns the number of items reset.
    fn recover_interrupted(&mut self) -> LedgerResult<usize>;

    // ===== Statistics =====

    /// Counts work items of a stage by status
    fn stage_counts(&self, stage: Stage) -> LedgerResult<StageCounts>;

    /// Total done items across all stages (progress signal for the watchdog)
    fn total_done(&self) -> LedgerResult<u64>;

    // ===== Discovered domains =====

    /// Records a domain as seen, returning true if it was new
    ///
    /// A false return means another keyword already claimed this domain and
    /// its sitemap lookup; the caller must not probe it again.
    fn try_record_domain(&mut self, domain: &str) -> LedgerResult<bool>;

    /// Stores the sitemap lookup result for a recorded domain
    fn set_domain_sitemap(&mut self, domain: &str, sitemap_url: Option<&str>) -> LedgerResult<()>;

    /// All domains recorded for this job
    fn known_domains(&self) -> LedgerResult<Vec<String>>;
}
