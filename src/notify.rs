//! Best-effort status notifications
//!
//! The notifier is a fire-and-forget sink: it never blocks pipeline
//! workers and its failures are logged, never propagated. Delivery is not
//! guaranteed and nothing in the pipeline may rely on it for correctness.

use crate::ledger::{Stage, StageCounts};
use std::fmt;

/// Events emitted over the life of a job
#[derive(Debug, Clone)]
pub enum JobEvent {
    JobStarted {
        job: String,
    },
    StageCompleted {
        job: String,
        stage: Stage,
        counts: StageCounts,
    },
    JobStalled {
        job: String,
        pending: u64,
    },
    JobFinished {
        job: String,
        done: u64,
        failed: u64,
    },
    JobError {
        job: String,
        message: String,
    },
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobStarted { job } => write!(f, "job '{}' started", job),
            Self::StageCompleted { job, stage, counts } => write!(
                f,
                "job '{}' finished stage {}: {} done, {} failed",
                job, stage, counts.done, counts.failed_terminal
            ),
            Self::JobStalled { job, pending } => write!(
                f,
                "job '{}' appears stalled with {} item(s) still pending",
                job, pending
            ),
            Self::JobFinished { job, done, failed } => write!(
                f,
                "job '{}' finished: {} done, {} failed",
                job, done, failed
            ),
            Self::JobError { job, message } => write!(f, "job '{}' error: {}", job, message),
        }
    }
}

/// Sink for job events
///
/// Implementations must return quickly; anything slow belongs on a
/// background task inside the implementation, not in the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &JobEvent);
}

/// Default notifier that writes events to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &JobEvent) {
        match event {
            JobEvent::JobStalled { .. } | JobEvent::JobError { .. } => {
                tracing::error!("{}", event)
            }
            _ => tracing::info!("{}", event),
        }
    }
}

/// Notifier that drops every event (for tests and --quiet runs)
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &JobEvent) {}
}
