//! Progress ledger for resumable pipeline runs
//!
//! The ledger is the single source of truth for what has been done. Every
//! stage consults it before working and commits results through it, which is
//! what makes a job safe to kill and restart at any point:
//! - work item status only moves forward (pending -> in-progress -> done or
//!   failed-terminal), with in-progress -> pending reserved for crash
//!   recovery and cancellation
//! - claims are atomic, so a key is processed by at most one worker
//! - anything left in-progress by a dead process is reset to pending on the
//!   next startup

mod schema;
mod sqlite;
mod traits;
mod work;

pub use sqlite::SqliteLedger;
pub use traits::{Ledger, LedgerError, LedgerResult};
pub use work::{JobRecord, JobStatus, Stage, StageCounts, WorkRecord, WorkStatus};
