/// Pipeline stages and work item status definitions
///
/// A work item is the atomic unit of progress tracking: one keyword for
/// discovery, one sitemap URL for expansion, one page URL for the crawl,
/// one raw document for enrichment.
use std::fmt;

/// Pipeline stage a work item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Keyword search and sitemap lookup
    Discovery,

    /// Sitemap walk producing page URLs
    Expansion,

    /// Page fetch and content extraction
    Crawl,

    /// Cleaning, chunking, and metadata tagging
    Enrichment,
}

impl Stage {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Expansion => "expansion",
            Self::Crawl => "crawl",
            Self::Enrichment => "enrichment",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovery" => Some(Self::Discovery),
            "expansion" => Some(Self::Expansion),
            "crawl" => Some(Self::Crawl),
            "enrichment" => Some(Self::Enrichment),
            _ => None,
        }
    }

    /// All stages in pipeline order
    pub fn all_stages() -> [Self; 4] {
        [
            Self::Discovery,
            Self::Expansion,
            Self::Crawl,
            Self::Enrichment,
        ]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Status of a single work item
///
/// Transitions only move forward, with two exceptions: an in-progress item
/// returns to pending on crash recovery or cancellation, and becomes a
/// terminal failure once its retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkStatus {
    /// Waiting to be claimed by a worker
    Pending,

    /// Claimed by exactly one worker
    InProgress,

    /// Completed; its output is durably written
    Done,

    /// Failed permanently; skipped by downstream stages
    FailedTerminal,
}

impl WorkStatus {
    /// Returns true if no further processing will happen for this item
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::FailedTerminal)
    }

    /// Returns true if the transition from `self` to `to` is legal
    pub fn can_transition(&self, to: WorkStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Done)
                | (Self::InProgress, Self::FailedTerminal)
                | (Self::InProgress, Self::Pending)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::FailedTerminal => "failed_terminal",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            "failed_terminal" => Some(Self::FailedTerminal),
            _ => None,
        }
    }

    pub fn all_statuses() -> [Self; 4] {
        [
            Self::Pending,
            Self::InProgress,
            Self::Done,
            Self::FailedTerminal,
        ]
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A work item row as stored in the ledger
#[derive(Debug, Clone)]
pub struct WorkRecord {
    pub id: i64,
    pub stage: Stage,
    pub key: String,
    pub status: WorkStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A job row as stored in the ledger
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: i64,
    pub name: String,
    pub keywords_hash: String,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: JobStatus,
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Interrupted,
    Superseded,
}

impl JobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Superseded => "superseded",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

/// Per-stage tally of work item statuses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub done: u64,
    pub failed_terminal: u64,
}

impl StageCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.done + self.failed_terminal
    }

    /// Returns true if every item of the stage reached a terminal status
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}
