//! SQLite ledger implementation
//!
//! This module provides the SQLite-backed implementation of the Ledger trait.

use crate::ledger::schema::initialize_schema;
use crate::ledger::traits::{Ledger, LedgerError, LedgerResult};
use crate::ledger::work::{JobRecord, JobStatus, Stage, StageCounts, WorkRecord, WorkStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite ledger backend
///
/// Holds one open connection and the active job. WAL mode keeps the file
/// readable during writes and survives partial writes across restarts.
pub struct SqliteLedger {
    conn: Connection,
    job_id: Option<i64>,
}

impl SqliteLedger {
    /// Opens or creates a ledger database at the given path
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn, job_id: None })
    }

    /// Creates an in-memory ledger (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn, job_id: None })
    }

    /// Begins or resumes the job with the given name
    ///
    /// Resuming requires the same keyword-list hash; a mismatch is rejected
    /// so two different keyword lists cannot interleave under one name.
    /// With `fresh` the existing job row is archived under a suffixed name
    /// (history is kept, never deleted) and a new job starts from scratch.
    pub fn begin_job(
        &mut self,
        name: &str,
        keywords_hash: &str,
        config_hash: &str,
        fresh: bool,
    ) -> LedgerResult<JobRecord> {
        let existing = self.find_job_by_name(name)?;

        if let Some(job) = existing {
            if fresh {
                let archived_name = format!("{}@{}", name, job.id);
                self.conn.execute(
                    "UPDATE jobs SET name = ?1, status = ?2 WHERE id = ?3",
                    params![archived_name, JobStatus::Superseded.to_db_string(), job.id],
                )?;
            } else {
                if job.keywords_hash != keywords_hash {
                    return Err(LedgerError::JobMismatch {
                        name: name.to_string(),
                    });
                }
                self.conn.execute(
                    "UPDATE jobs SET status = ?1 WHERE id = ?2",
                    params![JobStatus::Running.to_db_string(), job.id],
                )?;
                self.job_id = Some(job.id);
                tracing::info!("Resuming job '{}' (id {})", name, job.id);
                return self.current_job();
            }
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO jobs (name, keywords_hash, config_hash, started_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                keywords_hash,
                config_hash,
                now,
                JobStatus::Running.to_db_string()
            ],
        )?;
        self.job_id = Some(self.conn.last_insert_rowid());
        tracing::info!("Starting new job '{}'", name);
        self.current_job()
    }

    /// Attaches to an existing job without modifying it (read-only use,
    /// e.g. statistics)
    pub fn attach_job(&mut self, name: &str) -> LedgerResult<JobRecord> {
        let job = self
            .find_job_by_name(name)?
            .ok_or_else(|| LedgerError::JobNotFound(name.to_string()))?;
        self.job_id = Some(job.id);
        Ok(job)
    }

    /// Marks the active job completed with a finish timestamp
    pub fn complete_job(&mut self) -> LedgerResult<()> {
        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE jobs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![JobStatus::Completed.to_db_string(), now, job_id],
        )?;
        Ok(())
    }

    /// Marks the active job interrupted (cancellation, shutdown)
    pub fn interrupt_job(&mut self) -> LedgerResult<()> {
        let job_id = self.active_job_id()?;
        self.conn.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            params![JobStatus::Interrupted.to_db_string(), job_id],
        )?;
        Ok(())
    }

    /// Gets the active job record
    pub fn current_job(&self) -> LedgerResult<JobRecord> {
        let job_id = self.active_job_id()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, name, keywords_hash, config_hash, started_at, finished_at, status
             FROM jobs WHERE id = ?1",
        )?;

        let job = stmt
            .query_row(params![job_id], row_to_job)
            .map_err(|_| LedgerError::JobNotFound(format!("id {}", job_id)))?;

        Ok(job)
    }

    fn find_job_by_name(&self, name: &str) -> LedgerResult<Option<JobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, keywords_hash, config_hash, started_at, finished_at, status
             FROM jobs WHERE name = ?1",
        )?;

        let job = stmt.query_row(params![name], row_to_job).optional()?;
        Ok(job)
    }

    fn active_job_id(&self) -> LedgerResult<i64> {
        self.job_id.ok_or(LedgerError::NoActiveJob)
    }

    fn get_record(&self, stage: Stage, key: &str) -> LedgerResult<Option<WorkRecord>> {
        let job_id = self.active_job_id()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, stage, natural_key, status, attempts, last_error, created_at, updated_at
             FROM work_items WHERE job_id = ?1 AND stage = ?2 AND natural_key = ?3",
        )?;

        let record = stmt
            .query_row(params![job_id, stage.to_db_string(), key], |row| {
                Ok(WorkRecord {
                    id: row.get(0)?,
                    stage: Stage::from_db_string(&row.get::<_, String>(1)?)
                        .unwrap_or(Stage::Discovery),
                    key: row.get(2)?,
                    status: WorkStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(WorkStatus::Pending),
                    attempts: row.get(4)?,
                    last_error: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .optional()?;

        Ok(record)
    }

    /// Transitions a work item after validating the move is legal
    fn transition(
        &mut self,
        stage: Stage,
        key: &str,
        to: WorkStatus,
        error: Option<&str>,
    ) -> LedgerResult<()> {
        let record =
            self.get_record(stage, key)?
                .ok_or_else(|| LedgerError::WorkItemNotFound {
                    stage,
                    key: key.to_string(),
                })?;

        if !record.status.can_transition(to) {
            return Err(LedgerError::InvalidTransition {
                stage,
                key: key.to_string(),
                from: record.status,
                to,
            });
        }

        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        match error {
            Some(e) => {
                self.conn.execute(
                    "UPDATE work_items SET status = ?1, last_error = ?2, updated_at = ?3
                     WHERE job_id = ?4 AND stage = ?5 AND natural_key = ?6",
                    params![to.to_db_string(), e, now, job_id, stage.to_db_string(), key],
                )?;
            }
            None => {
                self.conn.execute(
                    "UPDATE work_items SET status = ?1, updated_at = ?2
                     WHERE job_id = ?3 AND stage = ?4 AND natural_key = ?5",
                    params![to.to_db_string(), now, job_id, stage.to_db_string(), key],
                )?;
            }
        }

        Ok(())
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        keywords_hash: row.get(2)?,
        config_hash: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        status: JobStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(JobStatus::Running),
    })
}

impl Ledger for SqliteLedger {
    fn add_work(&mut self, stage: Stage, key: &str) -> LedgerResult<bool> {
        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO work_items (job_id, stage, natural_key, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                job_id,
                stage.to_db_string(),
                key,
                WorkStatus::Pending.to_db_string(),
                now
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get(&self, stage: Stage, key: &str) -> LedgerResult<Option<WorkRecord>> {
        self.get_record(stage, key)
    }

    fn claim(&mut self, stage: Stage, key: &str) -> LedgerResult<bool> {
        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        // The WHERE clause on status makes the pending -> in-progress
        // transition atomic; only one claimant sees a changed row.
        let changed = self.conn.execute(
            "UPDATE work_items SET status = ?1, updated_at = ?2
             WHERE job_id = ?3 AND stage = ?4 AND natural_key = ?5 AND status = ?6",
            params![
                WorkStatus::InProgress.to_db_string(),
                now,
                job_id,
                stage.to_db_string(),
                key,
                WorkStatus::Pending.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn record_attempt(&mut self, stage: Stage, key: &str, error: &str) -> LedgerResult<u32> {
        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE work_items SET attempts = attempts + 1, last_error = ?1, updated_at = ?2
             WHERE job_id = ?3 AND stage = ?4 AND natural_key = ?5",
            params![error, now, job_id, stage.to_db_string(), key],
        )?;

        if changed == 0 {
            return Err(LedgerError::WorkItemNotFound {
                stage,
                key: key.to_string(),
            });
        }

        let attempts: u32 = self.conn.query_row(
            "SELECT attempts FROM work_items
             WHERE job_id = ?1 AND stage = ?2 AND natural_key = ?3",
            params![job_id, stage.to_db_string(), key],
            |row| row.get(0),
        )?;

        Ok(attempts)
    }

    fn mark_done(&mut self, stage: Stage, key: &str) -> LedgerResult<()> {
        self.transition(stage, key, WorkStatus::Done, None)
    }

    fn mark_failed(&mut self, stage: Stage, key: &str, error: &str) -> LedgerResult<()> {
        self.transition(stage, key, WorkStatus::FailedTerminal, Some(error))
    }

    fn release(&mut self, stage: Stage, key: &str) -> LedgerResult<()> {
        self.transition(stage, key, WorkStatus::Pending, None)
    }

    fn keys_by_status(&self, stage: Stage, status: WorkStatus) -> LedgerResult<Vec<String>> {
        let job_id = self.active_job_id()?;
        let mut stmt = self.conn.prepare(
            "SELECT natural_key FROM work_items
             WHERE job_id = ?1 AND stage = ?2 AND status = ?3
             ORDER BY id ASC",
        )?;

        let keys = stmt
            .query_map(
                params![job_id, stage.to_db_string(), status.to_db_string()],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    fn recover_interrupted(&mut self) -> LedgerResult<usize> {
        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        let reset = self.conn.execute(
            "UPDATE work_items SET status = ?1, updated_at = ?2
             WHERE job_id = ?3 AND status = ?4",
            params![
                WorkStatus::Pending.to_db_string(),
                now,
                job_id,
                WorkStatus::InProgress.to_db_string()
            ],
        )?;

        if reset > 0 {
            tracing::info!("Reset {} interrupted work item(s) to pending", reset);
        }

        Ok(reset)
    }

    fn stage_counts(&self, stage: Stage) -> LedgerResult<StageCounts> {
        let job_id = self.active_job_id()?;
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM work_items
             WHERE job_id = ?1 AND stage = ?2 GROUP BY status",
        )?;

        let mut counts = StageCounts::default();
        let rows = stmt.query_map(params![job_id, stage.to_db_string()], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        for row in rows {
            let (status, count) = row?;
            match WorkStatus::from_db_string(&status) {
                Some(WorkStatus::Pending) => counts.pending = count as u64,
                Some(WorkStatus::InProgress) => counts.in_progress = count as u64,
                Some(WorkStatus::Done) => counts.done = count as u64,
                Some(WorkStatus::FailedTerminal) => counts.failed_terminal = count as u64,
                None => {}
            }
        }

        Ok(counts)
    }

    fn total_done(&self) -> LedgerResult<u64> {
        let job_id = self.active_job_id()?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work_items WHERE job_id = ?1 AND status = ?2",
            params![job_id, WorkStatus::Done.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn try_record_domain(&mut self, domain: &str) -> LedgerResult<bool> {
        let job_id = self.active_job_id()?;
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO discovered_domains (job_id, domain, discovered_at)
             VALUES (?1, ?2, ?3)",
            params![job_id, domain, now],
        )?;
        Ok(inserted == 1)
    }

    fn set_domain_sitemap(&mut self, domain: &str, sitemap_url: Option<&str>) -> LedgerResult<()> {
        let job_id = self.active_job_id()?;
        self.conn.execute(
            "UPDATE discovered_domains SET sitemap_url = ?1 WHERE job_id = ?2 AND domain = ?3",
            params![sitemap_url, job_id, domain],
        )?;
        Ok(())
    }

    fn known_domains(&self) -> LedgerResult<Vec<String>> {
        let job_id = self.active_job_id()?;
        let mut stmt = self
            .conn
            .prepare("SELECT domain FROM discovered_domains WHERE job_id = ?1 ORDER BY domain")?;

        let domains = stmt
            .query_map(params![job_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_with_job() -> SqliteLedger {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.begin_job("test-job", "kw_hash", "cfg_hash", false).unwrap();
        ledger
    }

    #[test]
    fn test_begin_new_job() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        let job = ledger.begin_job("job-a", "h1", "c1", false).unwrap();
        assert_eq!(job.name, "job-a");
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn test_resume_same_job() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        let first = ledger.begin_job("job-a", "h1", "c1", false).unwrap();
        let resumed = ledger.begin_job("job-a", "h1", "c1", false).unwrap();
        assert_eq!(first.id, resumed.id);
    }

    #[test]
    fn test_resume_with_different_keywords_rejected() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.begin_job("job-a", "h1", "c1", false).unwrap();
        let result = ledger.begin_job("job-a", "other_hash", "c1", false);
        assert!(matches!(result, Err(LedgerError::JobMismatch { .. })));
    }

    #[test]
    fn test_fresh_archives_old_job() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        let first = ledger.begin_job("job-a", "h1", "c1", false).unwrap();
        let second = ledger.begin_job("job-a", "h2", "c1", true).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.keywords_hash, "h2");
    }

    #[test]
    fn test_add_work_is_idempotent() {
        let mut ledger = open_with_job();
        assert!(ledger.add_work(Stage::Discovery, "rust crates").unwrap());
        assert!(!ledger.add_work(Stage::Discovery, "rust crates").unwrap());

        // Same key in a different stage is a separate item
        assert!(ledger.add_work(Stage::Crawl, "rust crates").unwrap());
    }

    #[test]
    fn test_readd_does_not_reset_status() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "https://example.com/a").unwrap();
        assert!(ledger.claim(Stage::Crawl, "https://example.com/a").unwrap());
        ledger.mark_done(Stage::Crawl, "https://example.com/a").unwrap();

        // Re-adding after completion is a no-op
        assert!(!ledger.add_work(Stage::Crawl, "https://example.com/a").unwrap());
        let record = ledger.get(Stage::Crawl, "https://example.com/a").unwrap().unwrap();
        assert_eq!(record.status, WorkStatus::Done);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "url").unwrap();

        assert!(ledger.claim(Stage::Crawl, "url").unwrap());
        // Second claim loses
        assert!(!ledger.claim(Stage::Crawl, "url").unwrap());
    }

    #[test]
    fn test_claim_unknown_key_returns_false() {
        let mut ledger = open_with_job();
        assert!(!ledger.claim(Stage::Crawl, "nope").unwrap());
    }

    #[test]
    fn test_done_flow() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Discovery, "kw").unwrap();
        ledger.claim(Stage::Discovery, "kw").unwrap();
        ledger.mark_done(Stage::Discovery, "kw").unwrap();

        let record = ledger.get(Stage::Discovery, "kw").unwrap().unwrap();
        assert_eq!(record.status, WorkStatus::Done);
    }

    #[test]
    fn test_done_requires_claim() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Discovery, "kw").unwrap();
        let result = ledger.mark_done(Stage::Discovery, "kw");
        assert!(matches!(
            result,
            Err(LedgerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_done_is_final() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Discovery, "kw").unwrap();
        ledger.claim(Stage::Discovery, "kw").unwrap();
        ledger.mark_done(Stage::Discovery, "kw").unwrap();

        assert!(ledger.mark_failed(Stage::Discovery, "kw", "oops").is_err());
        assert!(ledger.release(Stage::Discovery, "kw").is_err());
        assert!(!ledger.claim(Stage::Discovery, "kw").unwrap());
    }

    #[test]
    fn test_failed_terminal_flow() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "url").unwrap();
        ledger.claim(Stage::Crawl, "url").unwrap();
        ledger.mark_failed(Stage::Crawl, "url", "HTTP 404").unwrap();

        let record = ledger.get(Stage::Crawl, "url").unwrap().unwrap();
        assert_eq!(record.status, WorkStatus::FailedTerminal);
        assert_eq!(record.last_error.as_deref(), Some("HTTP 404"));
    }

    #[test]
    fn test_release_returns_to_pending() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "url").unwrap();
        ledger.claim(Stage::Crawl, "url").unwrap();
        ledger.release(Stage::Crawl, "url").unwrap();

        let record = ledger.get(Stage::Crawl, "url").unwrap().unwrap();
        assert_eq!(record.status, WorkStatus::Pending);

        // Can be claimed again
        assert!(ledger.claim(Stage::Crawl, "url").unwrap());
    }

    #[test]
    fn test_record_attempt_counts_up() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "url").unwrap();
        ledger.claim(Stage::Crawl, "url").unwrap();

        assert_eq!(ledger.record_attempt(Stage::Crawl, "url", "timeout").unwrap(), 1);
        assert_eq!(ledger.record_attempt(Stage::Crawl, "url", "timeout").unwrap(), 2);

        let record = ledger.get(Stage::Crawl, "url").unwrap().unwrap();
        assert_eq!(record.attempts, 2);
        assert_eq!(record.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_recover_interrupted() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "a").unwrap();
        ledger.add_work(Stage::Crawl, "b").unwrap();
        ledger.add_work(Stage::Crawl, "c").unwrap();

        ledger.claim(Stage::Crawl, "a").unwrap();
        ledger.claim(Stage::Crawl, "b").unwrap();
        ledger.mark_done(Stage::Crawl, "b").unwrap();

        // "a" was left in-progress (crash signature); "b" is done; "c" pending
        let reset = ledger.recover_interrupted().unwrap();
        assert_eq!(reset, 1);

        let a = ledger.get(Stage::Crawl, "a").unwrap().unwrap();
        assert_eq!(a.status, WorkStatus::Pending);
        let b = ledger.get(Stage::Crawl, "b").unwrap().unwrap();
        assert_eq!(b.status, WorkStatus::Done);
    }

    #[test]
    fn test_pending_keys_in_insertion_order() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Crawl, "https://example.com/z").unwrap();
        ledger.add_work(Stage::Crawl, "https://example.com/a").unwrap();
        ledger.add_work(Stage::Crawl, "https://example.com/m").unwrap();

        let keys = ledger.pending_keys(Stage::Crawl).unwrap();
        assert_eq!(
            keys,
            vec![
                "https://example.com/z",
                "https://example.com/a",
                "https://example.com/m"
            ]
        );
    }

    #[test]
    fn test_stage_counts() {
        let mut ledger = open_with_job();
        for key in ["a", "b", "c", "d"] {
            ledger.add_work(Stage::Crawl, key).unwrap();
        }
        ledger.claim(Stage::Crawl, "a").unwrap();
        ledger.mark_done(Stage::Crawl, "a").unwrap();
        ledger.claim(Stage::Crawl, "b").unwrap();
        ledger.mark_failed(Stage::Crawl, "b", "blocked").unwrap();
        ledger.claim(Stage::Crawl, "c").unwrap();

        let counts = ledger.stage_counts(Stage::Crawl).unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.in_progress, 1);
        assert_eq!(counts.done, 1);
        assert_eq!(counts.failed_terminal, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_total_done_spans_stages() {
        let mut ledger = open_with_job();
        ledger.add_work(Stage::Discovery, "kw").unwrap();
        ledger.claim(Stage::Discovery, "kw").unwrap();
        ledger.mark_done(Stage::Discovery, "kw").unwrap();

        ledger.add_work(Stage::Crawl, "url").unwrap();
        ledger.claim(Stage::Crawl, "url").unwrap();
        ledger.mark_done(Stage::Crawl, "url").unwrap();

        assert_eq!(ledger.total_done().unwrap(), 2);
    }

    #[test]
    fn test_domain_dedup() {
        let mut ledger = open_with_job();
        assert!(ledger.try_record_domain("example.com").unwrap());
        assert!(!ledger.try_record_domain("example.com").unwrap());
        assert!(ledger.try_record_domain("other.com").unwrap());

        ledger
            .set_domain_sitemap("example.com", Some("https://example.com/sitemap.xml"))
            .unwrap();

        let domains = ledger.known_domains().unwrap();
        assert_eq!(domains, vec!["example.com", "other.com"]);
    }

    #[test]
    fn test_no_active_job_errors() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        assert!(matches!(
            ledger.add_work(Stage::Crawl, "url"),
            Err(LedgerError::NoActiveJob)
        ));
    }

    #[test]
    fn test_complete_job_sets_finished() {
        let mut ledger = open_with_job();
        ledger.complete_job().unwrap();
        let job = ledger.current_job().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.finished_at.is_some());
    }
}
