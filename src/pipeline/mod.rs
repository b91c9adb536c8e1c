//! Pipeline orchestration
//!
//! Runs the four stages in order — discovery, expansion, crawl,
//! enrichment — over a shared ledger. Each stage consumes the previous
//! stage's durable output, claims pending work items, and commits results
//! back to the ledger, so a job can be killed and resumed at any point.

mod crawl;
mod discovery;
mod enrich;
mod expansion;

use crate::chunk::Chunk;
use crate::config::Config;
use crate::fetch::{Fetcher, ProxyPool};
use crate::ledger::{Ledger, SqliteLedger, Stage};
use crate::notify::{JobEvent, Notifier};
use crate::report::JobReport;
use crate::sync::ArtifactSync;
use crate::{Result, TrawlError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Everything a job needs, shared across stage workers
pub struct JobContext {
    pub job_name: String,
    pub config: Arc<Config>,
    pub ledger: Arc<Mutex<SqliteLedger>>,
    pub fetcher: Arc<Fetcher>,
    pub paths: JobPaths,
    pub cancel: watch::Receiver<bool>,
    pub notifier: Arc<dyn Notifier>,
    pub artifact_sync: Arc<dyn ArtifactSync>,
}

impl JobContext {
    /// Checks the cancellation signal without waiting
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// User agent string for robots checks and logging
    pub fn user_agent(&self) -> String {
        self.config.user_agent.header_value()
    }
}

/// Filesystem layout for one job's output, namespaced by job name
#[derive(Debug, Clone)]
pub struct JobPaths {
    root: PathBuf,
}

impl JobPaths {
    pub fn new(output_root: &str, job_name: &str) -> Self {
        Self {
            root: Path::new(output_root).join(job_name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_db(&self) -> PathBuf {
        self.root.join("ledger.db")
    }

    /// Per-domain page URL lists from the expansion stage
    pub fn urls_dir(&self) -> PathBuf {
        self.root.join("urls")
    }

    pub fn url_file(&self, domain: &str) -> PathBuf {
        self.urls_dir().join(format!("{}.txt", domain))
    }

    /// Raw extracted content from the crawl stage
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn raw_file(&self, domain: &str, url: &str) -> PathBuf {
        self.raw_dir()
            .join(domain)
            .join(format!("{}.json", url_file_stem(url)))
    }

    /// Enriched documents
    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }

    pub fn doc_file(&self, domain: &str, url: &str) -> PathBuf {
        self.docs_dir()
            .join(domain)
            .join(format!("{}.json", url_file_stem(url)))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.root.clone(), self.urls_dir(), self.raw_dir(), self.docs_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Stable file stem for a URL (hex-truncated content hash)
pub fn url_file_stem(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Writes a file atomically: temp file in the same directory, then rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Raw page content persisted by the crawl stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub source_url: String,
    pub domain: String,
    pub title: Option<String>,
    /// RFC 3339 fetch timestamp; carried into the enriched document so
    /// re-enrichment stays byte-identical
    pub fetched_at: String,
    pub markdown: String,
}

/// Enriched document produced by the enrichment stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source_url: String,
    pub domain: String,
    pub chunks: Vec<Chunk>,
    pub metadata: BTreeMap<String, String>,
}

/// Identity of a job invocation
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub keywords: Vec<String>,
    pub keywords_hash: String,
    pub config_hash: String,
    pub fresh: bool,
}

/// Runs a complete job through all four stages
///
/// Opening an existing job resumes it: interrupted work items are reset to
/// pending and every stage picks up exactly the items that never finished.
/// A fully completed job runs through with zero fetches.
pub async fn run_job(
    spec: JobSpec,
    config: Arc<Config>,
    cancel: watch::Receiver<bool>,
    notifier: Arc<dyn Notifier>,
    artifact_sync: Arc<dyn ArtifactSync>,
) -> Result<JobReport> {
    let paths = JobPaths::new(&config.output.root, &spec.name);
    paths.ensure_dirs()?;

    let mut ledger = SqliteLedger::open(&paths.ledger_db())?;
    ledger.begin_job(
        &spec.name,
        &spec.keywords_hash,
        &spec.config_hash,
        spec.fresh,
    )?;

    // Crash recovery: anything left in-progress by a previous run goes back
    // to pending before any worker starts
    ledger.recover_interrupted()?;

    for keyword in &spec.keywords {
        ledger.add_work(Stage::Discovery, keyword)?;
    }

    let user_agent = config.user_agent.header_value();
    let pool = Arc::new(ProxyPool::new(&config.proxy, &user_agent).map_err(TrawlError::Config)?);
    let fetcher = Arc::new(Fetcher::new(pool, config.proxy.retry_ceiling));

    let ctx = Arc::new(JobContext {
        job_name: spec.name.clone(),
        config,
        ledger: Arc::new(Mutex::new(ledger)),
        fetcher,
        paths,
        cancel,
        notifier,
        artifact_sync,
    });

    ctx.notifier.notify(&JobEvent::JobStarted {
        job: spec.name.clone(),
    });

    let watchdog = tokio::spawn(stall_watchdog(ctx.clone()));

    let run_result = run_stages(&ctx).await;
    if let Err(e) = &run_result {
        ctx.notifier.notify(&JobEvent::JobError {
            job: spec.name.clone(),
            message: e.to_string(),
        });
    }

    watchdog.abort();

    let report = {
        let ledger = ctx.ledger.lock().unwrap();
        JobReport::from_ledger(&spec.name, &*ledger)?
    };

    {
        let mut ledger = ctx.ledger.lock().unwrap();
        if ctx.is_cancelled() || run_result.is_err() || !report.is_settled() {
            ledger.interrupt_job()?;
        } else {
            ledger.complete_job()?;
        }
    }

    ctx.notifier.notify(&JobEvent::JobFinished {
        job: spec.name.clone(),
        done: report.total_done(),
        failed: report.total_failed(),
    });

    run_result.map(|_| report)
}

/// Runs the stages in order, stopping early on cancellation
async fn run_stages(ctx: &Arc<JobContext>) -> Result<()> {
    if ctx.is_cancelled() {
        return Ok(());
    }
    discovery::run(ctx.clone()).await?;
    after_stage(ctx, Stage::Discovery);

    if ctx.is_cancelled() {
        return Ok(());
    }
    expansion::run(ctx.clone()).await?;
    after_stage(ctx, Stage::Expansion);

    if ctx.is_cancelled() {
        return Ok(());
    }
    crawl::run(ctx.clone()).await?;
    after_stage(ctx, Stage::Crawl);

    if ctx.is_cancelled() {
        return Ok(());
    }
    enrich::run(ctx.clone()).await?;
    after_stage(ctx, Stage::Enrichment);

    Ok(())
}

/// Notifies stage completion and mirrors the output directory, best effort
fn after_stage(ctx: &JobContext, stage: Stage) {
    let counts = {
        let ledger = ctx.ledger.lock().unwrap();
        ledger.stage_counts(stage)
    };

    match counts {
        Ok(counts) => {
            tracing::info!(
                "Stage {} settled: {} done, {} failed",
                stage,
                counts.done,
                counts.failed_terminal
            );
            ctx.notifier.notify(&JobEvent::StageCompleted {
                job: ctx.job_name.clone(),
                stage,
                counts,
            });
        }
        Err(e) => tracing::warn!("Could not read {} counts: {}", stage, e),
    }

    if let Err(e) = ctx.artifact_sync.sync(ctx.paths.root()) {
        tracing::warn!("Artifact sync failed (continuing): {}", e);
    }
}

/// Watches ledger progress and reports a stalled job instead of hanging
///
/// Compares total done counts across the configured window; no movement
/// while work is still pending raises a stalled-job event. The watchdog
/// never kills the job.
async fn stall_watchdog(ctx: Arc<JobContext>) {
    let window = Duration::from_secs(ctx.config.limits.stall_window_secs);
    let mut last_done: Option<u64> = None;

    loop {
        tokio::time::sleep(window).await;

        let progress = {
            let ledger = ctx.ledger.lock().unwrap();
            let done = ledger.total_done();
            let pending = Stage::all_stages()
                .iter()
                .map(|s| ledger.stage_counts(*s).map(|c| c.pending + c.in_progress))
                .sum::<std::result::Result<u64, _>>();
            (done, pending)
        };

        let (Ok(done), Ok(pending)) = progress else {
            continue;
        };

        if Some(done) == last_done && pending > 0 {
            ctx.notifier.notify(&JobEvent::JobStalled {
                job: ctx.job_name.clone(),
                pending,
            });
        }
        last_done = Some(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_file_stem_is_stable() {
        let a = url_file_stem("https://example.com/page");
        let b = url_file_stem("https://example.com/page");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let c = url_file_stem("https://example.com/other");
        assert_ne!(a, c);
    }

    #[test]
    fn test_job_paths_layout() {
        let paths = JobPaths::new("/data", "acme");
        assert_eq!(paths.ledger_db(), PathBuf::from("/data/acme/ledger.db"));
        assert_eq!(
            paths.url_file("example.com"),
            PathBuf::from("/data/acme/urls/example.com.txt")
        );
        assert!(paths
            .raw_file("example.com", "https://example.com/p")
            .starts_with("/data/acme/raw/example.com"));
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deep/file.json");
        write_atomic(&target, b"{}").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
        // No temp file left behind
        assert!(!target.with_extension("tmp").exists());
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.json");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
    }
}
