//! URL expansion stage: sitemaps to domain-partitioned page URL lists
//!
//! Walks each pending sitemap, following sitemap-index nesting up to the
//! configured depth bound with a visited set guarding cycles. Page URLs
//! are normalized, deduplicated per domain, written to per-domain files
//! (merge-on-resume keeps existing lines untouched), and queued as crawl
//! work in the order they were discovered.

use crate::fetch::{FetchKind, FetchOutcome};
use crate::ledger::{Ledger, Stage};
use crate::pipeline::{write_atomic, JobContext};
use crate::sitemap::parse_sitemap;
use crate::url::{normalize_url, registrable_domain};
use crate::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub async fn run(ctx: Arc<JobContext>) -> Result<()> {
    let pending = {
        let ledger = ctx.ledger.lock().unwrap();
        ledger.pending_keys(Stage::Expansion)?
    };

    if pending.is_empty() {
        tracing::info!("Expansion: nothing pending");
        return Ok(());
    }

    tracing::info!("Expansion: {} sitemap(s) pending", pending.len());

    let semaphore = Arc::new(Semaphore::new(ctx.config.pools.expansion));
    let mut handles = Vec::new();

    for sitemap_url in pending {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if let Err(e) = process_sitemap(&ctx, &sitemap_url).await {
                tracing::error!("Expansion failed for {}: {}", sitemap_url, e);
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Expansion worker panicked: {}", e);
        }
    }

    Ok(())
}

/// Result of walking one sitemap tree
struct Walk {
    /// Normalized page URLs in discovery order, deduplicated
    page_urls: Vec<String>,
    /// Failures on nested branches (bad fetch, depth bound); the walk
    /// itself still counts as completed
    branch_errors: Vec<String>,
}

async fn process_sitemap(ctx: &JobContext, sitemap_url: &str) -> Result<()> {
    if ctx.is_cancelled() {
        return Ok(());
    }

    let claimed = {
        let mut ledger = ctx.ledger.lock().unwrap();
        ledger.claim(Stage::Expansion, sitemap_url)?
    };
    if !claimed {
        return Ok(());
    }

    loop {
        if ctx.is_cancelled() {
            let mut ledger = ctx.ledger.lock().unwrap();
            ledger.release(Stage::Expansion, sitemap_url)?;
            return Ok(());
        }

        // The root fetch gets the retry treatment; nested sitemaps are
        // branch failures handled inside the walk
        match ctx.fetcher.fetch(sitemap_url, FetchKind::Sitemap).await {
            FetchOutcome::Success { body, .. } => {
                let walk = walk_sitemap(ctx, sitemap_url, &body).await;
                return commit_walk(ctx, sitemap_url, walk);
            }

            FetchOutcome::Blocked => {
                let mut ledger = ctx.ledger.lock().unwrap();
                ledger.mark_failed(Stage::Expansion, sitemap_url, "blocked")?;
                return Ok(());
            }

            outcome => {
                let error = outcome.describe();
                let attempts = {
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.record_attempt(Stage::Expansion, sitemap_url, &error)?
                };
                if attempts >= ctx.config.limits.max_attempts {
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.mark_failed(Stage::Expansion, sitemap_url, &error)?;
                    return Ok(());
                }
            }
        }
    }
}

/// Walks a sitemap tree breadth-first from an already fetched root
async fn walk_sitemap(ctx: &JobContext, root_url: &str, root_body: &str) -> Walk {
    let max_depth = ctx.config.limits.sitemap_max_depth;
    let mut page_urls = Vec::new();
    let mut seen_pages = HashSet::new();
    let mut visited = HashSet::new();
    let mut branch_errors = Vec::new();

    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    visited.insert(root_url.to_string());

    let root = parse_sitemap(root_body, root_url);
    collect_pages(&root.page_urls, &mut page_urls, &mut seen_pages);
    for child in root.child_sitemaps {
        queue.push_back((child, 2));
    }

    while let Some((child_url, depth)) = queue.pop_front() {
        if ctx.is_cancelled() {
            break;
        }

        if !visited.insert(child_url.clone()) {
            continue;
        }

        if depth > max_depth {
            branch_errors.push(format!(
                "{}: recursion bound of {} exceeded",
                child_url, max_depth
            ));
            continue;
        }

        match ctx.fetcher.fetch(&child_url, FetchKind::Sitemap).await {
            FetchOutcome::Success { body, .. } => {
                let parsed = parse_sitemap(&body, &child_url);
                collect_pages(&parsed.page_urls, &mut page_urls, &mut seen_pages);
                for grandchild in parsed.child_sitemaps {
                    queue.push_back((grandchild, depth + 1));
                }
            }
            outcome => {
                branch_errors.push(format!("{}: {}", child_url, outcome.describe()));
            }
        }
    }

    Walk {
        page_urls,
        branch_errors,
    }
}

/// Normalizes and appends page URLs, keeping first-seen order
fn collect_pages(raw: &[String], out: &mut Vec<String>, seen: &mut HashSet<String>) {
    for candidate in raw {
        match normalize_url(candidate) {
            Ok(url) => {
                let normalized = url.to_string();
                if seen.insert(normalized.clone()) {
                    out.push(normalized);
                }
            }
            Err(e) => tracing::debug!("Skipping unusable sitemap URL {}: {}", candidate, e),
        }
    }
}

/// Writes per-domain URL files and queues crawl work, then commits
fn commit_walk(ctx: &JobContext, sitemap_url: &str, walk: Walk) -> Result<()> {
    if ctx.is_cancelled() {
        let mut ledger = ctx.ledger.lock().unwrap();
        ledger.release(Stage::Expansion, sitemap_url)?;
        return Ok(());
    }

    // Partition by registrable domain, preserving discovery order
    let mut domain_order = Vec::new();
    let mut by_domain: HashMap<String, Vec<String>> = HashMap::new();
    for page_url in &walk.page_urls {
        let Some(domain) = crate::url::domain_of(page_url) else {
            continue;
        };
        if !by_domain.contains_key(&domain) {
            domain_order.push(domain.clone());
        }
        by_domain.entry(domain).or_default().push(page_url.clone());
    }

    for domain in &domain_order {
        let urls = &by_domain[domain];
        let new_count = merge_url_file(&ctx.paths.url_file(domain), urls)?;
        tracing::info!(
            "Domain {}: {} URL(s) from {} ({} new)",
            domain,
            urls.len(),
            sitemap_url,
            new_count
        );

        let mut ledger = ctx.ledger.lock().unwrap();
        for url in urls {
            ledger.add_work(Stage::Crawl, url)?;
        }
    }

    {
        let mut ledger = ctx.ledger.lock().unwrap();

        if ctx.is_cancelled() {
            ledger.release(Stage::Expansion, sitemap_url)?;
            return Ok(());
        }

        if !walk.branch_errors.is_empty() {
            // Branch failures are terminal for their branches only; the
            // sitemap item completes, with the errors visible in the ledger
            let summary = walk.branch_errors.join("; ");
            tracing::warn!("Sitemap {} had branch failures: {}", sitemap_url, summary);
            ledger.record_attempt(Stage::Expansion, sitemap_url, &summary)?;
        }

        ledger.mark_done(Stage::Expansion, sitemap_url)?;
    }

    Ok(())
}

/// Merges new URLs into a domain file: existing lines stay untouched,
/// genuinely new URLs are appended, and the whole file is replaced
/// atomically. Returns the number of appended URLs.
fn merge_url_file(path: &Path, urls: &[String]) -> std::io::Result<usize> {
    let existing: Vec<String> = match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };

    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    let mut merged = existing;
    let mut appended = 0;

    for url in urls {
        if seen.insert(url.clone()) {
            merged.push(url.clone());
            appended += 1;
        }
    }

    let mut contents = merged.join("\n");
    contents.push('\n');
    write_atomic(path, contents.as_bytes())?;

    Ok(appended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_merge_url_file_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("example.com.txt");

        let urls = vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
        ];
        let appended = merge_url_file(&path, &urls).unwrap();
        assert_eq!(appended, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "https://example.com/a\nhttps://example.com/b\n");
    }

    #[test]
    fn test_merge_url_file_preserves_existing_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("example.com.txt");

        merge_url_file(
            &path,
            &["https://example.com/a".to_string(), "https://example.com/b".to_string()],
        )
        .unwrap();

        // Rerun with an overlap plus one new URL
        let appended = merge_url_file(
            &path,
            &["https://example.com/b".to_string(), "https://example.com/c".to_string()],
        )
        .unwrap();
        assert_eq!(appended, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "https://example.com/a\nhttps://example.com/b\nhttps://example.com/c\n"
        );
    }

    #[test]
    fn test_merge_url_file_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("example.com.txt");
        let urls = vec!["https://example.com/a".to_string()];

        merge_url_file(&path, &urls).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let appended = merge_url_file(&path, &urls).unwrap();
        assert_eq!(appended, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_collect_pages_normalizes_and_dedups() {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        collect_pages(
            &[
                "https://www.example.com/a/".to_string(),
                "https://example.com/a".to_string(),
                "not a url".to_string(),
                "https://example.com/b#frag".to_string(),
            ],
            &mut out,
            &mut seen,
        );

        assert_eq!(out, vec!["https://example.com/a", "https://example.com/b"]);
    }
}
