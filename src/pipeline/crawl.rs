//! Crawl stage: page URLs to raw extracted content
//!
//! A fixed-size worker pool pulls pending page URLs. Domains are processed
//! independently of each other, but within one domain URLs run serially in
//! discovery order so output is reproducible across resumes. Content is
//! durably written before the ledger commit (write-then-commit): a crash
//! between fetch and write leaves the item pending, never falsely done.

use crate::extract::extract_content;
use crate::fetch::{FetchKind, FetchOutcome};
use crate::ledger::{Ledger, Stage};
use crate::pipeline::{write_atomic, JobContext, RawDocument};
use crate::robots::RobotsCache;
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

pub async fn run(ctx: Arc<JobContext>) -> Result<()> {
    let pending = {
        let ledger = ctx.ledger.lock().unwrap();
        ledger.pending_keys(Stage::Crawl)?
    };

    if pending.is_empty() {
        tracing::info!("Crawl: nothing pending");
        return Ok(());
    }

    // Group by domain, preserving discovery order inside each group
    let mut domain_order = Vec::new();
    let mut by_domain: HashMap<String, Vec<String>> = HashMap::new();
    for url in pending {
        let domain = crate::url::domain_of(&url).unwrap_or_else(|| "unknown".to_string());
        if !by_domain.contains_key(&domain) {
            domain_order.push(domain.clone());
        }
        by_domain.entry(domain).or_default().push(url);
    }

    tracing::info!(
        "Crawl: {} URL(s) pending across {} domain(s)",
        by_domain.values().map(Vec::len).sum::<usize>(),
        by_domain.len()
    );

    let semaphore = Arc::new(Semaphore::new(ctx.config.pools.crawl));
    let robots = Arc::new(RobotsCache::new());
    let mut handles = Vec::new();

    // One task per domain keeps per-domain ordering; the semaphore bounds
    // how many fetches are in flight across all domains
    for domain in domain_order {
        let urls = by_domain.remove(&domain).unwrap_or_default();
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        let robots = robots.clone();

        handles.push(tokio::spawn(async move {
            for url in urls {
                if ctx.is_cancelled() {
                    return;
                }
                let Ok(_permit) = semaphore.clone().acquire_owned().await else {
                    return;
                };
                if let Err(e) = process_page(&ctx, &robots, &url).await {
                    tracing::error!("Crawl failed for {}: {}", url, e);
                }
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Crawl worker panicked: {}", e);
        }
    }

    Ok(())
}

/// Fetches, extracts, and persists one page
async fn process_page(ctx: &JobContext, robots: &RobotsCache, url_str: &str) -> Result<()> {
    let claimed = {
        let mut ledger = ctx.ledger.lock().unwrap();
        ledger.claim(Stage::Crawl, url_str)?
    };
    if !claimed {
        return Ok(());
    }

    let url = match Url::parse(url_str) {
        Ok(url) => url,
        Err(e) => {
            let mut ledger = ctx.ledger.lock().unwrap();
            ledger.mark_failed(Stage::Crawl, url_str, &format!("invalid URL: {}", e))?;
            return Ok(());
        }
    };

    let policy = robots.policy_for(&ctx.fetcher, &url).await;
    if !policy.is_allowed(url_str, &ctx.user_agent()) {
        tracing::info!("Skipping {} (disallowed by robots.txt)", url_str);
        let mut ledger = ctx.ledger.lock().unwrap();
        ledger.mark_failed(Stage::Crawl, url_str, "disallowed by robots.txt")?;
        return Ok(());
    }

    loop {
        if ctx.is_cancelled() {
            let mut ledger = ctx.ledger.lock().unwrap();
            ledger.release(Stage::Crawl, url_str)?;
            return Ok(());
        }

        let mut cancel = ctx.cancel.clone();
        let outcome = tokio::select! {
            outcome = ctx.fetcher.fetch(url_str, FetchKind::Page) => outcome,
            _ = cancel.changed() => {
                // In-flight fetch aborted; the item stays pending for the
                // next run
                let mut ledger = ctx.ledger.lock().unwrap();
                ledger.release(Stage::Crawl, url_str)?;
                return Ok(());
            }
        };

        match outcome {
            FetchOutcome::Success { body, .. } => {
                let domain =
                    crate::url::registrable_domain(&url).unwrap_or_else(|| "unknown".to_string());

                let raw = match extract_content(&body, url_str) {
                    Ok(content) => RawDocument {
                        source_url: url_str.to_string(),
                        domain: domain.clone(),
                        title: content.title,
                        fetched_at: Utc::now().to_rfc3339(),
                        markdown: content.markdown,
                    },
                    Err(e) => {
                        let mut ledger = ctx.ledger.lock().unwrap();
                        ledger.mark_failed(Stage::Crawl, url_str, &e.to_string())?;
                        return Ok(());
                    }
                };

                // Durable write happens before the ledger commit
                let raw_path = ctx.paths.raw_file(&domain, url_str);
                write_atomic(&raw_path, &serde_json::to_vec_pretty(&raw)?)?;

                let mut ledger = ctx.ledger.lock().unwrap();

                // Cancellation check sits before the commit: a completed
                // network call does not get marked done after cancel
                if ctx.is_cancelled() {
                    ledger.release(Stage::Crawl, url_str)?;
                    return Ok(());
                }

                ledger.add_work(Stage::Enrichment, url_str)?;
                ledger.mark_done(Stage::Crawl, url_str)?;
                tracing::debug!("Crawled {}", url_str);
                return Ok(());
            }

            FetchOutcome::Blocked => {
                let mut ledger = ctx.ledger.lock().unwrap();
                ledger.mark_failed(Stage::Crawl, url_str, "blocked")?;
                return Ok(());
            }

            outcome => {
                let error = outcome.describe();
                let attempts = {
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.record_attempt(Stage::Crawl, url_str, &error)?
                };
                if attempts >= ctx.config.limits.max_attempts {
                    tracing::warn!(
                        "Page {} exhausted {} attempt(s): {}",
                        url_str,
                        attempts,
                        error
                    );
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.mark_failed(Stage::Crawl, url_str, &error)?;
                    return Ok(());
                }
                tracing::debug!(
                    "Crawl attempt {}/{} for {} failed: {}; retrying",
                    attempts,
                    ctx.config.limits.max_attempts,
                    url_str,
                    error
                );
            }
        }
    }
}
