//! Discovery stage: keywords to {domain, sitemap} pairs
//!
//! Each pending keyword is searched through the fetcher, result links are
//! resolved to registrable domains, and every domain new to this job gets
//! exactly one sitemap lookup. A keyword is done only once all of its
//! domains have had that lookup attempted — success or explicit absence —
//! so a resume never skips an unexplored domain.

use crate::fetch::{FetchKind, FetchOutcome};
use crate::ledger::{Ledger, Stage};
use crate::pipeline::JobContext;
use crate::sitemap::find_sitemap;
use crate::url::registrable_domain;
use crate::Result;
use scraper::{Html, Selector};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

pub async fn run(ctx: Arc<JobContext>) -> Result<()> {
    let pending = {
        let ledger = ctx.ledger.lock().unwrap();
        ledger.pending_keys(Stage::Discovery)?
    };

    if pending.is_empty() {
        tracing::info!("Discovery: nothing pending");
        return Ok(());
    }

    tracing::info!("Discovery: {} keyword(s) pending", pending.len());

    let semaphore = Arc::new(Semaphore::new(ctx.config.pools.discovery));
    let mut handles = Vec::new();

    for keyword in pending {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if let Err(e) = process_keyword(&ctx, &keyword).await {
                tracing::error!("Discovery failed for '{}': {}", keyword, e);
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Discovery worker panicked: {}", e);
        }
    }

    Ok(())
}

/// Searches one keyword and probes every newly seen domain for a sitemap
async fn process_keyword(ctx: &JobContext, keyword: &str) -> Result<()> {
    if ctx.is_cancelled() {
        return Ok(());
    }

    let claimed = {
        let mut ledger = ctx.ledger.lock().unwrap();
        ledger.claim(Stage::Discovery, keyword)?
    };
    if !claimed {
        return Ok(());
    }

    let search_url = build_search_url(&ctx.config.search.endpoint, keyword);

    loop {
        if ctx.is_cancelled() {
            let mut ledger = ctx.ledger.lock().unwrap();
            ledger.release(Stage::Discovery, keyword)?;
            return Ok(());
        }

        match ctx.fetcher.fetch(&search_url, FetchKind::Search).await {
            FetchOutcome::Success { body, .. } => {
                let results =
                    extract_result_links(&body, &search_url, ctx.config.search.result_limit);
                tracing::info!(
                    "Search for '{}' yielded {} candidate link(s)",
                    keyword,
                    results.len()
                );

                for result_url in results {
                    if ctx.is_cancelled() {
                        let mut ledger = ctx.ledger.lock().unwrap();
                        ledger.release(Stage::Discovery, keyword)?;
                        return Ok(());
                    }
                    probe_domain(ctx, &result_url).await?;
                }

                if ctx.is_cancelled() {
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.release(Stage::Discovery, keyword)?;
                    return Ok(());
                }

                let mut ledger = ctx.ledger.lock().unwrap();
                ledger.mark_done(Stage::Discovery, keyword)?;
                return Ok(());
            }

            FetchOutcome::Blocked => {
                tracing::warn!("Search blocked for '{}'", keyword);
                let mut ledger = ctx.ledger.lock().unwrap();
                ledger.mark_failed(Stage::Discovery, keyword, "blocked")?;
                return Ok(());
            }

            outcome => {
                let error = outcome.describe();
                let attempts = {
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.record_attempt(Stage::Discovery, keyword, &error)?
                };
                if attempts >= ctx.config.limits.max_attempts {
                    tracing::warn!(
                        "Keyword '{}' exhausted {} attempt(s): {}",
                        keyword,
                        attempts,
                        error
                    );
                    let mut ledger = ctx.ledger.lock().unwrap();
                    ledger.mark_failed(Stage::Discovery, keyword, &error)?;
                    return Ok(());
                }
                tracing::debug!(
                    "Search attempt {}/{} for '{}' failed: {}; retrying",
                    attempts,
                    ctx.config.limits.max_attempts,
                    keyword,
                    error
                );
            }
        }
    }
}

/// Runs the sitemap lookup for a result URL's domain if it is new
///
/// Expansion work is queued before the domain is recorded, so a crash
/// between the two leaves the domain unrecorded and the lookup repeats on
/// resume — a duplicate probe is harmless, a silently skipped domain is not.
async fn probe_domain(ctx: &JobContext, result_url: &Url) -> Result<()> {
    let Some(domain) = registrable_domain(result_url) else {
        return Ok(());
    };

    let already_known = {
        let ledger = ctx.ledger.lock().unwrap();
        ledger.known_domains()?.contains(&domain)
    };
    if already_known {
        return Ok(());
    }

    let origin = origin_of(result_url);
    let sitemap_url = find_sitemap(&ctx.fetcher, &origin).await;

    if let Some(sitemap_url) = &sitemap_url {
        let mut ledger = ctx.ledger.lock().unwrap();
        ledger.add_work(Stage::Expansion, sitemap_url)?;
    }

    let mut ledger = ctx.ledger.lock().unwrap();
    let recorded = ledger.try_record_domain(&domain)?;
    if recorded {
        ledger.set_domain_sitemap(&domain, sitemap_url.as_deref())?;
    }

    Ok(())
}

/// Substitutes the keyword into the search endpoint template
fn build_search_url(endpoint: &str, keyword: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    endpoint.replace("{query}", &encoded)
}

/// Pulls candidate result links out of a search results page
///
/// Keeps absolute http(s) links pointing away from the search engine
/// itself (same host and port), deduplicated in document order, up to the
/// result limit.
fn extract_result_links(body: &str, search_url: &str, limit: usize) -> Vec<Url> {
    let search_authority = Url::parse(search_url).ok().map(|u| authority_of(&u));

    let doc = Html::parse_document(body);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for element in doc.select(&selector) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(url) = Url::parse(href) else {
            continue;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }
        if Some(authority_of(&url)) == search_authority {
            continue;
        }
        if seen.insert(url.to_string()) {
            links.push(url);
        }
    }

    links
}

/// Host plus effective port, for telling the search engine's own links
/// apart from result links
fn authority_of(url: &Url) -> (String, Option<u16>) {
    (
        url.host_str().unwrap_or("").to_string(),
        url.port_or_known_default(),
    )
}

/// Origin of a URL: scheme://host[:port]
fn origin_of(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
        (Some(host), None) => format!("{}://{}", url.scheme(), host),
        _ => url.to_string(),
    }
}
