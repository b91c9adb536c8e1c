//! Sitemap lookup and parsing
//!
//! Discovery probes conventional sitemap locations (robots.txt `Sitemap:`
//! directives as fallback); expansion parses the XML, including
//! sitemap-of-sitemaps indexes, via the `sitemap` crate. Plain-text
//! sitemaps are parsed line-wise.

use crate::fetch::{FetchKind, FetchOutcome, Fetcher};
use crate::robots::RobotsPolicy;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use std::io::Cursor;

/// Conventional sitemap paths probed per domain, in order
const CONVENTIONAL_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap.txt"];

/// One parsed sitemap document
///
/// A `<urlset>` yields page URLs; a `<sitemapindex>` yields child sitemaps.
/// Both lists are kept because malformed documents in the wild mix them.
#[derive(Debug, Default)]
pub struct ParsedSitemap {
    pub page_urls: Vec<String>,
    pub child_sitemaps: Vec<String>,
}

impl ParsedSitemap {
    pub fn is_empty(&self) -> bool {
        self.page_urls.is_empty() && self.child_sitemaps.is_empty()
    }
}

/// Looks for a sitemap on the given origin ("https://example.com")
///
/// Probes the conventional paths first, then falls back to `Sitemap:`
/// directives in robots.txt. Returns the first URL whose body looks like a
/// sitemap, or None when the domain has no discoverable sitemap.
pub async fn find_sitemap(fetcher: &Fetcher, origin: &str) -> Option<String> {
    for path in CONVENTIONAL_PATHS {
        let candidate = format!("{}{}", origin, path);
        if let FetchOutcome::Success { body, .. } =
            fetcher.fetch(&candidate, FetchKind::Sitemap).await
        {
            if is_sitemap_body(&body, &candidate) {
                tracing::info!("Found sitemap at {}", candidate);
                return Some(candidate);
            }
        }
    }

    let robots_url = format!("{}/robots.txt", origin);
    if let FetchOutcome::Success { body, .. } = fetcher.fetch(&robots_url, FetchKind::Robots).await
    {
        for candidate in RobotsPolicy::from_content(&body).sitemap_urls() {
            if let FetchOutcome::Success { body, .. } =
                fetcher.fetch(&candidate, FetchKind::Sitemap).await
            {
                if is_sitemap_body(&body, &candidate) {
                    tracing::info!("Found sitemap via robots.txt: {}", candidate);
                    return Some(candidate);
                }
            }
        }
    }

    tracing::debug!("No sitemap found for {}", origin);
    None
}

/// Checks whether a response body is plausibly a sitemap
pub fn is_sitemap_body(body: &str, url: &str) -> bool {
    if url.ends_with(".txt") {
        return body.lines().any(|line| line.trim().starts_with("http"));
    }
    let lower = body.to_lowercase();
    lower.contains("<urlset") || lower.contains("<sitemapindex")
}

/// Parses a fetched sitemap document into page URLs and child sitemaps
pub fn parse_sitemap(body: &str, source_url: &str) -> ParsedSitemap {
    if source_url.ends_with(".txt") {
        return ParsedSitemap {
            page_urls: body
                .lines()
                .map(str::trim)
                .filter(|line| line.starts_with("http"))
                .map(str::to_string)
                .collect(),
            child_sitemaps: Vec::new(),
        };
    }

    let mut parsed = ParsedSitemap::default();
    let cursor = Cursor::new(body.as_bytes());

    for entity in SiteMapReader::new(cursor) {
        match entity {
            SiteMapEntity::Url(url_entry) => {
                if let Some(loc) = url_entry.loc.get_url() {
                    parsed.page_urls.push(loc.to_string());
                }
            }
            SiteMapEntity::SiteMap(sitemap_entry) => {
                if let Some(loc) = sitemap_entry.loc.get_url() {
                    parsed.child_sitemaps.push(loc.to_string());
                }
            }
            SiteMapEntity::Err(error) => {
                tracing::warn!("Error parsing sitemap entity in {}: {}", source_url, error);
            }
        }
    }

    parsed
}
