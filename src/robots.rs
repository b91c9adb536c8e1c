//! Robots.txt handling
//!
//! Fetches and caches robots.txt per domain for the crawl stage, and
//! extracts `Sitemap:` directives for discovery's fallback lookup.

use crate::fetch::{FetchKind, FetchOutcome, Fetcher};
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Robots policy for one domain
///
/// A thin wrapper over the raw robots.txt content; matching is done
/// on demand with the robotstxt crate. Missing or unreachable robots.txt
/// degrades to allow-all.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    content: String,
    allow_all: bool,
}

impl RobotsPolicy {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Permissive policy used when robots.txt cannot be fetched
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks whether a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Extracts `Sitemap:` directive URLs from the robots.txt content
    pub fn sitemap_urls(&self) -> Vec<String> {
        self.content
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                let (key, value) = trimmed.split_once(':')?;
                if key.trim().eq_ignore_ascii_case("sitemap") {
                    let url = value.trim();
                    if !url.is_empty() {
                        return Some(url.to_string());
                    }
                }
                None
            })
            .collect()
    }
}

/// Per-domain robots.txt cache shared by crawl workers
pub struct RobotsCache {
    policies: Mutex<HashMap<String, Arc<RobotsPolicy>>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self {
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Gets the cached policy for a URL's origin, fetching it on first use
    pub async fn policy_for(&self, fetcher: &Fetcher, url: &Url) -> Arc<RobotsPolicy> {
        let origin = match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            },
            None => return Arc::new(RobotsPolicy::allow_all()),
        };

        {
            let policies = self.policies.lock().await;
            if let Some(policy) = policies.get(&origin) {
                return policy.clone();
            }
        }

        let robots_url = format!("{}/robots.txt", origin);
        let policy = match fetcher.fetch(&robots_url, FetchKind::Robots).await {
            FetchOutcome::Success { body, .. } => Arc::new(RobotsPolicy::from_content(&body)),
            other => {
                tracing::debug!(
                    "robots.txt unavailable for {} ({}); allowing all",
                    origin,
                    other.describe()
                );
                Arc::new(RobotsPolicy::allow_all())
            }
        };

        let mut policies = self.policies.lock().await;
        policies.entry(origin).or_insert_with(|| policy.clone());
        policy
    }
}

impl Default for RobotsCache {
    fn default() -> Self {
        Self::new()
    }
}
