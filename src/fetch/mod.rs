//! Rate-limited fetching through a rotating proxy pool
//!
//! This module contains the outbound HTTP machinery shared by every
//! network-bound stage:
//! - per-endpoint HTTP clients with proper user agent strings
//! - proxy rotation with exponential backoff on throttling signals
//! - outcome classification (success / rate-limited / blocked / network error)

mod client;
mod fetcher;
mod proxy;

pub use client::build_http_client;
pub use fetcher::{FetchKind, FetchOutcome, Fetcher};
pub use proxy::{ProxyLease, ProxyPool};
