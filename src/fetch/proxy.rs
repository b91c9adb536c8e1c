//! Rotating proxy pool with per-endpoint exponential backoff
//!
//! The pool is the one piece of state shared by every concurrent fetch.
//! Each endpoint carries a cooldown deadline and a consecutive-failure
//! counter; both are only mutated under the pool lock, so two workers
//! observing the same throttling response cannot double an endpoint's
//! backoff independently.

use crate::config::ProxyConfig;
use crate::fetch::client::build_http_client;
use crate::ConfigError;
use reqwest::Client;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Exponent cap keeping `base * 2^failures` inside u32 multiplication
const MAX_BACKOFF_EXPONENT: u32 = 16;

struct EndpointState {
    /// Short label for logs; never the credentialed URL
    label: String,
    client: Client,
    cooldown_until: Instant,
    consecutive_failures: u32,
}

/// A leased endpoint: the index to report results against plus a handle to
/// its client (cloning a reqwest Client is cheap)
pub struct ProxyLease {
    pub index: usize,
    pub client: Client,
}

/// Pool of proxy endpoints rotated by cooldown eligibility
///
/// With no endpoints configured the pool holds a single direct slot, so
/// backoff still applies to proxyless operation.
pub struct ProxyPool {
    endpoints: Mutex<Vec<EndpointState>>,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_eligibility_wait: Duration,
}

impl ProxyPool {
    /// Builds the pool, creating one HTTP client per endpoint
    pub fn new(config: &ProxyConfig, user_agent: &str) -> Result<Self, ConfigError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let now = Instant::now();
        let mut endpoints = Vec::new();

        if config.endpoints.is_empty() {
            let client = build_http_client(user_agent, timeout, None)
                .map_err(|e| ConfigError::InvalidProxy(format!("direct client: {}", e)))?;
            endpoints.push(EndpointState {
                label: "direct".to_string(),
                client,
                cooldown_until: now,
                consecutive_failures: 0,
            });
        } else {
            for (i, endpoint) in config.endpoints.iter().enumerate() {
                let client = build_http_client(user_agent, timeout, Some(endpoint))
                    .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", endpoint, e)))?;
                endpoints.push(EndpointState {
                    label: format!("proxy-{}", i),
                    client,
                    cooldown_until: now,
                    consecutive_failures: 0,
                });
            }
        }

        Ok(Self {
            endpoints: Mutex::new(endpoints),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_cap: Duration::from_millis(config.backoff_cap_ms),
            max_eligibility_wait: Duration::from_millis(config.max_eligibility_wait_ms),
        })
    }

    /// Number of endpoints in the pool
    pub fn len(&self) -> usize {
        self.endpoints.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leases the endpoint with the earliest cooldown deadline
    ///
    /// If every endpoint is cooling down, waits until the earliest becomes
    /// eligible, bounded by the configured maximum wait. Returns None when
    /// the bound is exceeded; the caller reports that as rate-limited.
    pub async fn lease(&self) -> Option<ProxyLease> {
        let deadline = Instant::now() + self.max_eligibility_wait;

        loop {
            let wait = {
                let endpoints = self.endpoints.lock().unwrap();
                let now = Instant::now();

                let (index, soonest) = endpoints
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, ep)| ep.cooldown_until)
                    .map(|(i, ep)| (i, ep.cooldown_until))?;

                if soonest <= now {
                    tracing::trace!("Leasing endpoint {}", endpoints[index].label);
                    return Some(ProxyLease {
                        index,
                        client: endpoints[index].client.clone(),
                    });
                }

                soonest - now
            };

            if Instant::now() + wait > deadline {
                tracing::warn!(
                    "No proxy eligible within {:?}; treating as rate limited",
                    self.max_eligibility_wait
                );
                return None;
            }

            tokio::time::sleep(wait).await;
        }
    }

    /// Records a throttling response against an endpoint
    ///
    /// Sets `cooldown_until = now + base * 2^failures`, capped, and bumps
    /// the failure counter. Returns the cooldown applied (for logging and
    /// tests).
    pub fn report_throttled(&self, index: usize) -> Duration {
        let mut endpoints = self.endpoints.lock().unwrap();
        let Some(endpoint) = endpoints.get_mut(index) else {
            return Duration::ZERO;
        };

        let exponent = endpoint.consecutive_failures.min(MAX_BACKOFF_EXPONENT);
        let cooldown = self
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_cap);

        endpoint.cooldown_until = Instant::now() + cooldown;
        endpoint.consecutive_failures += 1;

        tracing::debug!(
            "Endpoint {} throttled ({} consecutive), cooling down {:?}",
            endpoint.label,
            endpoint.consecutive_failures,
            cooldown
        );

        cooldown
    }

    /// Records a successful request, clearing the failure streak
    pub fn report_success(&self, index: usize) {
        let mut endpoints = self.endpoints.lock().unwrap();
        if let Some(endpoint) = endpoints.get_mut(index) {
            endpoint.consecutive_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(endpoints: Vec<String>, base_ms: u64, cap_ms: u64) -> ProxyPool {
        let config = ProxyConfig {
            endpoints,
            backoff_base_ms: base_ms,
            backoff_cap_ms: cap_ms,
            max_eligibility_wait_ms: 50,
            request_timeout_ms: 5000,
            retry_ceiling: 3,
        };
        ProxyPool::new(&config, "TestBot/1.0").unwrap()
    }

    #[test]
    fn test_empty_endpoints_yield_direct_slot() {
        let pool = test_pool(vec![], 100, 1000);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_multiple_endpoints() {
        let pool = test_pool(
            vec![
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:8081".to_string(),
            ],
            100,
            1000,
        );
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let pool = test_pool(vec![], 100, 1000);

        let mut previous = Duration::ZERO;
        for _ in 0..8 {
            let cooldown = pool.report_throttled(0);
            assert!(
                cooldown >= previous,
                "cooldown {:?} shrank below {:?}",
                cooldown,
                previous
            );
            assert!(cooldown <= Duration::from_millis(1000));
            previous = cooldown;
        }

        // After enough doublings the cap holds exactly
        assert_eq!(previous, Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let pool = test_pool(vec![], 100, 100_000);

        assert_eq!(pool.report_throttled(0), Duration::from_millis(100));
        assert_eq!(pool.report_throttled(0), Duration::from_millis(200));
        assert_eq!(pool.report_throttled(0), Duration::from_millis(400));
        assert_eq!(pool.report_throttled(0), Duration::from_millis(800));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let pool = test_pool(vec![], 100, 100_000);

        pool.report_throttled(0);
        pool.report_throttled(0);
        pool.report_success(0);

        // Streak cleared: next throttle starts from the base again
        assert_eq!(pool.report_throttled(0), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_lease_prefers_eligible_endpoint() {
        let pool = test_pool(
            vec![
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:8081".to_string(),
            ],
            10_000,
            100_000,
        );

        // Cool down endpoint 0; the lease must pick endpoint 1
        pool.report_throttled(0);
        let lease = pool.lease().await.unwrap();
        assert_eq!(lease.index, 1);
    }

    #[tokio::test]
    async fn test_lease_gives_up_when_all_cooling() {
        let pool = test_pool(vec![], 10_000, 100_000);

        pool.report_throttled(0);
        // Max eligibility wait is 50ms; a 10s cooldown cannot be outwaited
        assert!(pool.lease().await.is_none());
    }

    #[tokio::test]
    async fn test_lease_waits_for_short_cooldown() {
        let pool = test_pool(vec![], 10, 1000);

        pool.report_throttled(0);
        // 10ms cooldown fits inside the 50ms eligibility window
        assert!(pool.lease().await.is_some());
    }
}
