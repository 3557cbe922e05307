//! Adaptive per-domain rate limiter.
//!
//! Government boards throttle or ban aggressive clients, so every request
//! goes through here. Backs off on 429/503, gradually recovers on success.

mod config;
mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub use config::{DomainStats, RateLimitConfig};
use domain_state::DomainState;

/// Adaptive rate limiter that tracks per-domain request timing.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default config.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config.
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Extract domain from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait until the domain is ready, then mark request as started.
    ///
    /// The slot is reserved under the write lock so concurrent thread
    /// dispatches to one board still queue up behind each other.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let wait_time = {
            let mut domains = self.domains.write().await;
            let state = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.base_delay));
            let wait = state.time_until_ready();
            state.last_request = Some(Instant::now() + wait);
            state.total_requests += 1;
            wait
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        Some(domain)
    }

    /// Feed a response status back into the domain's pacing.
    pub async fn report_status(&self, domain: &str, status_code: u16) {
        match status_code {
            429 | 503 => self.report_rate_limit(domain, status_code).await,
            500..=599 => self.report_server_error(domain).await,
            200..=399 => self.report_success(domain).await,
            _ => debug!("HTTP {} from {}, delay unchanged", status_code, domain),
        }
    }

    /// Report a successful request - may decrease delay.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;

            // Recover from backoff after threshold successes
            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                let new_delay = Duration::from_secs_f64(
                    state.current_delay.as_secs_f64() * self.config.recovery_multiplier,
                );
                state.current_delay = new_delay.max(self.config.min_delay);

                if state.current_delay <= self.config.base_delay {
                    state.in_backoff = false;
                    state.current_delay = self.config.base_delay;
                    info!("Domain {} recovered from rate limit backoff", domain);
                } else {
                    debug!(
                        "Domain {} delay reduced to {:?}",
                        domain, state.current_delay
                    );
                }

                state.consecutive_successes = 0;
            }
        }
    }

    /// Report a definite rate limit hit (429 or 503) - increases delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;

            let new_delay = Duration::from_secs_f64(
                state.current_delay.as_secs_f64() * self.config.backoff_multiplier,
            );
            state.current_delay = new_delay.min(self.config.max_delay);

            warn!(
                "Rate limited by {} (HTTP {}), backing off to {:?}",
                domain, status_code, state.current_delay
            );
        }
    }

    /// Report a server error (5xx other than 503) - mild backoff.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            let new_delay = Duration::from_secs_f64(state.current_delay.as_secs_f64() * 1.5);
            state.current_delay = new_delay.min(self.config.max_delay);
            state.consecutive_successes = 0;
            debug!(
                "Server error for {}, delay increased to {:?}",
                domain, state.current_delay
            );
        }
    }

    /// Get statistics for all domains.
    pub async fn get_stats(&self) -> HashMap<String, DomainStats> {
        let domains = self.domains.read().await;
        domains
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    DomainStats {
                        current_delay: v.current_delay,
                        in_backoff: v.in_backoff,
                        total_requests: v.total_requests,
                        rate_limit_hits: v.rate_limit_hits,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> RateLimitConfig {
        RateLimitConfig {
            base_delay: Duration::from_millis(10),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.5,
            recovery_threshold: 2,
        }
    }

    #[tokio::test]
    async fn test_extract_domain() {
        assert_eq!(
            RateLimiter::extract_domain("https://www.jbtp.or.kr/board/list.jbtp?pageNo=1"),
            Some("www.jbtp.or.kr".to_string())
        );
        assert_eq!(RateLimiter::extract_domain("not a url"), None);
    }

    #[tokio::test]
    async fn test_backoff_on_rate_limit() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            ..Default::default()
        });

        limiter.acquire("https://example.com/1").await;
        limiter.report_status("example.com", 429).await;

        let stats = limiter.get_stats().await;
        let domain_stats = stats.get("example.com").unwrap();
        assert!(domain_stats.current_delay >= Duration::from_millis(200));
        assert!(domain_stats.in_backoff);
        assert_eq!(domain_stats.rate_limit_hits, 1);
    }

    #[tokio::test]
    async fn test_backoff_capped_at_max_delay() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://example.com/").await;
        for _ in 0..10 {
            limiter.report_rate_limit("example.com", 503).await;
        }
        let stats = limiter.get_stats().await;
        assert_eq!(
            stats["example.com"].current_delay,
            Duration::from_millis(50)
        );
    }

    #[tokio::test]
    async fn test_recovery_after_successes() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://example.com/").await;
        limiter.report_rate_limit("example.com", 429).await;

        for _ in 0..2 {
            limiter.report_status("example.com", 200).await;
        }

        let stats = limiter.get_stats().await;
        assert!(!stats["example.com"].in_backoff);
        assert_eq!(stats["example.com"].current_delay, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_client_errors_leave_delay_alone() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://example.com/").await;
        limiter.report_status("example.com", 404).await;
        let stats = limiter.get_stats().await;
        assert_eq!(stats["example.com"].current_delay, Duration::from_millis(10));
        assert!(!stats["example.com"].in_backoff);
    }

    #[tokio::test]
    async fn test_acquire_counts_requests() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://a.example/1").await;
        limiter.acquire("https://a.example/2").await;
        limiter.acquire("https://b.example/1").await;
        let stats = limiter.get_stats().await;
        assert_eq!(stats["a.example"].total_requests, 2);
        assert_eq!(stats["b.example"].total_requests, 1);
    }
}
