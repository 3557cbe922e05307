//! HTTP client with browser-like headers and per-domain pacing.

mod response;
mod user_agent;

pub use response::{FetchedPage, HttpResponse, SessionCookies};
pub use user_agent::{random_user_agent, resolve_user_agent, IMPERSONATE_USER_AGENTS, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, UPGRADE_INSECURE_REQUESTS};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use super::rate_limiter::{RateLimitConfig, RateLimiter};

/// Accept-Language sent by a Korean desktop browser.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Errors from the fetching layer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// The fetching layer the crawler and archiver depend on.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch an HTML page. Non-success statuses are errors.
    async fn fetch_page(&self, url: &str, referer: Option<&str>)
        -> Result<FetchedPage, FetchError>;

    /// Start a streamed GET. The caller inspects the status.
    async fn get(
        &self,
        url: &str,
        referer: Option<&str>,
        cookies: &SessionCookies,
    ) -> Result<HttpResponse, FetchError>;
}

/// HTTP client that looks like a browser and paces itself per domain.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
    accept_language: String,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client impersonating a browser.
    pub fn new(timeout: Duration, request_delay: Duration) -> Result<Self, FetchError> {
        Self::with_user_agent(timeout, request_delay, None)
    }

    /// Create a new HTTP client with custom user agent configuration.
    /// - None or Some("impersonate"): random real browser user agent
    /// - Some("default"): the bizsup user agent
    /// - Some(custom): custom user agent string
    pub fn with_user_agent(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, FetchError> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            user_agent,
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            rate_limiter: RateLimiter::with_config(RateLimitConfig::with_base_delay(
                request_delay,
            )),
        })
    }

    pub fn with_accept_language(mut self, accept_language: &str) -> Self {
        self.accept_language = accept_language.to_string();
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    async fn send(
        &self,
        url: &str,
        referer: Option<&str>,
        cookies: Option<&SessionCookies>,
    ) -> Result<HttpResponse, FetchError> {
        reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let domain = self.rate_limiter.acquire(url).await;

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, BROWSER_ACCEPT)
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
            .header(UPGRADE_INSECURE_REQUESTS, "1");
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }
        if let Some(cookie) = cookies.and_then(|c| c.header_value()) {
            request = request.header(COOKIE, cookie);
        }

        debug!("GET {}", url);
        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        if let Some(ref domain) = domain {
            self.rate_limiter
                .report_status(domain, response.status().as_u16())
                .await;
        }

        Ok(HttpResponse::new(response))
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_page(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<FetchedPage, FetchError> {
        let response = self.send(url, referer, None).await?;
        let status = response.status.as_u16();
        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = response.url.clone();
        let cookies = response.cookies.clone();
        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status,
            body,
            cookies,
        })
    }

    async fn get(
        &self,
        url: &str,
        referer: Option<&str>,
        cookies: &SessionCookies,
    ) -> Result<HttpResponse, FetchError> {
        self.send(url, referer, Some(cookies)).await
    }
}
