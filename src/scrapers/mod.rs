//! Board crawling: target configuration, fetching, listing traversal and
//! thread archiving.

#[cfg(feature = "browser")]
pub mod browser;
pub mod config;
pub mod configurable;
pub mod http_client;
pub mod rate_limiter;
mod sites;

#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
pub use config::{
    AttachmentRules, LinkFilter, ListingMode, PaginationConfig, PaginationMode, SkipRule,
    TargetConfig, TextSource, ThreadRules,
};
pub use configurable::{PaginationCrawler, ThreadArchiver};
pub use http_client::{
    FetchError, FetchedPage, Fetcher, HttpClient, HttpResponse, SessionCookies,
};
pub use rate_limiter::RateLimiter;
pub use sites::builtin_targets;
