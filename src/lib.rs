//! bizsup - crawl and archive Korean business-support agency bulletin boards.
//!
//! A board is described by a [`scrapers::TargetConfig`]: where its listing
//! starts, how its pages are numbered, and ordered extraction rules for the
//! listing links, thread fields and attachment anchors. The crawler walks the
//! listing, archives every discovered thread as markdown and downloads the
//! attachments beside it.

pub mod cli;
pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::{Config, ConfigError, Settings};
pub use models::{AttachmentReference, CrawlReport, ThreadRecord, ThreadReference, ThreadSummary};
pub use scrapers::configurable::{
    extract, CrawlPhase, CrawlState, ExtractionRule, PageRenderer, PaginationCrawler,
    ThreadArchiver, UrlPageParameter,
};
pub use scrapers::{builtin_targets, Fetcher, HttpClient, TargetConfig};
pub use services::download::{AttachmentFetcher, DownloadOutcome, FilenameResolver};
