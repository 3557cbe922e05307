//! Configuration-driven board crawler.
//!
//! One crawler and one archiver serve every board; what differs between
//! boards lives in [`TargetConfig`](crate::scrapers::TargetConfig) rule
//! tables.

pub mod extract;
pub mod html_crawl;
pub mod interactive;
pub mod page_param;
pub mod thread;

pub use extract::{
    extract, extract_all, Cardinality, Extraction, ExtractionRule, ExtractKind, PostProcess,
};
pub use html_crawl::{CrawlPhase, CrawlState, PaginationCrawler};
pub use interactive::{collect_interactive, PageRenderer, RenderError};
pub use page_param::UrlPageParameter;
pub use thread::{fallback_title, ThreadArchiver};
