//! Crawl run reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ThreadSummary;

/// Events emitted while a crawl runs.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// A listing page was processed.
    ListingPage {
        page: u32,
        url: String,
        links: usize,
    },
    /// Listing phase finished; this many threads will be archived.
    Dispatching { total: usize },
    /// One thread finished archiving.
    ThreadArchived(ThreadSummary),
}

/// Result of a whole crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub target: String,
    pub pages_visited: u32,
    pub threads_discovered: usize,
    /// Per-thread summaries ordered by index.
    pub summaries: Vec<ThreadSummary>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    pub fn bodies_saved(&self) -> usize {
        self.summaries.iter().filter(|s| s.body_saved).count()
    }

    pub fn attachments_saved(&self) -> usize {
        self.summaries.iter().map(|s| s.attachments_saved).sum()
    }

    pub fn attachments_found(&self) -> usize {
        self.summaries.iter().map(|s| s.attachments_found).sum()
    }
}
