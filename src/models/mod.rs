//! Data models for crawled threads and their attachments.

mod attachment;
mod report;
mod thread;

pub use attachment::AttachmentReference;
pub use report::{CrawlEvent, CrawlReport};
pub use thread::{ThreadRecord, ThreadReference, ThreadSummary};
