//! Thread models.

use serde::{Deserialize, Serialize};

use super::AttachmentReference;

/// A thread URL discovered on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadReference {
    /// Absolute URL of the thread page.
    pub url: String,
    /// Position in discovery order, assigned at dispatch (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ThreadReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index: None,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// Everything extracted from one thread page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub title: String,
    /// Body converted to markdown. None when no body rule matched.
    pub body: Option<String>,
    pub url: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub attachments: Vec<AttachmentReference>,
}

/// Outcome of archiving one thread, reported whatever went wrong along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub index: usize,
    pub url: String,
    pub title: String,
    pub body_saved: bool,
    /// Attachment anchors that survived filtering.
    pub attachments_found: usize,
    /// Attachments actually written to disk.
    pub attachments_saved: usize,
    /// On-disk names of the saved attachments, in link order.
    #[serde(default)]
    pub saved_files: Vec<String>,
}

impl ThreadSummary {
    /// Summary for a thread whose page could not be fetched at all.
    pub fn unavailable(index: usize, url: &str, title: String) -> Self {
        Self {
            index,
            url: url.to_string(),
            title,
            body_saved: false,
            attachments_found: 0,
            attachments_saved: 0,
            saved_files: Vec::new(),
        }
    }

    /// Attachment count as reported to callers: files that made it to disk.
    pub fn attachment_count(&self) -> usize {
        self.attachments_saved
    }
}
