//! Attachment reference model.

use serde::{Deserialize, Serialize};

/// A downloadable file referenced from a thread page.
///
/// The local filename stays empty until download time: the server's
/// Content-Disposition header is often the only trustworthy name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReference {
    /// Download URL as found in the page (possibly relative).
    pub url: String,
    /// Display text of the anchor.
    pub text: String,
    /// Filename chosen when the file was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl AttachmentReference {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            filename: None,
        }
    }
}
