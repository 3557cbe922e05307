//! Attachment download types.

use std::fmt;
use std::path::PathBuf;

/// Number of leading bytes inspected for an HTML signature.
pub const SNIFF_LEN: usize = 1024;

/// Why an attachment was not saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    /// The URL could not be resolved against the thread page.
    InvalidUrl(String),
    /// The server answered with something other than 200.
    HttpStatus(u16),
    /// The payload was an HTML page (usually a login wall).
    HtmlPayload,
    /// The request or body stream failed.
    Transport(String),
    /// The file could not be written.
    Io(String),
}

impl fmt::Display for DownloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "invalid attachment URL: {}", url),
            Self::HttpStatus(status) => write!(f, "HTTP {}", status),
            Self::HtmlPayload => write!(f, "received HTML instead of a file"),
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Io(e) => write!(f, "write failed: {}", e),
        }
    }
}

/// Result of one attachment download.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    /// Absolute download URL (or the raw href when it could not be resolved).
    pub url: String,
    /// Where the file was written.
    pub path: Option<PathBuf>,
    pub failure: Option<DownloadFailure>,
    pub bytes: u64,
}

impl DownloadOutcome {
    pub(crate) fn saved(url: String, path: PathBuf, bytes: u64) -> Self {
        Self {
            url,
            path: Some(path),
            failure: None,
            bytes,
        }
    }

    pub(crate) fn failed(url: String, failure: DownloadFailure) -> Self {
        Self {
            url,
            path: None,
            failure: Some(failure),
            bytes: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.path.is_some()
    }

    /// Final filename on disk, if saved.
    pub fn filename(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Whether the first bytes of a payload carry an HTML document signature
/// anywhere in the sniffed window.
pub fn looks_like_html(head: &[u8]) -> bool {
    let window = String::from_utf8_lossy(&head[..head.len().min(SNIFF_LEN)]).to_ascii_lowercase();
    window.contains("<!doctype html") || window.contains("<html")
}
