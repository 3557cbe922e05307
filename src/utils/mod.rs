//! Shared utility functions.
//!
//! - `markup`: HTML to markdown conversion for archived bodies
//! - `mime`: content type to file extension mapping
//! - `url`: raw query string lookups

mod markup;
mod mime;
mod url;

pub use markup::{html_to_markdown, html_to_text};
pub use mime::extension_for_content_type;
pub use url::query_param;
