//! Service layer.
//!
//! Domain logic kept apart from the CLI so it can be driven from tests or
//! other front ends.

pub mod download;

pub use download::{AttachmentFetcher, DownloadFailure, DownloadOutcome, FilenameResolver};
