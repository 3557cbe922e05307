//! Attachment download service.
//!
//! Streams one attachment to disk, refusing HTML payloads and never leaving a
//! partial file under its final name.

pub mod filename;
mod types;

pub use filename::{
    has_extension, parse_content_disposition_filename, sanitize_filename, FilenameResolver,
    MAX_FILENAME_LEN,
};
pub use types::{looks_like_html, DownloadFailure, DownloadOutcome, SNIFF_LEN};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::models::AttachmentReference;
use crate::scrapers::configurable::extract::resolve_url;
use crate::scrapers::{Fetcher, HttpResponse, SessionCookies};

/// Downloads attachments discovered on a thread page.
#[derive(Clone)]
pub struct AttachmentFetcher {
    fetcher: Arc<dyn Fetcher>,
    resolver: FilenameResolver,
}

impl AttachmentFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            resolver: FilenameResolver::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: FilenameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn resolver(&self) -> &FilenameResolver {
        &self.resolver
    }

    /// Download `reference` into `dir`.
    ///
    /// `referer` is the thread page URL; relative hrefs resolve against it.
    /// `claimed` holds the filenames already taken in `dir` during this
    /// thread and is updated with the name this download ends up using.
    pub async fn fetch(
        &self,
        reference: &AttachmentReference,
        referer: &str,
        cookies: &SessionCookies,
        dir: &Path,
        claimed: &mut HashSet<String>,
    ) -> DownloadOutcome {
        let url = match resolve_url(referer, &reference.url)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        {
            Some(url) => url,
            None => {
                warn!("Skipping attachment with unusable URL: {}", reference.url);
                return DownloadOutcome::failed(
                    reference.url.clone(),
                    DownloadFailure::InvalidUrl(reference.url.clone()),
                );
            }
        };

        let mut response = match self.fetcher.get(&url, Some(referer), cookies).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Attachment request failed for {}: {}", url, e);
                return DownloadOutcome::failed(url, DownloadFailure::Transport(e.to_string()));
            }
        };

        let status = response.status.as_u16();
        if status != 200 {
            warn!("Failed to download attachment {}: HTTP {}", url, status);
            return DownloadOutcome::failed(url, DownloadFailure::HttpStatus(status));
        }

        let name = self.resolver.resolve(
            &reference.text,
            &url,
            response.content_disposition(),
            response.content_type(),
        );

        let head = match read_head(&mut response).await {
            Ok(head) => head,
            Err(e) => {
                warn!("Failed reading attachment body from {}: {}", url, e);
                return DownloadOutcome::failed(url, DownloadFailure::Transport(e.to_string()));
            }
        };
        if looks_like_html(&head) {
            warn!("Received HTML instead of file. Site may require authentication for downloads.");
            debug!("HTML payload from {}", url);
            return DownloadOutcome::failed(url, DownloadFailure::HtmlPayload);
        }

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to create {}: {}", dir.display(), e);
            return DownloadOutcome::failed(url, DownloadFailure::Io(e.to_string()));
        }

        let name = claim_name(&name, claimed, self.resolver.max_len());
        let path = dir.join(&name);
        match write_body(response, head, &path).await {
            Ok(bytes) => {
                info!("Saved attachment {} ({} bytes)", path.display(), bytes);
                DownloadOutcome::saved(url, path, bytes)
            }
            Err(failure) => {
                claimed.remove(&name);
                warn!("Failed to save attachment {}: {}", url, failure);
                DownloadOutcome::failed(url, failure)
            }
        }
    }
}

/// Buffer at least [`SNIFF_LEN`] bytes, or the whole body if shorter.
async fn read_head(response: &mut HttpResponse) -> Result<Vec<u8>, reqwest::Error> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    while head.len() < SNIFF_LEN {
        match response.chunk().await? {
            Some(chunk) => head.extend_from_slice(&chunk),
            None => break,
        }
    }
    Ok(head)
}

/// Stream the rest of the body after `head` into `<path>.part`, then rename.
async fn write_body(
    mut response: HttpResponse,
    head: Vec<u8>,
    path: &Path,
) -> Result<u64, DownloadFailure> {
    let part = part_path(path);
    let io = |e: std::io::Error| DownloadFailure::Io(e.to_string());

    let result = async {
        let mut file = File::create(&part).await.map_err(io)?;
        file.write_all(&head).await.map_err(io)?;
        let mut written = head.len() as u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadFailure::Transport(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io)?;
        drop(file);
        tokio::fs::rename(&part, path).await.map_err(io)?;
        Ok::<u64, DownloadFailure>(written)
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// First unclaimed variant of `name`: `name`, `stem_2.ext`, `stem_3.ext`, ...
///
/// Only names claimed during this thread count, so re-running a crawl into
/// the same output directory overwrites instead of piling up suffixes.
/// Suffixed variants shorten the stem so they stay within `max_len` chars.
fn claim_name(name: &str, claimed: &mut HashSet<String>, max_len: usize) -> String {
    let (stem, ext) = if has_extension(name) {
        match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (name, None),
        }
    } else {
        (name, None)
    };

    let mut n = 1usize;
    loop {
        let candidate = if n == 1 {
            name.to_string()
        } else {
            let tail = match ext {
                Some(ext) => format!("_{}.{}", n, ext),
                None => format!("_{}", n),
            };
            let keep = max_len.saturating_sub(tail.chars().count());
            let stem: String = stem.chars().take(keep).collect();
            format!("{}{}", stem.trim_end(), tail)
        };
        if !claimed.contains(&candidate) {
            claimed.insert(candidate.clone());
            return candidate;
        }
        n += 1;
    }
}
