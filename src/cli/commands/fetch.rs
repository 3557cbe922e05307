//! Single attachment download command.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::models::AttachmentReference;
use crate::scrapers::{HttpClient, SessionCookies};
use crate::services::AttachmentFetcher;

use super::super::helpers::format_bytes;

pub async fn cmd_fetch_attachment(
    settings: &Settings,
    url: &str,
    referer: Option<String>,
    name: Option<String>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = HttpClient::with_user_agent(
        settings.timeout(),
        settings.request_delay(),
        Some(&settings.user_agent),
    )
    .context("failed to create HTTP client")?
    .with_accept_language(&settings.accept_language);

    let dir = output_dir.unwrap_or_else(|| settings.output_dir.clone());
    let referer = referer.unwrap_or_else(|| url.to_string());
    let reference = AttachmentReference::new(url, name.unwrap_or_default());

    let fetcher = AttachmentFetcher::new(Arc::new(client));
    let outcome = fetcher
        .fetch(
            &reference,
            &referer,
            &SessionCookies::default(),
            &dir,
            &mut HashSet::new(),
        )
        .await;

    match (&outcome.path, &outcome.failure) {
        (Some(path), _) => {
            println!(
                "{} Saved {} ({})",
                style("✓").green(),
                path.display(),
                format_bytes(outcome.bytes)
            );
            Ok(())
        }
        (None, Some(failure)) => anyhow::bail!("download of {} failed: {}", outcome.url, failure),
        (None, None) => anyhow::bail!("download of {} failed", outcome.url),
    }
}
