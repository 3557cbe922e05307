//! Thread page archiving.
//!
//! Fetch a thread, pull its fields out with the target's rule lists, write the
//! record and download whatever it links to. A missing field or a failed
//! download never stops the rest of the thread.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::extract::{extract, own_text, resolve_url, ExtractKind, ExtractionRule};
use crate::models::{AttachmentReference, ThreadRecord, ThreadReference, ThreadSummary};
use crate::scrapers::config::{AttachmentRules, TargetConfig, TextSource, ThreadRules};
use crate::scrapers::Fetcher;
use crate::services::download::{AttachmentFetcher, FilenameResolver};
use crate::storage::ArchiveLayout;
use crate::utils::{html_to_markdown, query_param};

/// Archives individual thread pages for one target.
#[derive(Clone)]
pub struct ThreadArchiver {
    fetcher: Arc<dyn Fetcher>,
    downloads: AttachmentFetcher,
    rules: ThreadRules,
    attachments: AttachmentRules,
    layout: ArchiveLayout,
    referer: Option<String>,
}

impl ThreadArchiver {
    pub fn new(fetcher: Arc<dyn Fetcher>, target: &TargetConfig, layout: ArchiveLayout) -> Self {
        let resolver = FilenameResolver::new(target.attachments.file_id_params.clone());
        Self {
            downloads: AttachmentFetcher::new(fetcher.clone()).with_resolver(resolver),
            fetcher,
            rules: target.thread.clone(),
            attachments: target.attachments.clone(),
            layout,
            referer: Some(target.start_url.clone()),
        }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Archive one thread under `index`.
    ///
    /// Always returns a summary; failures along the way are logged and
    /// reflected in its counts.
    pub async fn archive(&self, reference: &ThreadReference, index: usize) -> ThreadSummary {
        let page = match self
            .fetcher
            .fetch_page(&reference.url, self.referer.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to fetch thread #{} {}: {}", index, reference.url, e);
                let title = fallback_title(&reference.url, &self.rules.id_params);
                return ThreadSummary::unavailable(index, &reference.url, title);
            }
        };

        let mut record = self.extract_record(&page.body, &page.final_url);
        record.url = reference.url.clone();

        let body_saved = match self.layout.write_record(index, &record).await {
            Ok(Some(path)) => {
                debug!("Wrote {}", path.display());
                true
            }
            Ok(None) => {
                warn!("No body found for thread #{} {}", index, reference.url);
                false
            }
            Err(e) => {
                warn!("Failed to write record for thread #{}: {}", index, e);
                false
            }
        };

        let dir = self.layout.attachment_dir(index);
        let mut claimed = HashSet::new();
        let mut attachments_saved = 0;
        for attachment in &mut record.attachments {
            let outcome = self
                .downloads
                .fetch(attachment, &page.final_url, &page.cookies, &dir, &mut claimed)
                .await;
            if outcome.success() {
                attachments_saved += 1;
            }
            attachment.filename = outcome.filename();
        }

        info!(
            "Thread #{} archived: {} (body: {}, attachments: {}/{})",
            index,
            record.title,
            if body_saved { "saved" } else { "missing" },
            attachments_saved,
            record.attachments.len()
        );

        ThreadSummary {
            index,
            url: record.url,
            title: record.title,
            body_saved,
            attachments_found: record.attachments.len(),
            attachments_saved,
            saved_files: record
                .attachments
                .into_iter()
                .filter_map(|attachment| attachment.filename)
                .collect(),
        }
    }

    /// Extract a record from thread page HTML. `page_url` is where the page
    /// was served from; relative links resolve against it.
    pub fn extract_record(&self, html: &str, page_url: &str) -> ThreadRecord {
        let document = Html::parse_document(html);

        let title = match extract_field(&document, &self.rules.title_rules, "title", page_url) {
            Some(title) => collapse_whitespace(&title),
            None => {
                let title = fallback_title(page_url, &self.rules.id_params);
                warn!("Title not found for {}, using {}", page_url, title);
                title
            }
        };

        let body = extract(&document, &self.rules.body_rules).and_then(|found| {
            if found.rule_index > 0 {
                warn!("Body for {} matched fallback rule #{}", page_url, found.rule_index + 1);
            }
            let html_rule = matches!(self.rules.body_rules[found.rule_index].kind, ExtractKind::Html);
            let text = if html_rule {
                html_to_markdown(found.first())
            } else {
                found.first().trim().to_string()
            };
            (!text.is_empty()).then_some(text)
        });

        let author = extract_field(&document, &self.rules.author_rules, "author", page_url)
            .map(|a| collapse_whitespace(&a));
        let date = extract_field(&document, &self.rules.date_rules, "date", page_url)
            .map(|d| collapse_whitespace(&d));

        let attachments = discover_attachments(&document, &self.attachments, page_url);

        ThreadRecord {
            title,
            body,
            url: page_url.to_string(),
            author,
            date,
            attachments,
        }
    }
}

fn extract_field(
    document: &Html,
    rules: &[ExtractionRule],
    field: &str,
    page_url: &str,
) -> Option<String> {
    let found = extract(document, rules)?;
    if found.rule_index > 0 {
        warn!(
            "{} for {} matched fallback rule #{}",
            field,
            page_url,
            found.rule_index + 1
        );
    }
    Some(found.into_first())
}

/// Attachment anchors from every selector, filtered and deduplicated by URL.
fn discover_attachments(
    document: &Html,
    rules: &AttachmentRules,
    page_url: &str,
) -> Vec<AttachmentReference> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for selector_str in &rules.selectors {
        let selector = match Selector::parse(selector_str) {
            Ok(selector) => selector,
            Err(e) => {
                debug!("Skipping unparsable attachment selector {:?}: {:?}", selector_str, e);
                continue;
            }
        };
        for anchor in document.select(&selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !rules.accepts(href) {
                continue;
            }
            let Some(url) = resolve_url(page_url, href.trim()) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }
            found.push(AttachmentReference::new(url, anchor_text(anchor, rules.text_from)));
        }
    }
    found
}

fn anchor_text(anchor: ElementRef<'_>, source: TextSource) -> String {
    let text = match source {
        TextSource::Anchor => String::new(),
        TextSource::ParentOwnText => anchor
            .parent()
            .and_then(ElementRef::wrap)
            .map(own_text)
            .map(|t| collapse_whitespace(&t))
            .unwrap_or_default(),
    };
    if text.is_empty() {
        collapse_whitespace(&anchor.text().collect::<String>())
    } else {
        text
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Placeholder title for a thread whose title could not be extracted.
///
/// Uses the first identifying query parameter present, else a stable number
/// derived from the URL.
pub fn fallback_title(url: &str, id_params: &[String]) -> String {
    if let Some(id) = id_params.iter().find_map(|param| query_param(url, param)) {
        return format!("게시글-{}", id);
    }
    let digest = Sha256::digest(url.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("게시글-{}", u64::from_be_bytes(prefix) % 10000)
}
