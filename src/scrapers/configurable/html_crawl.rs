//! Listing traversal and thread dispatch.
//!
//! The listing phase is an explicit state value advanced one page at a time
//! by [`PaginationCrawler::step`], which does no I/O. [`PaginationCrawler::run`]
//! drives it with real fetches and then fans the accumulated threads out to
//! the archiver.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::{future, stream, StreamExt};
use scraper::Html;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::extract::{extract_all, resolve_url};
use super::interactive::{collect_interactive, PageRenderer};
use super::page_param::UrlPageParameter;
use super::thread::ThreadArchiver;
use crate::models::{CrawlEvent, CrawlReport, ThreadReference, ThreadSummary};
use crate::scrapers::config::{ListingMode, PaginationMode, TargetConfig};
use crate::scrapers::Fetcher;
use crate::storage::ArchiveLayout;

/// Where the crawl currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    /// The listing page at `current_url` is next.
    FetchingListing,
    /// Listing is over; accumulated threads are ready for dispatch.
    Dispatching,
    /// Every dispatch has been issued or the crawl was cancelled.
    Done,
}

/// Accumulated state of the listing phase.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub phase: CrawlPhase,
    /// Listing page to fetch next.
    pub current_url: String,
    /// Previous listing page, sent as referer.
    pub referer: Option<String>,
    /// Traversal counter: number of the page at `current_url` (1-based).
    pub page: u32,
    /// Threads in discovery order.
    pub threads: Vec<ThreadReference>,
    /// New links found on each processed page.
    pub page_links: Vec<usize>,
    seen: HashSet<String>,
    visited: HashSet<String>,
}

impl CrawlState {
    /// Initial state: about to fetch the seed as page 1.
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            phase: CrawlPhase::FetchingListing,
            current_url: seed.into(),
            referer: None,
            page: 1,
            threads: Vec::new(),
            page_links: Vec::new(),
            seen: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    /// Append links not seen before; returns how many were new.
    pub fn absorb(&mut self, links: impl IntoIterator<Item = String>) -> usize {
        let before = self.threads.len();
        for link in links {
            if self.seen.insert(link.clone()) {
                self.threads.push(ThreadReference::new(link));
            }
        }
        self.threads.len() - before
    }

    /// Stop the listing phase and proceed with whatever was accumulated.
    pub fn end_listing(mut self) -> Self {
        if self.phase == CrawlPhase::FetchingListing {
            self.phase = CrawlPhase::Dispatching;
        }
        self
    }

    /// Terminal transition once dispatching is over.
    pub fn finish(mut self) -> Self {
        self.phase = CrawlPhase::Done;
        self
    }

    /// Number of listing pages processed so far.
    pub fn pages_visited(&self) -> u32 {
        self.page_links.len() as u32
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }
}

/// Crawls one target's listing and archives every thread it finds.
pub struct PaginationCrawler {
    name: String,
    target: TargetConfig,
    page_param: UrlPageParameter,
    fetcher: Arc<dyn Fetcher>,
    archiver: ThreadArchiver,
    renderer: Option<Arc<dyn PageRenderer>>,
    concurrency: usize,
}

impl PaginationCrawler {
    pub fn new(
        name: impl Into<String>,
        target: TargetConfig,
        fetcher: Arc<dyn Fetcher>,
        layout: ArchiveLayout,
    ) -> Self {
        let archiver = ThreadArchiver::new(fetcher.clone(), &target, layout);
        Self {
            name: name.into(),
            page_param: UrlPageParameter::new(target.page_param.clone()),
            target,
            fetcher,
            archiver,
            renderer: None,
            concurrency: 1,
        }
    }

    /// Maximum number of threads archived at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Page renderer used by targets with interactive pagination.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Process one fetched listing page: accumulate its thread links and
    /// decide where the listing goes next.
    pub fn step(&self, mut state: CrawlState, page_html: &str) -> CrawlState {
        if state.phase != CrawlPhase::FetchingListing {
            return state;
        }
        state.visited.insert(state.current_url.clone());

        let document = Html::parse_document(page_html);
        let links = listing_links(&self.target, &document, &state.current_url);
        let found = links.len();
        let added = state.absorb(links);
        state.page_links.push(added);
        info!(
            "Page {}: {} links ({} new), {} threads so far",
            state.page,
            found,
            added,
            state.threads.len()
        );

        let current_page = self
            .page_param
            .page_value(&state.current_url)
            .unwrap_or(state.page);
        if current_page >= self.target.page_bound || state.page >= self.target.page_bound {
            debug!("Page bound {} reached", self.target.page_bound);
            return state.end_listing();
        }

        let Some(next_url) = self.next_page_url(&document, &state.current_url, current_page) else {
            info!("No next page after page {}, end of available pages", state.page);
            return state.end_listing();
        };
        if state.visited.contains(&next_url) {
            debug!("Next page {} already visited", next_url);
            return state.end_listing();
        }

        state.referer = Some(std::mem::replace(&mut state.current_url, next_url));
        state.page += 1;
        state
    }

    fn next_page_url(&self, document: &Html, current_url: &str, current_page: u32) -> Option<String> {
        let next = current_page.saturating_add(1).to_string();
        let from_rules = self.target.pagination.rules.iter().find_map(|rule| {
            rule.substitute("next", &next)
                .apply(document)
                .into_iter()
                .filter(|href| !href.contains('#') && !href.to_lowercase().starts_with("javascript:"))
                .find_map(|href| resolve_url(current_url, &href))
                .filter(|url| is_http(url))
        });
        if from_rules.is_some() {
            return from_rules;
        }
        if self.target.pagination.rewrite {
            return Some(self.page_param.next_page_url(current_url, current_page));
        }
        None
    }

    /// Run the whole crawl: listing first, then thread dispatch.
    ///
    /// Cancellation is honoured before each listing fetch and before each
    /// thread dispatch; archiving already in progress is allowed to finish.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        events: Option<mpsc::UnboundedSender<CrawlEvent>>,
    ) -> CrawlReport {
        let started_at = Utc::now();
        let state = self.collect_listing(&cancel, events.as_ref()).await;

        let pages_visited = state.pages_visited();
        let threads_discovered = state.threads.len();
        let summaries = self.dispatch(&state.threads, &cancel, events.as_ref()).await;
        let state = state.finish();
        debug!("{} crawl reached {:?} after {} pages", self.name, state.phase, pages_visited);

        let report = CrawlReport {
            target: self.name.clone(),
            pages_visited,
            threads_discovered,
            cancelled: cancel.is_cancelled() || summaries.len() < threads_discovered,
            summaries,
            started_at,
            finished_at: Utc::now(),
        };
        report_crawl_results(&report);
        report
    }

    async fn collect_listing(
        &self,
        cancel: &CancellationToken,
        events: Option<&mpsc::UnboundedSender<CrawlEvent>>,
    ) -> CrawlState {
        if self.target.pagination.mode == PaginationMode::Interactive {
            match &self.renderer {
                Some(renderer) => {
                    let state = collect_interactive(renderer.as_ref(), &self.target, cancel).await;
                    send(
                        events,
                        CrawlEvent::ListingPage {
                            page: 1,
                            url: self.target.start_url.clone(),
                            links: state.threads.len(),
                        },
                    );
                    return state;
                }
                None => warn!(
                    "{} needs a page renderer for interactive pagination, reading the static page instead",
                    self.name
                ),
            }
        }

        let mut state = CrawlState::new(self.target.start_url.clone());
        while state.phase == CrawlPhase::FetchingListing {
            if cancel.is_cancelled() {
                info!("Crawl cancelled before page {}", state.page);
                return state.end_listing();
            }

            info!("Processing page {}: {}", state.page, state.current_url);
            let page = match self
                .fetcher
                .fetch_page(&state.current_url, state.referer.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        "Listing page {} unavailable ({}), end of available pages",
                        state.page, e
                    );
                    return state.end_listing();
                }
            };

            let (page_no, url) = (state.page, state.current_url.clone());
            state = self.step(state, &page.body);
            send(
                events,
                CrawlEvent::ListingPage {
                    page: page_no,
                    url,
                    links: state.page_links.last().copied().unwrap_or(0),
                },
            );
        }
        state
    }

    async fn dispatch(
        &self,
        threads: &[ThreadReference],
        cancel: &CancellationToken,
        events: Option<&mpsc::UnboundedSender<CrawlEvent>>,
    ) -> Vec<ThreadSummary> {
        send(events, CrawlEvent::Dispatching { total: threads.len() });

        let references = threads
            .iter()
            .enumerate()
            .map(|(i, reference)| reference.clone().with_index(i + 1));

        let mut summaries: Vec<ThreadSummary> = stream::iter(references)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|reference| async move {
                let index = reference.index.unwrap_or_default();
                let summary = self.archiver.archive(&reference, index).await;
                send(events, CrawlEvent::ThreadArchived(summary.clone()));
                summary
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        summaries.sort_by_key(|s| s.index);
        summaries
    }
}

/// Thread links on a listing page, filtered and made absolute.
pub(crate) fn listing_links(target: &TargetConfig, document: &Html, page_url: &str) -> Vec<String> {
    if target.listing_mode == ListingMode::Union {
        return accept_links(target, extract_all(document, &target.listing_rules), page_url);
    }
    for (rule_index, rule) in target.listing_rules.iter().enumerate() {
        let links = accept_links(target, rule.apply(document), page_url);
        if links.is_empty() {
            continue;
        }
        if rule_index > 0 {
            warn!(
                "Listing on {} matched fallback rule #{} ({})",
                page_url,
                rule_index + 1,
                rule.selector
            );
        }
        return links;
    }
    Vec::new()
}

/// Hrefs that pass the link filter, resolved and deduplicated.
fn accept_links(target: &TargetConfig, hrefs: Vec<String>, page_url: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let accepted = hrefs
        .into_iter()
        .filter(|href| target.link_filter.accepts(href))
        .filter_map(|href| resolve_url(page_url, href.trim()))
        .filter(|url| is_http(url));
    for url in accepted {
        if !links.contains(&url) {
            links.push(url);
        }
    }
    links
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn send(events: Option<&mpsc::UnboundedSender<CrawlEvent>>, event: CrawlEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

/// Log a crawl summary at a level matching how it went.
fn report_crawl_results(report: &CrawlReport) {
    let archived = report.summaries.len();
    if report.threads_discovered == 0 {
        error!(
            "Crawl of {} found no threads in {} listing pages. Check the listing rules.",
            report.target, report.pages_visited
        );
    } else if report.cancelled {
        warn!(
            "Crawl of {} cancelled: {} of {} threads archived, {} bodies, {} attachments",
            report.target,
            archived,
            report.threads_discovered,
            report.bodies_saved(),
            report.attachments_saved()
        );
    } else if report.bodies_saved() < archived
        || report.attachments_saved() < report.attachments_found()
    {
        warn!(
            "Crawl of {} complete with gaps: {} pages, {} threads, {}/{} bodies, {}/{} attachments",
            report.target,
            report.pages_visited,
            archived,
            report.bodies_saved(),
            archived,
            report.attachments_saved(),
            report.attachments_found()
        );
    } else {
        info!(
            "Crawl of {} complete: {} pages, {} threads, {} attachments",
            report.target,
            report.pages_visited,
            archived,
            report.attachments_saved()
        );
    }
}
