//! The crawl command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, Settings};
use crate::models::{CrawlEvent, CrawlReport};
use crate::scrapers::{HttpClient, PaginationCrawler, PaginationMode};
use crate::storage::ArchiveLayout;

use super::super::helpers::truncate;

/// Command line overrides for one crawl.
pub struct CrawlOptions {
    pub pages: Option<u32>,
    pub concurrency: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub json: bool,
}

pub async fn cmd_crawl(
    settings: &Settings,
    config: &Config,
    name: &str,
    options: CrawlOptions,
) -> anyhow::Result<()> {
    let mut target = config.target(name)?;
    if let Some(pages) = options.pages {
        target.page_bound = pages.max(1);
    }
    let concurrency = options.concurrency.unwrap_or(settings.concurrency);
    let output_dir = options
        .output_dir
        .unwrap_or_else(|| settings.output_dir.join(name));

    let client = HttpClient::with_user_agent(
        settings.timeout(),
        settings.request_delay(),
        Some(&settings.user_agent),
    )
    .context("failed to create HTTP client")?
    .with_accept_language(&settings.accept_language);

    eprintln!(
        "{} Crawling {} ({})",
        style("→").cyan(),
        style(target.name_or(name)).bold(),
        target.start_url
    );
    eprintln!("  Output: {}", output_dir.display());

    let interactive = target.pagination.mode == PaginationMode::Interactive;
    let crawler = PaginationCrawler::new(
        name,
        target,
        Arc::new(client),
        ArchiveLayout::new(output_dir.clone()),
    )
    .with_concurrency(concurrency);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Interrupted, finishing threads in progress...",
                style("!").yellow()
            );
            ctrl_c.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = tokio::spawn(show_progress(rx));

    let report = if interactive {
        run_interactive(crawler, settings, cancel, tx).await?
    } else {
        crawler.run(cancel, Some(tx)).await
    };
    progress.await.ok();

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

#[cfg(feature = "browser")]
async fn run_interactive(
    crawler: PaginationCrawler,
    settings: &Settings,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<CrawlEvent>,
) -> anyhow::Result<CrawlReport> {
    use crate::scrapers::BrowserRenderer;

    let renderer = Arc::new(
        BrowserRenderer::launch(&settings.browser)
            .await
            .context("failed to launch browser")?,
    );
    let crawler = crawler.with_renderer(renderer.clone());
    let report = crawler.run(cancel, Some(events)).await;
    drop(crawler);

    if let Ok(renderer) = Arc::try_unwrap(renderer) {
        renderer.close().await;
    }
    Ok(report)
}

#[cfg(not(feature = "browser"))]
async fn run_interactive(
    crawler: PaginationCrawler,
    _settings: &Settings,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<CrawlEvent>,
) -> anyhow::Result<CrawlReport> {
    eprintln!(
        "{} Built without the browser feature; only the first batch of threads is visible.",
        style("!").yellow()
    );
    Ok(crawler.run(cancel, Some(events)).await)
}

/// Drive a spinner through the listing phase and a bar through dispatch.
async fn show_progress(mut events: mpsc::UnboundedReceiver<CrawlEvent>) {
    let pb = ProgressBar::new_spinner();
    let mut listed = 0usize;

    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::ListingPage { page, links, .. } => {
                listed += links;
                pb.set_message(format!("page {}: {} threads found", page, listed));
                pb.tick();
            }
            CrawlEvent::Dispatching { total } => {
                pb.set_length(total as u64);
                if let Ok(bar) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    pb.set_style(bar.progress_chars("#>-"));
                }
            }
            CrawlEvent::ThreadArchived(summary) => {
                pb.set_message(truncate(&summary.title, 40));
                pb.inc(1);
            }
        }
    }
    pb.finish_and_clear();
}

fn print_report(report: &CrawlReport) {
    println!();
    println!("{:<6} {:<6} {:<8} Title", "#", "Body", "Files");
    println!("{}", "-".repeat(70));
    for summary in &report.summaries {
        let body = if summary.body_saved {
            style("yes").green().to_string()
        } else {
            style("no").red().to_string()
        };
        println!(
            "{:<6} {:<6} {:<8} {}",
            summary.index,
            body,
            format!("{}/{}", summary.attachments_saved, summary.attachments_found),
            truncate(&summary.title, 50)
        );
    }

    println!("{}", "-".repeat(70));
    let elapsed = report.finished_at - report.started_at;
    println!(
        "{} {} pages, {} threads, {} bodies, {}/{} attachments in {}s",
        if report.cancelled {
            style("!").yellow()
        } else {
            style("✓").green()
        },
        report.pages_visited,
        report.summaries.len(),
        report.bodies_saved(),
        report.attachments_saved(),
        report.attachments_found(),
        elapsed.num_seconds()
    );
    if report.cancelled {
        println!(
            "  Cancelled: {} of {} threads archived",
            report.summaries.len(),
            report.threads_discovered
        );
    }
}
