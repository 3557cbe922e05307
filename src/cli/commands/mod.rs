//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod fetch;
mod targets;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::load_settings;

#[derive(Parser)]
#[command(name = "bizsup")]
#[command(about = "Crawl and archive business-support bulletin boards")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a target's listing and archive every thread found
    Crawl {
        /// Target name (see `bizsup targets`)
        target: String,
        /// Maximum number of listing pages (overrides the target's bound)
        #[arg(short, long)]
        pages: Option<u32>,
        /// Threads archived at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Directory receiving records and attachments
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Print the crawl report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available targets
    Targets,

    /// Download a single attachment URL
    FetchAttachment {
        /// Attachment URL
        url: String,
        /// Page the link was found on (sent as Referer)
        #[arg(long)]
        referer: Option<String>,
        /// Display name used when the server sends no filename
        #[arg(long)]
        name: Option<String>,
        /// Directory receiving the file
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Crawl {
            target,
            pages,
            concurrency,
            output_dir,
            json,
        } => {
            crawl::cmd_crawl(
                &settings,
                &config,
                &target,
                crawl::CrawlOptions {
                    pages,
                    concurrency,
                    output_dir,
                    json,
                },
            )
            .await
        }
        Commands::Targets => targets::cmd_targets(&config),
        Commands::FetchAttachment {
            url,
            referer,
            name,
            output_dir,
        } => fetch::cmd_fetch_attachment(&settings, &url, referer, name, output_dir).await,
    }
}
