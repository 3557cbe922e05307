//! Target listing command.

use console::style;

use crate::config::Config;
use crate::scrapers::PaginationMode;

use super::super::helpers::truncate;

/// List builtin and configured targets.
pub fn cmd_targets(config: &Config) -> anyhow::Result<()> {
    let targets = config.targets()?;

    if targets.is_empty() {
        println!("{} No targets available", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Targets").bold());
    println!("{}", "-".repeat(80));
    println!("{:<10} {:<28} {:<12} {:<6} Start URL", "Name", "Board", "Paging", "Pages");
    println!("{}", "-".repeat(80));

    for (name, target) in &targets {
        let mode = match target.pagination.mode {
            PaginationMode::Interactive => "more button",
            PaginationMode::Url => "url",
        };
        let origin = if config.targets.contains_key(name) {
            style("*").cyan().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "{:<10} {:<28} {:<12} {:<6} {}{}",
            name,
            truncate(&target.name_or(name), 27),
            mode,
            target.page_bound,
            target.start_url,
            origin
        );
    }

    if !config.targets.is_empty() {
        println!("\n  {} defined or overridden in config", style("*").cyan());
    }
    Ok(())
}
