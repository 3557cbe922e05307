//! Listing collection for boards paginated by a "more" button.
//!
//! The page is driven through a [`PageRenderer`]: open the seed, extract,
//! then click the first visible trigger, let the page settle and extract
//! again until nothing new shows up or the trigger bound is reached. The
//! accumulated links are handed back once, at the end.

use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::html_crawl::{listing_links, CrawlState};
use crate::scrapers::config::TargetConfig;

/// Errors from a page renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to start renderer: {0}")]
    Launch(String),
    #[error("failed to open {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("failed to read page content: {0}")]
    Content(String),
}

/// A controllable rendered page.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate to `url` and wait for it to load.
    async fn open(&self, url: &str) -> Result<(), RenderError>;

    /// Evaluate a script in the page and return its result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError>;

    /// Let the page settle.
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Current DOM serialized as HTML.
    async fn current_markup(&self) -> Result<String, RenderError>;
}

/// Script clicking the first visible element matching any of `selectors`.
/// Evaluates to the matching selector, or null when nothing was clicked.
pub fn click_script(selectors: &[String]) -> String {
    let list = serde_json::to_string(selectors).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"(() => {{
  const selectors = {};
  for (const sel of selectors) {{
    let nodes;
    try {{ nodes = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
    for (const btn of nodes) {{
      const style = window.getComputedStyle(btn);
      if (btn.offsetWidth > 0 && btn.offsetHeight > 0 &&
          style.display !== 'none' && style.visibility !== 'hidden') {{
        btn.click();
        return sel;
      }}
    }}
  }}
  return null;
}})()"#,
        list
    )
}

/// Collect thread links by repeatedly triggering the "more" control.
///
/// Renderer failures end collection early with whatever was gathered.
pub async fn collect_interactive(
    renderer: &dyn PageRenderer,
    target: &TargetConfig,
    cancel: &CancellationToken,
) -> CrawlState {
    let mut state = CrawlState::new(target.start_url.clone());
    if cancel.is_cancelled() {
        return state.end_listing();
    }

    let settle = Duration::from_millis(target.pagination.settle_ms);
    info!("Processing page 1: {} (interactive)", target.start_url);
    if let Err(e) = renderer.open(&target.start_url).await {
        warn!("Could not open {}: {}", target.start_url, e);
        return state.end_listing();
    }
    renderer.wait(settle).await;

    match absorb_rendered(renderer, target, &mut state).await {
        Some(added) => info!("Initial page: {} links", added),
        None => return state.end_listing(),
    }

    let script = click_script(&target.pagination.trigger_selectors);
    for round in 1..=target.pagination.max_triggers {
        if cancel.is_cancelled() {
            info!("Crawl cancelled after {} triggers", round - 1);
            break;
        }

        let clicked = match renderer.evaluate(&script).await {
            Ok(serde_json::Value::String(selector)) => selector,
            Ok(_) => {
                info!("No visible more button, stopping after {} triggers", round - 1);
                break;
            }
            Err(e) => {
                warn!("Trigger {} failed: {}", round, e);
                break;
            }
        };
        debug!("Clicked {}", clicked);
        renderer.wait(settle).await;

        match absorb_rendered(renderer, target, &mut state).await {
            Some(0) => {
                info!("No new links after trigger {}", round);
                break;
            }
            Some(added) => info!(
                "Trigger {}: {} new links, {} threads so far",
                round,
                added,
                state.threads.len()
            ),
            None => break,
        }
    }

    state.end_listing()
}

/// Extract links from the current markup into `state`; None if the markup
/// could not be read.
async fn absorb_rendered(
    renderer: &dyn PageRenderer,
    target: &TargetConfig,
    state: &mut CrawlState,
) -> Option<usize> {
    let markup = match renderer.current_markup().await {
        Ok(markup) => markup,
        Err(e) => {
            warn!("Could not read rendered page: {}", e);
            return None;
        }
    };
    let links = rendered_links(target, &markup);
    let added = state.absorb(links);
    state.page_links.push(added);
    Some(added)
}

fn rendered_links(target: &TargetConfig, markup: &str) -> Vec<String> {
    let document = Html::parse_document(markup);
    listing_links(target, &document, &target.start_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::config::PaginationMode;
    use crate::scrapers::configurable::extract::ExtractionRule;
    use std::sync::Mutex;

    /// Serves one markup per state; each click advances to the next state
    /// while any remain.
    struct Scripted {
        pages: Vec<String>,
        state: Mutex<usize>,
        clicks: Mutex<usize>,
    }

    impl Scripted {
        fn new(pages: Vec<String>) -> Self {
            Self {
                pages,
                state: Mutex::new(0),
                clicks: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for Scripted {
        async fn open(&self, _url: &str) -> Result<(), RenderError> {
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
            assert!(script.contains(".btn_more"));
            let mut state = self.state.lock().unwrap();
            if *state + 1 < self.pages.len() {
                *state += 1;
                *self.clicks.lock().unwrap() += 1;
                Ok(serde_json::Value::String(".btn_more".to_string()))
            } else {
                Ok(serde_json::Value::Null)
            }
        }

        async fn wait(&self, _duration: Duration) {}

        async fn current_markup(&self) -> Result<String, RenderError> {
            Ok(self.pages[*self.state.lock().unwrap()].clone())
        }
    }

    fn page(ids: &[u32]) -> String {
        let items: String = ids
            .iter()
            .map(|id| format!(r#"<li><a href="/board/view.do?boardId={}">공고 {}</a></li>"#, id, id))
            .collect();
        format!(r#"<ul class="notice-list">{}</ul><button class="btn_more">더보기</button>"#, items)
    }

    fn target(max_triggers: u32) -> TargetConfig {
        let mut target = TargetConfig::new("https://example.com/index.do");
        target.pagination.mode = PaginationMode::Interactive;
        target.pagination.trigger_selectors = vec![".btn_more".to_string()];
        target.pagination.max_triggers = max_triggers;
        target.listing_rules = vec![ExtractionRule::css(".notice-list li a").attr("href").multi()];
        target
    }

    #[tokio::test]
    async fn test_collects_until_no_trigger() {
        let renderer = Scripted::new(vec![page(&[1, 2]), page(&[1, 2, 3]), page(&[1, 2, 3, 4])]);
        let state = collect_interactive(&renderer, &target(6), &CancellationToken::new()).await;
        assert_eq!(state.threads.len(), 4);
        assert_eq!(state.page_links, vec![2, 1, 1]);
        assert_eq!(*renderer.clicks.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stops_when_nothing_new() {
        let renderer = Scripted::new(vec![page(&[1, 2]), page(&[1, 2]), page(&[1, 2, 3])]);
        let state = collect_interactive(&renderer, &target(6), &CancellationToken::new()).await;
        assert_eq!(state.threads.len(), 2);
        assert_eq!(*renderer.clicks.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_respects_trigger_bound() {
        let pages: Vec<String> = (1..=10).map(|n| page(&(1..=n).collect::<Vec<_>>())).collect();
        let renderer = Scripted::new(pages);
        let state = collect_interactive(&renderer, &target(3), &CancellationToken::new()).await;
        assert_eq!(*renderer.clicks.lock().unwrap(), 3);
        assert_eq!(state.threads.len(), 4);
    }

    #[test]
    fn test_click_script_embeds_selectors() {
        let script = click_script(&[".more".to_string(), "a[class*='more']".to_string()]);
        assert!(script.contains(r#"[".more","a[class*='more']"]"#));
        assert!(script.contains("btn.click()"));
    }
}
