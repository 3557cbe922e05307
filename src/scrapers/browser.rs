//! Headless Chrome page renderer.
//!
//! Drives a real browser over CDP (chromiumoxide) for boards whose listing
//! only grows when a "more" button is clicked.

use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::configurable::{PageRenderer, RenderError};
use crate::config::BrowserSettings;

/// A [`PageRenderer`] backed by one Chrome tab.
pub struct BrowserRenderer {
    browser: Mutex<Browser>,
    page: Mutex<Option<Page>>,
    handler: JoinHandle<()>,
}

impl BrowserRenderer {
    /// Launch Chrome.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, RenderError> {
        info!("Launching browser (headless={})", settings.headless);

        let mut builder = BrowserConfig::builder();
        if let Some(ref path) = settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &settings.args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(RenderError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            page: Mutex::new(None),
            handler,
        })
    }

    async fn page(&self) -> Result<Page, RenderError> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or_else(|| RenderError::Content("no page open".to_string()))
    }

    /// Close the browser and stop its event handler.
    pub async fn close(self) {
        if let Err(e) = self.browser.lock().await.close().await {
            debug!("Browser close failed: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl PageRenderer for BrowserRenderer {
    async fn open(&self, url: &str) -> Result<(), RenderError> {
        info!("Navigating to {}", url);
        let page = self
            .browser
            .lock()
            .await
            .new_page(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if let Err(e) = page.wait_for_navigation().await {
            warn!("Navigation to {} did not settle: {}", url, e);
        }
        if let Some(old) = self.page.lock().await.replace(page) {
            let _ = old.close().await;
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, RenderError> {
        let page = self.page().await?;
        let result = page
            .evaluate(script.to_string())
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn current_markup(&self) -> Result<String, RenderError> {
        self.page()
            .await?
            .content()
            .await
            .map_err(|e| RenderError::Content(e.to_string()))
    }
}
