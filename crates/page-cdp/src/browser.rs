//! Browser lifecycle: launch or connect, then attach pages.

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use page_bridge::PageError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::CdpHostPage;

/// A running Chromium plus the event loop that keeps it serviced.
pub struct CdpBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl CdpBrowser {
    /// Attach to an already running browser over its DevTools websocket.
    pub async fn connect(ws_url: &str) -> Result<Self, PageError> {
        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|err| PageError::Unreachable(err.to_string()))?;
        info!(target: "page-cdp", ws_url, "connected to browser");
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "page-cdp", error = %err, "browser event error");
                }
            }
        });
        Ok(Self { browser, handler })
    }

    /// Launch a headless browser owned by this process.
    pub async fn launch() -> Result<Self, PageError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(PageError::Unreachable)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| PageError::Unreachable(err.to_string()))?;
        info!(target: "page-cdp", "launched headless browser");
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "page-cdp", error = %err, "browser event error");
                }
            }
        });
        Ok(Self { browser, handler })
    }

    /// Open a url in a fresh tab and attach to it.
    pub async fn open(&self, url: &str) -> Result<CdpHostPage, PageError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|err| PageError::Unreachable(err.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|err| PageError::Unreachable(err.to_string()))?;
        CdpHostPage::attach(page).await
    }

    /// Attach to the first existing tab, or a blank one when none exist.
    pub async fn first_page(&self) -> Result<CdpHostPage, PageError> {
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|err| PageError::Unreachable(err.to_string()))?;
        match pages.into_iter().next() {
            Some(page) => CdpHostPage::attach(page).await,
            None => self.open("about:blank").await,
        }
    }

    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        self.handler.abort();
    }
}
