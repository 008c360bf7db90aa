//! Headless Chrome/Chromium implementation of the page driver.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tracing::{debug, error, info};

use crate::browser::PageDriver;
use crate::config::Config;

/// Default viewport width in pixels.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

/// Default viewport height in pixels.
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 900;

/// A launched browser with one page dedicated to the harvest run.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
}

impl ChromiumDriver {
    /// Launch the browser, inject session cookies, and open the harvest page.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched or the cookies
    /// cannot be applied.
    pub async fn launch(config: &Config, cookies: Vec<CookieParam>) -> Result<Self> {
        info!(headless = config.headless, "Launching browser");

        let mut config_builder = BrowserConfig::builder()
            .window_size(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
            .request_timeout(config.page_load_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--mute-audio")
            .arg("--hide-scrollbars");

        if config.headless {
            config_builder = config_builder.arg("--headless=new");
        } else {
            config_builder = config_builder.with_head();
        }

        if let Some(ref chrome_path) = config.chrome_path {
            config_builder = config_builder.chrome_executable(chrome_path);
        }

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        // Spawn handler in background
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create page")?;

        let cookie_count = cookies.len();
        page.set_cookies(cookies)
            .await
            .context("Failed to apply session cookies")?;
        info!(count = cookie_count, "Session cookies applied");

        Ok(Self { browser, page })
    }

    /// Shutdown the browser gracefully.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.page.close().await {
            debug!("Failed to close page: {e}");
        }
        if let Err(e) = self.browser.close().await {
            error!("Failed to close browser: {e}");
        } else {
            info!("Browser shutdown complete");
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        Ok(())
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.page.wait_for_navigation())
            .await
            .context("Page load timed out")?
            .context("Navigation failed")?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("Failed to read current URL")?;
        Ok(url.unwrap_or_default())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .context("Failed to snapshot page content")
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .context("Failed to scroll")?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("No element matching '{selector}'"))?;
        element
            .click()
            .await
            .with_context(|| format!("Failed to click '{selector}'"))?;
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
