//! Browser-automation capability boundary.
//!
//! The harvest engine needs only a narrow slice of a browser: load a page,
//! snapshot its HTML, scroll, and wait. DOM queries run locally over the
//! snapshot with `scraper`, so the driver stays a thin shell around CDP.

pub mod chromium;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;

/// The page operations the harvest engine is allowed to perform.
#[async_trait]
pub trait PageDriver {
    async fn navigate(&self, url: &str) -> Result<()>;
    /// Wait for the current navigation to settle, bounded by `timeout`.
    async fn wait_for_load(&self, timeout: Duration) -> Result<()>;
    async fn current_url(&self) -> Result<String>;
    /// Snapshot of the page's current HTML.
    async fn content(&self) -> Result<String>;
    async fn scroll_to_bottom(&self) -> Result<()>;
    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;
    async fn wait(&self, duration: Duration);
}

/// Navigate to the saved-posts page, verifying the session is logged in.
///
/// Goes to the homepage first: a redirect to a login URL means the cookies
/// have expired and the run must abort before touching the archive. If the
/// direct saved-posts URL does not land on a saved page, falls back to
/// clicking through the profile menu.
///
/// # Errors
///
/// Returns an error on navigation failure or an expired session.
pub async fn navigate_to_saved<P: PageDriver + ?Sized>(page: &P, config: &Config) -> Result<()> {
    info!(url = %config.base_url, "Navigating to homepage");
    page.navigate(&config.base_url).await?;
    page.wait_for_load(config.page_load_timeout).await?;

    let url = page.current_url().await?;
    if url.to_lowercase().contains("login") {
        anyhow::bail!("not logged in - session cookies appear to be expired (at {url})");
    }

    info!(url = %config.saved_posts_url, "Navigating to saved posts");
    page.navigate(&config.saved_posts_url).await?;
    page.wait_for_load(config.page_load_timeout).await?;

    let url = page.current_url().await?;
    if !url.to_lowercase().contains("saved") {
        // The direct URL no longer routes there; try the UI path.
        warn!(url = %url, "Direct saved-posts URL did not stick, clicking through UI");
        page.click(r#"[aria-label="More"]"#).await?;
        page.wait(config.ui_interaction_wait).await;
        page.click(r#"a[href*="/saved"]"#).await?;
        page.wait_for_load(config.page_load_timeout).await?;
    }

    info!("Reached saved posts page");
    Ok(())
}
