use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use threads_saved_archiver::browser::chromium::ChromiumDriver;
use threads_saved_archiver::browser::{self, PageDriver};
use threads_saved_archiver::config::Config;
use threads_saved_archiver::cookies;
use threads_saved_archiver::harvest::{self, HarvestOutcome};
use threads_saved_archiver::store::ArchiveStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    init_tracing()?;

    info!("Starting threads-saved-archiver");

    // Load and validate configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        archive = %config.archive_path.display(),
        saved_url = %config.saved_posts_url,
        "Configuration loaded"
    );

    // Session cookies are the only credential; refusing to start without
    // them beats harvesting a logged-out page.
    let cookies = cookies::load_cookies(&config.cookies_path)
        .await
        .context("Failed to load session cookies")?;
    let cookie_params = cookies::to_cookie_params(
        &cookies,
        &cookies::default_cookie_domain(&config.base_url),
    )?;
    info!(count = cookies.len(), "Loaded session cookies");

    // Ensure the archive directory exists
    if let Some(parent) = config.archive_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create archive directory: {}", parent.display())
        })?;
    }

    let store = ArchiveStore::new(config.archive_path.clone(), config.backup_retention);
    let existing = store.load().await.context("Failed to load archive")?;
    let existing_ids: HashSet<String> = existing.iter().map(|p| p.id.clone()).collect();
    info!(existing = existing.len(), "Loaded existing archive");

    let driver = ChromiumDriver::launch(&config, cookie_params)
        .await
        .context("Failed to launch browser")?;

    // Any navigation or harvest failure still shuts the browser down.
    let outcome = run_harvest(&driver, &config, existing_ids, &store).await;
    driver.shutdown().await;
    let outcome = outcome?;

    if outcome.new_posts.is_empty() {
        info!("No new posts found");
    } else {
        let summary = store
            .save_merged(&outcome.new_posts)
            .await
            .context("Failed to save harvested posts")?;
        info!(
            added = summary.added,
            total = summary.total,
            "Archive updated"
        );
    }

    info!(
        new = outcome.new_posts.len(),
        existing_hits = outcome.existing_hits,
        discarded = outcome.discarded,
        rounds = outcome.rounds,
        reason = ?outcome.stop_reason,
        "Run complete"
    );

    Ok(())
}

async fn run_harvest<P: PageDriver + ?Sized>(
    page: &P,
    config: &Config,
    existing_ids: HashSet<String>,
    store: &ArchiveStore,
) -> Result<HarvestOutcome> {
    browser::navigate_to_saved(page, config)
        .await
        .context("Navigation failed")?;

    let existing_ids = (!existing_ids.is_empty()).then_some(existing_ids);
    harvest::run_harvest(page, config, existing_ids, store).await
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,threads_saved_archiver=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
