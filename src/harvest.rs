//! The scroll-driven harvest loop.
//!
//! Each round snapshots the page, extracts every recognizable post container,
//! and classifies the records against the in-run seen-set and the prior
//! archive's identity set. Termination has no definitive end-of-feed signal;
//! the loop stops on a streak of rounds that produced nothing new, or on the
//! round ceiling, or when the page structure is not recognized at all.

use std::collections::HashSet;

use anyhow::{Context, Result};
use scraper::Html;
use tracing::{debug, info, warn};

use crate::browser::PageDriver;
use crate::config::Config;
use crate::extract::{collect_post_containers, extract_post, ExtractOptions};
use crate::model::Post;
use crate::store::ArchiveStore;

/// Why the harvest loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The feed stopped producing anything unseen for the configured streak.
    ExhaustedNoNew,
    /// Smart mode: the feed saturated with posts already in the archive.
    HitExisting,
    /// The round ceiling was reached before the feed ran dry.
    MaxScrollsReached,
    /// No post containers matched any selector; the markup has likely changed.
    NoContainersFound,
}

/// Result of a completed harvest run.
#[derive(Debug)]
pub struct HarvestOutcome {
    pub new_posts: Vec<Post>,
    pub existing_hits: usize,
    pub discarded: usize,
    pub rounds: usize,
    pub stop_reason: StopReason,
}

/// Long-lived loop state: the seen-set and the output accumulator survive
/// across rounds and checkpoints.
struct HarvestSession {
    seen_ids: HashSet<String>,
    output: Vec<Post>,
    existing_ids: Option<HashSet<String>>,
    existing_hits: usize,
    discarded: usize,
}

impl HarvestSession {
    fn new(existing_ids: Option<HashSet<String>>) -> Self {
        Self {
            seen_ids: HashSet::new(),
            output: Vec::new(),
            existing_ids,
            existing_hits: 0,
            discarded: 0,
        }
    }

    fn is_smart_mode(&self) -> bool {
        self.existing_ids.is_some()
    }

    fn is_existing(&self, id: &str) -> bool {
        self.existing_ids
            .as_ref()
            .is_some_and(|ids| ids.contains(id))
    }
}

/// Counts for a single scroll round.
struct RoundStats {
    containers: usize,
    appended: usize,
    existing: usize,
}

/// Run the harvest loop against an already-navigated saved-posts page.
///
/// Supplying `existing_ids` enables smart mode: posts already in the archive
/// are counted but not re-collected, and the loop ends once the feed
/// saturates with them. Checkpoints flush accumulated posts through `store`
/// every `save_interval` rounds so an interrupted run loses at most one
/// interval's worth of work.
///
/// # Errors
///
/// Returns an error only for page-level failures (a snapshot that cannot be
/// taken, a scroll that cannot be issued). Per-container extraction failures
/// and checkpoint write failures are absorbed and counted.
pub async fn run_harvest<P: PageDriver + ?Sized>(
    page: &P,
    config: &Config,
    existing_ids: Option<HashSet<String>>,
    store: &ArchiveStore,
) -> Result<HarvestOutcome> {
    let opts = ExtractOptions::from_config(config).context("Invalid base URL")?;
    let mut session = HarvestSession::new(existing_ids.filter(|ids| !ids.is_empty()));

    let max_scrolls = if session.is_smart_mode() {
        info!(
            existing = session.existing_ids.as_ref().map_or(0, HashSet::len),
            "Smart mode: will stop once the feed saturates with archived posts"
        );
        config.smart_mode_max_scrolls
    } else {
        info!("Full mode: will crawl until the feed runs dry");
        config.full_mode_max_scrolls
    };

    // Let client-side rendering settle before the first extraction pass.
    page.wait(config.initial_wait).await;

    let mut empty_rounds = 0usize;
    let mut rounds = 0usize;
    let mut stop_reason = StopReason::MaxScrollsReached;

    for round in 0..max_scrolls {
        rounds = round + 1;

        let html = page.content().await.context("Failed to snapshot page")?;
        let stats = process_round(&html, &mut session, &opts);

        if stats.containers == 0 {
            warn!("No post containers found - page structure may have changed");
            stop_reason = StopReason::NoContainersFound;
            break;
        }

        info!(
            round = rounds,
            new = stats.appended,
            existing = stats.existing,
            total = session.output.len(),
            "Scroll round complete"
        );

        // Existing-hits count as "not new" here: in smart mode the streak is
        // what eventually ends the run, not the hits themselves.
        if stats.appended == 0 {
            empty_rounds += 1;
            if empty_rounds >= config.no_new_posts_limit {
                stop_reason = if session.is_smart_mode() && session.existing_hits > 0 {
                    StopReason::HitExisting
                } else {
                    StopReason::ExhaustedNoNew
                };
                info!(
                    streak = empty_rounds,
                    "No new posts in the last {} rounds, stopping",
                    config.no_new_posts_limit
                );
                break;
            }
        } else {
            empty_rounds = 0;
        }

        page.scroll_to_bottom().await.context("Failed to scroll")?;
        page.wait(config.scroll_wait).await;

        // Safety flush, not a loop boundary: the seen-set and accumulator
        // carry on unchanged.
        if rounds % config.save_interval == 0 && !session.output.is_empty() {
            match store.save_merged(&session.output).await {
                Ok(summary) => debug!(total = summary.total, "Checkpoint saved"),
                Err(e) => warn!("Checkpoint save failed (will retry at next flush): {e}"),
            }
        }
    }

    info!(
        rounds,
        new = session.output.len(),
        existing_hits = session.existing_hits,
        discarded = session.discarded,
        reason = ?stop_reason,
        "Harvest finished"
    );

    Ok(HarvestOutcome {
        new_posts: session.output,
        existing_hits: session.existing_hits,
        discarded: session.discarded,
        rounds,
        stop_reason,
    })
}

/// Parse one snapshot and fold its containers into the session.
fn process_round(html: &str, session: &mut HarvestSession, opts: &ExtractOptions) -> RoundStats {
    let document = Html::parse_document(html);
    let containers = collect_post_containers(&document);

    let mut stats = RoundStats {
        containers: containers.len(),
        appended: 0,
        existing: 0,
    };

    for container in containers {
        let Some(post) = extract_post(container, opts) else {
            session.discarded += 1;
            debug!("Container yielded no usable record");
            continue;
        };

        if session.seen_ids.contains(&post.id) {
            continue;
        }

        if session.is_existing(&post.id) {
            debug!(id = %post.id, "Found existing post");
            stats.existing += 1;
            session.existing_hits += 1;
            session.seen_ids.insert(post.id);
            continue;
        }

        session.seen_ids.insert(post.id.clone());
        session.output.push(post);
        stats.appended += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ExtractOptions {
        ExtractOptions::from_config(&Config::for_testing()).unwrap()
    }

    fn post_html(id: &str) -> String {
        format!(
            r#"<article>
                <a href="/@user/post/{id}">link</a>
                <span dir="auto">post {id} content long enough to qualify</span>
            </article>"#
        )
    }

    fn page_with(ids: &[&str]) -> String {
        let posts: String = ids.iter().map(|id| post_html(id)).collect();
        format!("<html><body>{posts}</body></html>")
    }

    #[test]
    fn test_round_skips_posts_seen_in_run() {
        let mut session = HarvestSession::new(None);
        let html = page_with(&["1", "2"]);

        let stats = process_round(&html, &mut session, &opts());
        assert_eq!(stats.appended, 2);

        // Same snapshot again: nothing new.
        let stats = process_round(&html, &mut session, &opts());
        assert_eq!(stats.appended, 0);
        assert_eq!(session.output.len(), 2);
    }

    #[test]
    fn test_round_counts_existing_hits_without_collecting() {
        let existing: HashSet<String> = ["1".to_string()].into();
        let mut session = HarvestSession::new(Some(existing));

        let stats = process_round(&page_with(&["1", "2"]), &mut session, &opts());
        assert_eq!(stats.appended, 1);
        assert_eq!(stats.existing, 1);
        assert_eq!(session.output.len(), 1);
        assert_eq!(session.output[0].id, "2");

        // An existing-hit is still added to the seen-set: the next round
        // does not count it twice.
        let stats = process_round(&page_with(&["1", "2"]), &mut session, &opts());
        assert_eq!(stats.existing, 0);
    }

    #[test]
    fn test_round_counts_discarded_containers() {
        let mut session = HarvestSession::new(None);
        // Passes container filtering via the content marker, but yields no
        // id, no qualifying text, and no media.
        let html = r#"<html><body><article><span dir="auto">hi</span></article></body></html>"#;

        let stats = process_round(html, &mut session, &opts());
        assert_eq!(stats.containers, 1);
        assert_eq!(stats.appended, 0);
        assert_eq!(session.discarded, 1);
    }
}
