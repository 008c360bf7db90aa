//! Integration tests for the scroll-driven harvest loop, run against a
//! scripted page driver instead of a real browser.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use threads_saved_archiver::browser::PageDriver;
use threads_saved_archiver::config::Config;
use threads_saved_archiver::harvest::{run_harvest, StopReason};
use threads_saved_archiver::store::ArchiveStore;

/// A page whose content advances to the next scripted snapshot on every
/// scroll. The last snapshot repeats forever, like a feed that has stopped
/// loading anything new.
struct ScriptedFeed {
    snapshots: Vec<String>,
    position: AtomicUsize,
}

impl ScriptedFeed {
    fn new(snapshots: Vec<String>) -> Self {
        Self {
            snapshots,
            position: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedFeed {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://www.threads.com/saved".to_string())
    }

    async fn content(&self) -> Result<String> {
        let pos = self
            .position
            .load(Ordering::SeqCst)
            .min(self.snapshots.len().saturating_sub(1));
        Ok(self.snapshots.get(pos).cloned().unwrap_or_default())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.position.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn wait(&self, _duration: Duration) {}
}

fn post_html(id: &str) -> String {
    format!(
        r#"<article>
            <a href="/@user/post/{id}"><time datetime="2024-01-01T00:00:00.000Z">1d</time></a>
            <span dir="auto">saved post {id} with content long enough to qualify</span>
        </article>"#
    )
}

fn page_with(ids: &[&str]) -> String {
    let posts: String = ids.iter().map(|id| post_html(id)).collect();
    format!("<html><body>{posts}</body></html>")
}

fn test_store() -> (ArchiveStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = ArchiveStore::new(dir.path().join("posts.json"), 0);
    (store, dir)
}

#[tokio::test]
async fn smart_mode_stops_on_existing_saturation() {
    // The feed keeps serving the same mix of two new posts and one archived
    // post forever. Smart mode must stop once the empty-round streak fires,
    // well inside the round ceiling.
    let page = ScriptedFeed::new(vec![page_with(&["A", "B", "X"])]);
    let config = Config {
        no_new_posts_limit: 3,
        ..Config::for_testing()
    };
    let existing: HashSet<String> = ["X".to_string()].into();
    let (store, _dir) = test_store();

    let outcome = run_harvest(&page, &config, Some(existing), &store)
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::HitExisting);
    assert_eq!(outcome.rounds, 4); // 1 productive round + 3 empty rounds
    assert_eq!(outcome.existing_hits, 1);
    let ids: Vec<&str> = outcome.new_posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[tokio::test]
async fn full_mode_stops_at_k_plus_threshold() {
    // The feed produces new posts for two rounds and then dries up. The loop
    // must stop exactly at K + threshold rounds, not later.
    let page = ScriptedFeed::new(vec![
        page_with(&["1"]),
        page_with(&["1", "2"]),
        page_with(&["1", "2"]), // dry from here on
    ]);
    let config = Config {
        no_new_posts_limit: 4,
        ..Config::for_testing()
    };
    let (store, _dir) = test_store();

    let outcome = run_harvest(&page, &config, None, &store).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::ExhaustedNoNew);
    assert_eq!(outcome.rounds, 6); // K=2 productive + 4 empty
    assert_eq!(outcome.new_posts.len(), 2);
}

#[tokio::test]
async fn empty_round_streak_resets_on_new_post() {
    // Five empty rounds, then one round with a new post, then empty again:
    // the streak restarts from zero, so the stop comes 6 rounds after the
    // productive one.
    let mut snapshots = vec![page_with(&["a"])];
    for _ in 0..5 {
        snapshots.push(page_with(&["a"]));
    }
    snapshots.push(page_with(&["a", "b"]));
    snapshots.push(page_with(&["a", "b"]));

    let page = ScriptedFeed::new(snapshots);
    let config = Config {
        no_new_posts_limit: 6,
        ..Config::for_testing()
    };
    let (store, _dir) = test_store();

    let outcome = run_harvest(&page, &config, None, &store).await.unwrap();

    // Round 1 productive, rounds 2-6 empty (streak 5), round 7 productive
    // (streak reset), rounds 8-13 empty (streak 6) -> stop at round 13.
    assert_eq!(outcome.rounds, 13);
    assert_eq!(outcome.stop_reason, StopReason::ExhaustedNoNew);
    assert_eq!(outcome.new_posts.len(), 2);
}

#[tokio::test]
async fn unrecognized_page_structure_stops_immediately() {
    let page = ScriptedFeed::new(vec![
        "<html><body><p>the feed got a redesign</p></body></html>".to_string(),
    ]);
    let (store, _dir) = test_store();

    let outcome = run_harvest(&page, &Config::for_testing(), None, &store)
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::NoContainersFound);
    assert_eq!(outcome.rounds, 1);
    assert!(outcome.new_posts.is_empty());
}

#[tokio::test]
async fn round_ceiling_bounds_an_endless_feed() {
    // A feed that serves a fresh post every round never goes empty; the
    // ceiling is the only stop.
    let snapshots: Vec<String> = (0..10)
        .map(|n| {
            let ids: Vec<String> = (0..=n).map(|i| format!("p{i}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            page_with(&refs)
        })
        .collect();
    let page = ScriptedFeed::new(snapshots);
    let config = Config {
        full_mode_max_scrolls: 3,
        ..Config::for_testing()
    };
    let (store, _dir) = test_store();

    let outcome = run_harvest(&page, &config, None, &store).await.unwrap();

    assert_eq!(outcome.stop_reason, StopReason::MaxScrollsReached);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.new_posts.len(), 3);
}

#[tokio::test]
async fn checkpoint_flushes_mid_run() {
    // With save_interval=2, the archive on disk must already hold the posts
    // collected by round 2, even though the run continues.
    let page = ScriptedFeed::new(vec![
        page_with(&["1"]),
        page_with(&["1", "2"]),
        page_with(&["1", "2", "3"]),
        page_with(&["1", "2", "3"]),
    ]);
    let config = Config {
        save_interval: 2,
        no_new_posts_limit: 1,
        ..Config::for_testing()
    };
    let (store, _dir) = test_store();

    let outcome = run_harvest(&page, &config, None, &store).await.unwrap();
    assert_eq!(outcome.new_posts.len(), 3);

    // The checkpoint at round 2 flushed posts 1 and 2.
    let on_disk = store.load().await.unwrap();
    assert_eq!(on_disk.len(), 2);

    // The caller's final merge completes the archive without duplicates.
    let summary = store.save_merged(&outcome.new_posts).await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.added, 1);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let snapshots = vec![page_with(&["1", "2"]), page_with(&["1", "2", "3"])];

    let config = Config {
        no_new_posts_limit: 2,
        ..Config::for_testing()
    };
    let (store, _dir) = test_store();

    // First run: full mode, everything is new.
    let page = ScriptedFeed::new(snapshots.clone());
    let outcome = run_harvest(&page, &config, None, &store).await.unwrap();
    store.save_merged(&outcome.new_posts).await.unwrap();
    let first = store.load().await.unwrap();
    assert_eq!(first.len(), 3);

    // Second run over the same feed: smart mode with the archive's ids.
    let existing: HashSet<String> = first.iter().map(|p| p.id.clone()).collect();
    let page = ScriptedFeed::new(snapshots);
    let outcome = run_harvest(&page, &config, Some(existing), &store)
        .await
        .unwrap();

    assert!(outcome.new_posts.is_empty());
    assert_eq!(outcome.stop_reason, StopReason::HitExisting);

    store.save_merged(&outcome.new_posts).await.unwrap();
    let second = store.load().await.unwrap();
    assert_eq!(second, first);
}
