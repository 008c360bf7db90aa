//! Mapping from a DOM post container to a structured [`Post`] record.
//!
//! Extraction is best-effort: a missing optional field is normal, not an
//! error. Only a container that yields neither a permalink, nor text, nor
//! media is rejected.

use chrono::{SecondsFormat, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::Config;
use crate::model::{synthetic_id, Author, MediaItem, MediaKind, Post};
use crate::selectors::{
    self, inner_text, resolve_first, CONTENT_MARKER, FALLBACK_LINK, POST_LINK,
};

/// Extraction knobs derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub base_url: Url,
    pub min_content_length: usize,
    pub excluded_media_keywords: Vec<String>,
}

impl ExtractOptions {
    /// # Errors
    ///
    /// Returns an error if the configured base URL does not parse.
    pub fn from_config(config: &Config) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            min_content_length: config.min_content_length,
            excluded_media_keywords: config.excluded_media_keywords.clone(),
        })
    }
}

/// Collect the post containers on the current page snapshot.
///
/// Tries each container selector in order and takes the first that matches
/// anything, then drops containers that carry neither a permalink anchor nor
/// a content span. Those are chrome elements reusing the post classes.
///
/// An empty result means the page structure was not recognized at all.
#[must_use]
pub fn collect_post_containers(document: &Html) -> Vec<ElementRef<'_>> {
    let Some(post_link) = parse_selector(POST_LINK) else {
        return Vec::new();
    };
    let Some(marker) = parse_selector(CONTENT_MARKER) else {
        return Vec::new();
    };

    for raw in selectors::POST_CONTAINERS {
        let Some(selector) = parse_selector(raw) else {
            continue;
        };
        let all: Vec<ElementRef<'_>> = document.select(&selector).collect();
        if all.is_empty() {
            continue;
        }
        return all
            .into_iter()
            .filter(|el| {
                el.select(&post_link).next().is_some() || el.select(&marker).next().is_some()
            })
            .collect();
    }

    Vec::new()
}

/// Extract a structured record from one post container.
///
/// Returns `None` only when the container carries no permalink, no qualifying
/// text, and no media. Posts without a resolvable permalink get a stable
/// content-derived synthetic id.
#[must_use]
pub fn extract_post(container: ElementRef<'_>, opts: &ExtractOptions) -> Option<Post> {
    let (url, id) = extract_permalink(container, opts);
    let author = extract_author(container);
    let content = extract_content(container, opts);
    let media = extract_media(container, opts);
    let timestamp = resolve_first(container, selectors::TIMESTAMP, Some("datetime"));

    let id = if id.is_empty() {
        if content.is_empty() && media.is_empty() {
            return None;
        }
        synthetic_id(&author.username, &content, &timestamp)
    } else {
        id
    };

    Some(Post {
        id,
        url,
        author,
        content,
        media,
        timestamp,
        saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        categories: Vec::new(),
        keywords: Vec::new(),
    })
}

/// Resolve the post permalink and derive the id from its path.
fn extract_permalink(container: ElementRef<'_>, opts: &ExtractOptions) -> (String, String) {
    let link = select_first(container, POST_LINK)
        .or_else(|| select_first(container, FALLBACK_LINK));
    let href = link
        .and_then(|el| el.value().attr("href"))
        .unwrap_or_default();

    // Path segment after the permalink marker, query string stripped.
    let id = href
        .rsplit_once("/post/")
        .and_then(|(_, rest)| rest.split('?').next())
        .unwrap_or_default()
        .to_string();

    let url = if href.is_empty() || href.starts_with("http") {
        href.to_string()
    } else {
        opts.base_url
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    };

    (url, id)
}

fn extract_author(container: ElementRef<'_>) -> Author {
    let mut username = String::new();

    for raw in selectors::USERNAME {
        let Some(selector) = parse_selector(raw) else {
            continue;
        };
        if let Some(el) = container.select(&selector).next() {
            let text = el
                .value()
                .attr("href")
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| inner_text(el));
            if text.is_empty() {
                continue;
            }
            username = text
                .strip_prefix("/@")
                .or_else(|| text.strip_prefix('@'))
                .unwrap_or(&text)
                .to_string();
            break;
        }
    }

    let mut display_name = resolve_first(container, selectors::DISPLAY_NAME, None);
    if display_name.starts_with('@') {
        // Still a handle, not a display name.
        display_name.clear();
    }
    if display_name.is_empty() {
        display_name.clone_from(&username);
    }

    Author {
        username,
        display_name,
    }
}

/// Pick the longest qualifying text fragment.
///
/// The first content selector that yields any qualifying text wins at the
/// selector level; within its matches the longest fragment wins.
fn extract_content(container: ElementRef<'_>, opts: &ExtractOptions) -> String {
    let mut texts: Vec<String> = Vec::new();

    for raw in selectors::CONTENT {
        let Some(selector) = parse_selector(raw) else {
            continue;
        };
        for el in container.select(&selector) {
            let text = inner_text(el);
            if text.chars().count() > opts.min_content_length && !text.starts_with('@') {
                texts.push(text);
            }
        }
        if !texts.is_empty() {
            break;
        }
    }

    texts
        .into_iter()
        .max_by_key(|t| t.chars().count())
        .unwrap_or_default()
}

/// Scan images, videos, and nested video sources.
///
/// The three scans are independent and their results are concatenated without
/// cross-deduplication; overlapping selectors may produce repeats.
fn extract_media(container: ElementRef<'_>, opts: &ExtractOptions) -> Vec<MediaItem> {
    let mut media = Vec::new();

    if let Some(selector) = parse_selector("img") {
        for img in container.select(&selector) {
            if let Some(src) = img.value().attr("src") {
                if src.starts_with("http") && !is_excluded(src, &opts.excluded_media_keywords) {
                    media.push(MediaItem {
                        kind: MediaKind::Image,
                        url: src.to_string(),
                    });
                }
            }
        }
    }

    if let Some(selector) = parse_selector("video") {
        for video in container.select(&selector) {
            let src = video
                .value()
                .attr("src")
                .or_else(|| video.value().attr("poster"))
                .unwrap_or_default();
            if src.starts_with("http") {
                media.push(MediaItem {
                    kind: MediaKind::Video,
                    url: src.to_string(),
                });
            }
        }
    }

    if let Some(selector) = parse_selector("video source") {
        for source in container.select(&selector) {
            if let Some(src) = source.value().attr("src") {
                if src.starts_with("http") {
                    media.push(MediaItem {
                        kind: MediaKind::Video,
                        url: src.to_string(),
                    });
                }
            }
        }
    }

    media
}

fn is_excluded(url: &str, keywords: &[String]) -> bool {
    let lower = url.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

fn select_first<'a>(element: ElementRef<'a>, raw: &str) -> Option<ElementRef<'a>> {
    let selector = parse_selector(raw)?;
    element.select(&selector).next()
}

fn parse_selector(raw: &str) -> Option<Selector> {
    Selector::parse(raw).ok()
}
