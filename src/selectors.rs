//! Candidate selector lists and the first-non-empty resolution cascade.
//!
//! The saved-posts page renders posts with several markup variants, and the
//! class names churn between deployments. Each semantic field therefore has an
//! ordered list of candidate selectors, tried until one yields a non-empty
//! value. Callers must tolerate an empty result for every field.

use scraper::{ElementRef, Selector};

/// Candidate containers for a single post.
pub const POST_CONTAINERS: &[&str] = &[
    r#"[data-testid="post"]"#,
    "article",
    r#"[role="article"]"#,
    r#"div[data-pressable-container="true"]"#,
];

pub const USERNAME: &[&str] = &[
    r#"a[href^="/@"]"#,
    r#"[data-testid="username"]"#,
    ".x1i10hfl.xjbqb8w.x1ejq31n.xd10rxx",
];

pub const DISPLAY_NAME: &[&str] = &[
    r#"[data-testid="username"]"#,
    ".x1i10hfl.xjbqb8w.x1ejq31n.xd10rxx span",
    "h3",
    "h4",
];

pub const CONTENT: &[&str] = &[
    r#"span[dir="auto"]"#,
    r#"[data-testid="post-text"]"#,
    r#"[data-testid="text-post-content"]"#,
    r#"div[dir="auto"]"#,
    "div > span",
];

pub const TIMESTAMP: &[&str] = &["time", "[datetime]", r#"a[href*="/post/"] time"#];

/// Permalink anchor inside a post container.
pub const POST_LINK: &str = r#"a[href*="/post/"]"#;

/// Fallback anchor pattern when no permalink anchor is present.
pub const FALLBACK_LINK: &str = r#"a[href*="threads.com"]"#;

/// Marker distinguishing real post containers from chrome elements that
/// happen to reuse the same container classes.
pub const CONTENT_MARKER: &str = r#"span[dir="auto"]"#;

/// Resolve a field by trying each candidate selector in order.
///
/// For the first selector that matches a descendant, returns the named
/// attribute value (when `attribute` is given) or the trimmed inner text.
/// A selector whose match yields an empty value does not win; the cascade
/// moves on. Returns an empty string when no candidate produces anything.
/// Selector strings that fail to parse are skipped.
#[must_use]
pub fn resolve_first(element: ElementRef<'_>, selectors: &[&str], attribute: Option<&str>) -> String {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(found) = element.select(&selector).next() {
            let value = match attribute {
                Some(name) => found.value().attr(name).unwrap_or_default().to_string(),
                None => inner_text(found),
            };
            if !value.is_empty() {
                return value;
            }
        }
    }
    String::new()
}

/// Concatenated, trimmed text of an element's text nodes.
#[must_use]
pub fn inner_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
