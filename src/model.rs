//! Archive record types.
//!
//! These structs define the JSON schema of the archive file. The downstream
//! classification stage reads and rewrites the same file, so `categories` and
//! `keywords` must round-trip untouched through harvesting runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single archived post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "post_id")]
    pub id: String,
    pub url: String,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    /// Timestamp of the post itself, as exposed by the page. Empty if the
    /// markup carried no machine-readable datetime.
    #[serde(default)]
    pub timestamp: String,
    /// Extraction wall-clock time (RFC 3339). The archive is ordered by this
    /// field, not by `timestamp`.
    pub saved_at: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl Post {
    /// A post is worth keeping only if it carries an identity, some text,
    /// or some media. Bare chrome containers fail this check.
    #[must_use]
    pub fn is_keepable(&self) -> bool {
        !self.id.is_empty() || !self.content.is_empty() || !self.media.is_empty()
    }
}

/// Derive a stable identity for a post whose permalink could not be resolved.
///
/// The hash covers the username, whitespace-normalized content, and the post
/// timestamp truncated to the minute, so repeated runs over the same
/// unresolved post converge on the same id instead of drifting.
#[must_use]
pub fn synthetic_id(username: &str, content: &str, timestamp: &str) -> String {
    let normalized: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    // "2024-01-01T12:34" - enough precision to separate distinct posts while
    // absorbing sub-minute jitter in the reported timestamp.
    let minute: String = timestamp.chars().take(16).collect();

    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized.as_bytes());
    hasher.update(b"\n");
    hasher.update(minute.as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("synthetic_{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> Post {
        Post {
            id: "ABC123".to_string(),
            url: "https://www.threads.com/@user/post/ABC123".to_string(),
            author: Author {
                username: "user".to_string(),
                display_name: "User Name".to_string(),
            },
            content: "hello world".to_string(),
            media: vec![MediaItem {
                kind: MediaKind::Image,
                url: "https://cdn.example.com/photo.jpg".to_string(),
            }],
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            saved_at: "2024-01-02T00:00:00+00:00".to_string(),
            categories: vec![],
            keywords: vec![],
        }
    }

    #[test]
    fn test_serializes_with_archive_field_names() {
        let json = serde_json::to_value(sample_post()).unwrap();
        assert_eq!(json["post_id"], "ABC123");
        assert_eq!(json["author"]["display_name"], "User Name");
        assert_eq!(json["media"][0]["type"], "image");
        assert_eq!(json["saved_at"], "2024-01-02T00:00:00+00:00");
        assert!(json["categories"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_roundtrips_classification_fields() {
        let mut post = sample_post();
        post.categories = vec!["tech".to_string()];
        post.keywords = vec!["rust".to_string(), "scraping".to_string()];

        let json = serde_json::to_string(&post).unwrap();
        let back: Post = serde_json::from_str(&json).unwrap();
        assert_eq!(back, post);
    }

    #[test]
    fn test_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "post_id": "X",
            "url": "https://www.threads.com/@u/post/X",
            "author": { "username": "u" },
            "saved_at": "2024-01-01T00:00:00+00:00"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, "X");
        assert!(post.content.is_empty());
        assert!(post.media.is_empty());
        assert!(post.categories.is_empty());
    }

    #[test]
    fn test_keepable() {
        let mut post = sample_post();
        assert!(post.is_keepable());

        post.id.clear();
        post.content.clear();
        assert!(post.is_keepable()); // still has media

        post.media.clear();
        assert!(!post.is_keepable());
    }

    #[test]
    fn test_synthetic_id_is_deterministic() {
        let a = synthetic_id("user", "some  content\nhere", "2024-01-01T12:34:56.000Z");
        let b = synthetic_id("user", "some content here", "2024-01-01T12:34:01.999Z");
        // Whitespace normalization and minute truncation make these converge.
        assert_eq!(a, b);
        assert!(a.starts_with("synthetic_"));
    }

    #[test]
    fn test_synthetic_id_differs_per_content() {
        let a = synthetic_id("user", "first post", "");
        let b = synthetic_id("user", "second post", "");
        let c = synthetic_id("other", "first post", "");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
