use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Source site
    pub base_url: String,
    pub saved_posts_url: String,

    // Files
    pub archive_path: PathBuf,
    pub cookies_path: PathBuf,
    /// Number of archive backups to keep. Zero keeps all of them.
    pub backup_retention: usize,

    // Browser
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub page_load_timeout: Duration,
    pub initial_wait: Duration,
    pub scroll_wait: Duration,
    pub ui_interaction_wait: Duration,

    // Harvest policy
    pub smart_mode_max_scrolls: usize,
    pub full_mode_max_scrolls: usize,
    pub no_new_posts_limit: usize,
    pub save_interval: usize,

    // Extraction
    pub min_content_length: usize,
    pub excluded_media_keywords: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable has an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_or_default("BASE_URL", "https://www.threads.com");
        let default_saved = format!("{}/saved", base_url.trim_end_matches('/'));

        Ok(Self {
            saved_posts_url: env_or_default("SAVED_POSTS_URL", &default_saved),
            base_url,

            archive_path: PathBuf::from(env_or_default("ARCHIVE_PATH", "./public/posts.json")),
            cookies_path: PathBuf::from(env_or_default("COOKIES_PATH", "./cookies.json")),
            backup_retention: parse_env_usize("BACKUP_RETENTION", 10)?,

            headless: parse_env_bool("BROWSER_HEADLESS", true)?,
            chrome_path: optional_env("CHROME_PATH"),
            page_load_timeout: Duration::from_millis(parse_env_u64("PAGE_LOAD_TIMEOUT_MS", 10_000)?),
            initial_wait: Duration::from_millis(parse_env_u64("INITIAL_WAIT_MS", 3_000)?),
            scroll_wait: Duration::from_millis(parse_env_u64("SCROLL_WAIT_MS", 4_000)?),
            ui_interaction_wait: Duration::from_millis(parse_env_u64("UI_WAIT_MS", 1_000)?),

            smart_mode_max_scrolls: parse_env_usize("SMART_MODE_MAX_SCROLLS", 50)?,
            full_mode_max_scrolls: parse_env_usize("FULL_MODE_MAX_SCROLLS", 100)?,
            no_new_posts_limit: parse_env_usize("NO_NEW_POSTS_LIMIT", 20)?,
            save_interval: parse_env_usize("SAVE_INTERVAL", 10)?,

            min_content_length: parse_env_usize("MIN_CONTENT_LENGTH", 10)?,
            excluded_media_keywords: parse_keyword_list(&env_or_default(
                "EXCLUDED_MEDIA_KEYWORDS",
                "icon,logo,button,avatar",
            )),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "BASE_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.base_url),
            });
        }
        if url::Url::parse(&self.saved_posts_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "SAVED_POSTS_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.saved_posts_url),
            });
        }
        if self.no_new_posts_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "NO_NEW_POSTS_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.save_interval == 0 {
            return Err(ConfigError::InvalidValue {
                name: "SAVE_INTERVAL".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.smart_mode_max_scrolls == 0 || self.full_mode_max_scrolls == 0 {
            return Err(ConfigError::InvalidValue {
                name: "SMART_MODE_MAX_SCROLLS / FULL_MODE_MAX_SCROLLS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// A configuration suitable for tests: real defaults but zero waits,
    /// so loop tests run instantly against a scripted page driver.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            base_url: "https://www.threads.com".to_string(),
            saved_posts_url: "https://www.threads.com/saved".to_string(),
            archive_path: PathBuf::from("./posts.json"),
            cookies_path: PathBuf::from("./cookies.json"),
            backup_retention: 0,
            headless: true,
            chrome_path: None,
            page_load_timeout: Duration::from_millis(100),
            initial_wait: Duration::ZERO,
            scroll_wait: Duration::ZERO,
            ui_interaction_wait: Duration::ZERO,
            smart_mode_max_scrolls: 50,
            full_mode_max_scrolls: 100,
            no_new_posts_limit: 20,
            save_interval: 10,
            min_content_length: 10,
            excluded_media_keywords: vec![
                "icon".to_string(),
                "logo".to_string(),
                "button".to_string(),
                "avatar".to_string(),
            ],
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_keyword_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
