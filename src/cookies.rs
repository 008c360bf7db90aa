//! Session-cookie loading.
//!
//! Cookies are exported from a logged-in browser session into a JSON array.
//! They are the only credential the harvester consumes; a missing or
//! malformed file is a hard startup failure.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookies file not found: {0} (export cookies from a logged-in browser session)")]
    NotFound(PathBuf),
    #[error("failed to read cookies file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse cookies file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cookies file {0} contains no cookies")]
    Empty(PathBuf),
}

/// One cookie as exported by browser devtools or a cookie extension.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, alias = "expirationDate")]
    pub expires: Option<f64>,
    #[serde(default, alias = "httpOnly")]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
    #[serde(default, alias = "sameSite")]
    pub same_site: Option<String>,
}

/// Load and parse the cookies file.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, malformed, or empty.
pub async fn load_cookies(path: &Path) -> Result<Vec<StoredCookie>, CookieError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CookieError::NotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(CookieError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let cookies: Vec<StoredCookie> =
        serde_json::from_slice(&bytes).map_err(|e| CookieError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    if cookies.is_empty() {
        return Err(CookieError::Empty(path.to_path_buf()));
    }

    Ok(cookies)
}

/// Convert stored cookies into CDP cookie parameters.
///
/// Cookies without a domain get `default_domain` so CDP can scope them.
///
/// # Errors
///
/// Returns an error if a cookie cannot be expressed as a CDP parameter.
pub fn to_cookie_params(cookies: &[StoredCookie], default_domain: &str) -> Result<Vec<CookieParam>> {
    let mut params = Vec::with_capacity(cookies.len());

    for cookie in cookies {
        let mut builder = CookieParam::builder()
            .name(cookie.name.clone())
            .value(cookie.value.clone())
            .domain(
                cookie
                    .domain
                    .clone()
                    .unwrap_or_else(|| default_domain.to_string()),
            )
            .path(cookie.path.clone().unwrap_or_else(|| "/".to_string()));

        if let Some(expires) = cookie.expires {
            builder = builder.expires(TimeSinceEpoch::new(expires));
        }
        if let Some(http_only) = cookie.http_only {
            builder = builder.http_only(http_only);
        }
        if let Some(secure) = cookie.secure {
            builder = builder.secure(secure);
        }
        if let Some(ref same_site) = cookie.same_site {
            match parse_same_site(same_site) {
                Some(value) => builder = builder.same_site(value),
                None => {
                    warn!(name = %cookie.name, same_site = %same_site, "Unknown sameSite value, skipping attribute");
                }
            }
        }

        let param = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid cookie '{}': {e}", cookie.name))?;
        params.push(param);
    }

    Ok(params)
}

fn parse_same_site(value: &str) -> Option<CookieSameSite> {
    match value.to_lowercase().as_str() {
        "strict" => Some(CookieSameSite::Strict),
        "lax" => Some(CookieSameSite::Lax),
        "none" | "no_restriction" => Some(CookieSameSite::None),
        _ => None,
    }
}

/// The registrable domain cookies default to, derived from the base URL.
#[must_use]
pub fn default_cookie_domain(base_url: &str) -> String {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .map(|h| format!(".{h}"))
        .unwrap_or_default()
}
