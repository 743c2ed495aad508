//! URL extraction
//!
//! Tokens that look like URLs (`www.`, `http://`, `https://`) are handed to a
//! [`UrlExtractor`]. The default [`UrlTools`] implementation relies on the
//! `url` crate for parsing and canonicalization.

use crate::error::{Error, Result};
use url::Url;

/// Structured form of a URL found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// Canonical form, used as the storage key
    pub url: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
}

/// Turns a URL-like token into a [`UrlRecord`].
pub trait UrlExtractor {
    /// Returns `None` when the token is not a usable URL.
    fn extract(&self, token: &str) -> Option<UrlRecord>;
}

/// Default extractor for http(s) links.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlTools;

impl UrlTools {
    pub fn new() -> Self {
        Self
    }

    /// Parse a token into a [`UrlRecord`].
    ///
    /// Tokens starting with `www.` are treated as `http://` links.
    pub fn parse(&self, token: &str) -> Result<UrlRecord> {
        let candidate = if token
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("www."))
        {
            format!("http://{}", token)
        } else {
            token.to_string()
        };

        let parsed =
            Url::parse(&candidate).map_err(|e| Error::Url(format!("{}: {}", token, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Url(format!("unsupported scheme: {}", parsed.scheme())));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Url(format!("missing host: {}", token)))?
            .to_string();

        Ok(UrlRecord {
            url: parsed.as_str().to_string(),
            scheme: parsed.scheme().to_string(),
            host,
            path: parsed.path().to_string(),
        })
    }
}

impl UrlExtractor for UrlTools {
    fn extract(&self, token: &str) -> Option<UrlRecord> {
        self.parse(token).ok()
    }
}
