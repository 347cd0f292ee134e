use once_cell::sync::Lazy;
use regex::Regex;
use shelfsync_core::{BookRecord, IdentityConfig};
use tracing::debug;

use super::normalize::{is_safe_url, sanitize, sanitize_opaque, truncate_chars};
use super::{Identity, IdentitySource};

/// `…/cover/<bucket>/<token>_<W>x<H>.<ext>[?query]`
static COVER_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://[^/?#]+(?:/[^?#]*)?/cover/[^/?#]+/([A-Za-z0-9][A-Za-z0-9_-]*)_(\d{1,5})x(\d{1,5})\.(?:jpe?g|png|webp|gif)(?:\?[^#]*)?(?:#.*)?$",
    )
    .unwrap()
});

/// Derives one identity per record from three ranked signals.
///
/// 1. cover CDN token (`cover-…`)
/// 2. normalized title (`title-…`)
/// 3. reader link id (`reader-…`, unstable)
///
/// and finally `reader-undefined`. The first tier that yields a non-empty
/// token wins. Resolution never fails and depends only on its arguments.
#[derive(Debug, Clone)]
pub struct StableIdResolver {
    max_token_length: usize,
}

impl Default for StableIdResolver {
    fn default() -> Self {
        Self::new(&IdentityConfig::default())
    }
}

impl StableIdResolver {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            max_token_length: config.max_token_length.max(1),
        }
    }

    pub fn resolve(
        &self,
        reader_link_id: Option<&str>,
        title: Option<&str>,
        cover_url: Option<&str>,
    ) -> Identity {
        if let Some(token) = cover_url.and_then(|url| self.cover_token(url)) {
            return Identity::new(IdentitySource::Cover, &token);
        }

        if let Some(token) = title
            .map(|t| sanitize(t, self.max_token_length))
            .filter(|t| !t.is_empty())
        {
            return Identity::new(IdentitySource::Title, &token);
        }

        if let Some(token) = reader_link_id
            .map(|id| sanitize_opaque(id, self.max_token_length))
            .filter(|id| !id.is_empty())
        {
            debug!(token = %token, "identity fell back to reader link");
            return Identity::new(IdentitySource::Reader, &token);
        }

        Identity::undefined()
    }

    pub fn resolve_record(&self, record: &BookRecord) -> Identity {
        self.resolve(
            record.reader_link_id.as_deref(),
            record.title.as_deref(),
            record.cover_url.as_deref(),
        )
    }

    /// Token embedded in a cover CDN URL, if the URL is safe and matches the
    /// expected path layout.
    pub fn cover_token(&self, url: &str) -> Option<String> {
        let url = url.trim();
        if !is_safe_url(url) {
            return None;
        }
        let captures = COVER_PATH.captures(url)?;
        let token = captures.get(1)?.as_str();
        Some(truncate_chars(token, self.max_token_length).to_string())
    }
}
