//! Sanitization shared by identity derivation and conflict details.
//!
//! Nothing in here fails. Input that cannot be made safe collapses to an empty
//! string and the caller moves on to its next fallback.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_SANITIZE_LENGTH: usize = 50;
pub const TRUNCATION_MARKER: &str = "…[truncated]";
const MAX_URL_LENGTH: usize = 2048;

static CLOSED_SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*(script|style)\b[^>]*>.*?<\s*/\s*(script|style)\s*>").unwrap()
});

static OPEN_SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<\s*(script|style)\b.*$").unwrap());

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// A scheme only counts when something follows the colon directly, so
/// "Big Data: A Revolution" keeps its words.
static DISALLOWED_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:javascript|vbscript|data|file)\s*:(\S)").unwrap());

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").unwrap());

/// Reduce arbitrary text to a lower-case, hyphen-separated token.
///
/// Markup (including the body of `<script>`/`<style>` elements), control
/// characters and `javascript:`-style schemes are removed before anything else
/// happens. The result is at most `max_len` characters.
pub fn sanitize(text: &str, max_len: usize) -> String {
    let stripped = strip_hostile(text);

    let mut token = String::with_capacity(stripped.len());
    for c in stripped.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            token.push(c);
        } else if !token.ends_with('-') {
            token.push('-');
        }
    }

    let trimmed = token.trim_matches('-');
    truncate_chars(trimmed, max_len)
        .trim_end_matches('-')
        .to_string()
}

/// Like [`sanitize`] but case-preserving, for opaque ids.
///
/// Letters, digits, `_` and `-` survive as they are. Anything else becomes a
/// single `-`.
pub fn sanitize_opaque(text: &str, max_len: usize) -> String {
    let stripped = strip_hostile(text);

    let mut token = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        if c.is_alphanumeric() || c == '_' {
            token.push(c);
        } else if !token.ends_with('-') {
            token.push('-');
        }
    }

    let trimmed = token.trim_matches('-');
    truncate_chars(trimmed, max_len)
        .trim_end_matches('-')
        .to_string()
}

/// Only `http`/`https` URLs with a host and no traversal sequences pass.
pub fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.len() > MAX_URL_LENGTH {
        return false;
    }
    if url
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\\' | '`'))
    {
        return false;
    }

    let lower = url.to_ascii_lowercase();
    let Some(rest) = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
    else {
        return false;
    };
    if rest.is_empty() || rest.starts_with('/') {
        return false;
    }
    if ["%2e%2e", "%2e.", ".%2e", "%5c", "%00"]
        .iter()
        .any(|needle| rest.contains(needle))
    {
        return false;
    }

    let path = rest.split(['?', '#']).next().unwrap_or_default();
    !path.split('/').any(|segment| segment == ".." || segment == ".")
}

/// Make caller text safe to echo back in conflict details.
///
/// Keeps case and spacing, unlike [`sanitize`]. Text longer than `max_len`
/// characters is cut and ends with [`TRUNCATION_MARKER`].
pub fn clean_text(text: &str, max_len: usize) -> String {
    let stripped = strip_hostile(text);
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_len {
        let mut cut = truncate_chars(&collapsed, max_len).trim_end().to_string();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        collapsed
    }
}

/// First `max_len` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_len: usize) -> &str {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn strip_hostile(text: &str) -> String {
    let decoded = decode_entities(text);
    let without_blocks = CLOSED_SCRIPT_BLOCK.replace_all(&decoded, " ");
    let without_open = OPEN_SCRIPT_BLOCK.replace_all(&without_blocks, " ");
    let without_tags = TAG.replace_all(&without_open, " ");
    let without_schemes = DISALLOWED_SCHEME.replace_all(&without_tags, " ${1}");

    without_schemes
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .filter(|c| !matches!(c, '<' | '>'))
        .collect()
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
