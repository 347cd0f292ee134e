pub mod normalize;
pub mod resolver;

use std::fmt;

use serde::{Serialize, Serializer};

pub use normalize::{clean_text, is_safe_url, sanitize};
pub use resolver::StableIdResolver;

/// Which signal an identity was derived from, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    Cover,
    Title,
    Reader,
}

impl IdentitySource {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Title => "title",
            Self::Reader => "reader",
        }
    }
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Grouping key for records that describe the same book: `<source>-<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    value: String,
    source: IdentitySource,
}

/// Token used when no signal survives sanitization.
pub const UNDEFINED_TOKEN: &str = "undefined";

impl Identity {
    pub(crate) fn new(source: IdentitySource, token: &str) -> Self {
        Self {
            value: format!("{}-{}", source.prefix(), token),
            source,
        }
    }

    pub(crate) fn undefined() -> Self {
        Self::new(IdentitySource::Reader, UNDEFINED_TOKEN)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }

    pub fn token(&self) -> &str {
        &self.value[self.source.prefix().len() + 1..]
    }

    /// Reader-link identities change between extraction passes and should be
    /// treated as a lower-confidence grouping key.
    pub fn is_stable(&self) -> bool {
        self.source != IdentitySource::Reader
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_parts() {
        let id = Identity::new(IdentitySource::Cover, "test123");
        assert_eq!(id.as_str(), "cover-test123");
        assert_eq!(id.token(), "test123");
        assert_eq!(id.source(), IdentitySource::Cover);
        assert!(id.is_stable());
    }

    #[test]
    fn undefined_identity_is_unstable() {
        let id = Identity::undefined();
        assert_eq!(id.to_string(), "reader-undefined");
        assert!(!id.is_stable());
    }

    #[test]
    fn identity_serializes_as_plain_string() {
        let id = Identity::new(IdentitySource::Title, "dune");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"title-dune\"");
    }
}
