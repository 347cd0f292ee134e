use thiserror::Error;

/// All errors that can occur in shelfsync-core.
#[derive(Debug, Error)]
pub enum ShelfsyncError {
    #[error("Invalid threshold `{name}`: {reason}")]
    InvalidThreshold { name: &'static str, reason: String },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ShelfsyncError>;
