//! Book records, configuration and the tag vocabulary shared by the shelfsync crates.

pub mod config;
pub mod error;
pub mod models;
pub mod vocabulary;

pub use config::{
    BatchConfig, IdentityConfig, ProgressConfig, ProgressThresholds, ShelfsyncConfig, TagConfig,
    TitleConfig,
};
pub use error::{Result, ShelfsyncError};
pub use models::*;
pub use vocabulary::TagVocabulary;
