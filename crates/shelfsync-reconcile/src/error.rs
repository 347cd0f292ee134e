use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid configuration: {0}")]
    Config(#[from] shelfsync_core::ShelfsyncError),

    #[error("invalid vocabulary: {0}")]
    Vocabulary(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
