//! Identity resolution and conflict detection for synced book records.
//!
//! The free functions at the crate root use the default configuration. Build a
//! [`ConflictDetectionEngine`] from a [`shelfsync_core::ShelfsyncConfig`] for
//! anything else.

pub mod conflict;
pub mod engine;
pub mod error;
pub mod identity;
pub mod script;
pub mod similarity;

use once_cell::sync::Lazy;
use shelfsync_core::BookRecord;

pub use conflict::{
    ConflictDetails, ConflictDetector, ConflictRecord, DetectorKind, ProgressConflictDetector,
    Severity, TagConflictDetector, TitleConflictDetector,
};
pub use engine::{BatchOptions, ConflictDetectionEngine, DetectorSet, GroupConflict, IdentityGroup};
pub use error::{ReconcileError, Result};
pub use identity::{Identity, IdentitySource, StableIdResolver};

static RESOLVER: Lazy<StableIdResolver> = Lazy::new(StableIdResolver::default);
static PROGRESS: Lazy<ProgressConflictDetector> = Lazy::new(ProgressConflictDetector::default);
static TAGS: Lazy<TagConflictDetector> = Lazy::new(TagConflictDetector::default);
static TITLE: Lazy<TitleConflictDetector> = Lazy::new(TitleConflictDetector::default);
static ENGINE: Lazy<ConflictDetectionEngine> = Lazy::new(ConflictDetectionEngine::default);

pub fn resolve_identity(
    reader_link_id: Option<&str>,
    title: Option<&str>,
    cover_url: Option<&str>,
) -> Identity {
    RESOLVER.resolve(reader_link_id, title, cover_url)
}

pub fn detect_progress_conflict(left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
    PROGRESS.detect(left, right)
}

pub fn detect_tag_conflict(left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
    TAGS.detect(left, right)
}

pub fn detect_title_conflict(left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
    TITLE.detect(left, right)
}

pub async fn detect_batch(
    left: &[BookRecord],
    right: &[BookRecord],
    options: &BatchOptions,
) -> Vec<ConflictRecord> {
    ENGINE.detect_batch(left, right, options).await
}
