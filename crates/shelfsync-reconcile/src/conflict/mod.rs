//! Conflict records and the detectors that produce them.

pub mod progress;
pub mod tags;
pub mod title;

use serde::Serialize;
use shelfsync_core::BookRecord;

use crate::identity::clean_text;

pub use progress::{ProgressConflictDetector, ProgressDetails};
pub use tags::{TagConflictDetector, TagDetails};
pub use title::{TitleConflictDetector, TitleDetails};

pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Longest caller-supplied text echoed into details.
pub const MAX_DETAIL_TEXT: usize = 200;
/// Longest list echoed into details.
pub const MAX_DETAIL_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Progress,
    Tags,
    Title,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorMetadata {
    pub detector_type: DetectorKind,
    pub algorithm: &'static str,
    pub version: &'static str,
    /// Position of the pair inside a batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pair_index: Option<usize>,
}

impl DetectorMetadata {
    pub fn new(detector_type: DetectorKind, algorithm: &'static str, version: &'static str) -> Self {
        Self {
            detector_type,
            algorithm,
            version,
            pair_index: None,
        }
    }
}

/// Which input of a pair a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSide {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationDetails {
    pub reason: &'static str,
    pub side: RecordSide,
    pub issues: CappedList<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictDetails {
    Progress(ProgressDetails),
    Tags(TagDetails),
    Title(TitleDetails),
    Validation(ValidationDetails),
}

/// A structured disagreement between two candidate-duplicate records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    pub severity: Severity,
    confidence: f64,
    pub details: ConflictDetails,
    pub metadata: DetectorMetadata,
}

impl ConflictRecord {
    /// Confidence is clamped into `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.
    pub fn new(
        severity: Severity,
        confidence: f64,
        details: ConflictDetails,
        metadata: DetectorMetadata,
    ) -> Self {
        Self {
            severity,
            confidence: clamp_confidence(confidence),
            details,
            metadata,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn detector(&self) -> DetectorKind {
        self.metadata.detector_type
    }

    pub fn with_pair_index(mut self, index: usize) -> Self {
        self.metadata.pair_index = Some(index);
        self
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Compares two records along one dimension.
///
/// Implementations are stateless between calls and never mutate their inputs.
/// `None` means the records agree, or one of them lacks the data to compare.
pub trait ConflictDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord>;
}

/// A list cut to [`MAX_DETAIL_ITEMS`] entries. `truncated` holds the number of
/// dropped entries when anything was cut.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CappedList<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<usize>,
}

impl<T> CappedList<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let mut items: Vec<T> = items.into_iter().collect();
        let truncated = if items.len() > MAX_DETAIL_ITEMS {
            let dropped = items.len() - MAX_DETAIL_ITEMS;
            items.truncate(MAX_DETAIL_ITEMS);
            Some(dropped)
        } else {
            None
        };
        Self { items, truncated }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Caller text made safe and bounded for inclusion in details.
pub fn detail_text(text: &str) -> String {
    clean_text(text, MAX_DETAIL_TEXT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> DetectorMetadata {
        DetectorMetadata::new(DetectorKind::Title, "test", "1.0.0")
    }

    fn details() -> ConflictDetails {
        ConflictDetails::Validation(ValidationDetails {
            reason: "validation_failure",
            side: RecordSide::Left,
            issues: CappedList::new(vec!["x".to_string()]),
        })
    }

    #[test]
    fn confidence_is_clamped() {
        let high = ConflictRecord::new(Severity::Low, 3.0, details(), metadata());
        assert_eq!(high.confidence(), 1.0);
        let low = ConflictRecord::new(Severity::Low, 0.01, details(), metadata());
        assert_eq!(low.confidence(), 0.1);
        let nan = ConflictRecord::new(Severity::Low, f64::NAN, details(), metadata());
        assert_eq!(nan.confidence(), 0.1);
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn capped_list_marks_truncation() {
        let list = CappedList::new(0..120);
        assert_eq!(list.len(), MAX_DETAIL_ITEMS);
        assert_eq!(list.truncated, Some(70));

        let short = CappedList::new(0..3);
        assert_eq!(short.truncated, None);
    }

    #[test]
    fn record_serializes_with_uppercase_severity_and_tagged_details() {
        let record = ConflictRecord::new(Severity::Medium, 0.9, details(), metadata())
            .with_pair_index(4);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["severity"], "MEDIUM");
        assert_eq!(json["details"]["kind"], "validation");
        assert_eq!(json["metadata"]["detectorType"], "title");
        assert_eq!(json["metadata"]["pairIndex"], 4);
        assert!(json["details"]["issues"].get("truncated").is_none());
    }
}
