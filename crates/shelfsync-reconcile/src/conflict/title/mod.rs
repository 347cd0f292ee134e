pub mod calculator;

use serde::Serialize;
use shelfsync_core::{BookRecord, TitleConfig};
use tracing::debug;

use super::{
    ConflictDetails, ConflictDetector, ConflictRecord, DetectorKind, DetectorMetadata, Severity,
    detail_text,
};
use crate::script::Script;

pub use calculator::{
    TitleSimilarity, TitleSimilarityCalculator, abbreviation_differences, edition_marker,
    normalize_title, script_mismatch, series_index, width_mismatch,
};

pub const TITLE_ALGORITHM: &str = "weighted_title_similarity";
pub const TITLE_VERSION: &str = "1.0.0";

const BASE_CONFIDENCE: f64 = 0.8;
const LOW_SIMILARITY: f64 = 0.3;
const LOW_SIMILARITY_FACTOR: f64 = 1.2;
const HIGH_SIMILARITY: f64 = 0.8;
const HIGH_SIMILARITY_FACTOR: f64 = 0.8;
const FORMAT_ONLY_FACTOR: f64 = 0.7;
const LANGUAGE_FACTOR: f64 = 1.1;
const SHORT_TITLE_FACTOR: f64 = 0.6;
const LONG_TITLE_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerPair<T> {
    pub left: Option<T>,
    pub right: Option<T>,
}

impl<T: PartialEq> MarkerPair<T> {
    /// `Some` when the two markers differ.
    fn differing(left: Option<T>, right: Option<T>) -> Option<Self> {
        (left != right).then_some(Self { left, right })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TitleFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<MarkerPair<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<MarkerPair<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<[Script; 2]>,
    pub width: bool,
    pub abbreviations: Vec<String>,
}

impl TitleFlags {
    /// Edition or series index differ.
    pub fn version_difference(&self) -> bool {
        self.edition.is_some() || self.series.is_some()
    }

    pub fn language_difference(&self) -> bool {
        self.script.is_some()
    }

    /// Titles differ only in presentation.
    pub fn format_only(&self) -> bool {
        (self.width || !self.abbreviations.is_empty())
            && !self.version_difference()
            && !self.language_difference()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleAction {
    ReviewEdition,
    VerifySeriesIndex,
    PreferNativeScriptTitle,
    NormalizePunctuation,
    ExpandAbbreviation,
    ManualReview,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleDetails {
    pub title_left: String,
    pub title_right: String,
    pub normalized_left: String,
    pub normalized_right: String,
    pub similarity: TitleSimilarity,
    pub flags: TitleFlags,
    pub actions: Vec<TitleAction>,
}

#[derive(Debug, Clone, Default)]
pub struct TitleConflictDetector {
    calculator: TitleSimilarityCalculator,
    config: TitleConfig,
}

impl TitleConflictDetector {
    pub fn new(config: TitleConfig) -> Self {
        Self {
            calculator: TitleSimilarityCalculator::new(&config),
            config,
        }
    }

    pub fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
        let raw_left = left.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let raw_right = right.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        if raw_left == raw_right {
            return None;
        }
        let cleaned_left = detail_text(raw_left);
        let cleaned_right = detail_text(raw_right);
        let (title_left, title_right) = (cleaned_left.as_str(), cleaned_right.as_str());
        if title_left.is_empty() || title_right.is_empty() {
            return None;
        }

        let normalized_left = normalize_title(title_left);
        let normalized_right = normalize_title(title_right);
        let similarity = self.calculator.similarity(&normalized_left, &normalized_right);

        let flags = TitleFlags {
            edition: MarkerPair::differing(edition_marker(title_left), edition_marker(title_right)),
            series: MarkerPair::differing(series_index(title_left), series_index(title_right)),
            script: script_mismatch(title_left, title_right),
            width: width_mismatch(title_left, title_right),
            abbreviations: abbreviation_differences(
                title_left,
                title_right,
                &self.config.abbreviations,
            ),
        };

        if similarity.combined >= self.config.similarity_cutoff && !flags.version_difference() {
            debug!(
                combined = similarity.combined,
                "titles similar enough to treat as equal"
            );
            return None;
        }

        let severity = self.severity(&similarity, &flags);
        let confidence = self.confidence(&similarity, &flags, title_left, title_right);
        let actions = actions(severity, &flags);

        let details = TitleDetails {
            title_left: cleaned_left,
            title_right: cleaned_right,
            normalized_left,
            normalized_right,
            similarity,
            flags,
            actions,
        };

        Some(ConflictRecord::new(
            severity,
            confidence,
            ConflictDetails::Title(details),
            DetectorMetadata::new(DetectorKind::Title, TITLE_ALGORITHM, TITLE_VERSION),
        ))
    }

    fn severity(&self, similarity: &TitleSimilarity, flags: &TitleFlags) -> Severity {
        let combined = similarity.combined;
        if flags.format_only() && combined > self.config.format_only {
            Severity::Low
        } else if flags.version_difference() {
            Severity::Medium
        } else if flags.language_difference() {
            Severity::High
        } else if combined < self.config.high {
            Severity::High
        } else if combined < self.config.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn confidence(
        &self,
        similarity: &TitleSimilarity,
        flags: &TitleFlags,
        left: &str,
        right: &str,
    ) -> f64 {
        let mut confidence = BASE_CONFIDENCE;
        if similarity.combined < LOW_SIMILARITY {
            confidence *= LOW_SIMILARITY_FACTOR;
        } else if similarity.combined > HIGH_SIMILARITY {
            confidence *= HIGH_SIMILARITY_FACTOR;
        }
        if flags.format_only() {
            confidence *= FORMAT_ONLY_FACTOR;
        }
        if flags.language_difference() {
            confidence *= LANGUAGE_FACTOR;
        }

        let average_length = (left.chars().count() + right.chars().count()) as f64 / 2.0;
        if average_length < self.config.short_title_chars as f64 {
            confidence *= SHORT_TITLE_FACTOR;
        } else if average_length > self.config.long_title_chars as f64 {
            confidence *= LONG_TITLE_FACTOR;
        }
        confidence
    }
}

impl ConflictDetector for TitleConflictDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Title
    }

    fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
        TitleConflictDetector::detect(self, left, right)
    }
}

fn actions(severity: Severity, flags: &TitleFlags) -> Vec<TitleAction> {
    let mut actions = Vec::new();
    if flags.edition.is_some() {
        actions.push(TitleAction::ReviewEdition);
    }
    if flags.series.is_some() {
        actions.push(TitleAction::VerifySeriesIndex);
    }
    if flags.script.is_some() {
        actions.push(TitleAction::PreferNativeScriptTitle);
    }
    if flags.width {
        actions.push(TitleAction::NormalizePunctuation);
    }
    if !flags.abbreviations.is_empty() {
        actions.push(TitleAction::ExpandAbbreviation);
    }
    if actions.is_empty() || severity >= Severity::High {
        actions.push(TitleAction::ManualReview);
    }
    actions
}
