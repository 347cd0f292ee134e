pub mod analyzer;

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use shelfsync_core::{BookRecord, TagConfig, TagVocabulary};
use tracing::debug;

use super::{
    CappedList, ConflictDetails, ConflictDetector, ConflictRecord, DetectorKind, DetectorMetadata,
    RecordSide, Severity, ValidationDetails, detail_text,
};
use crate::error::Result;
use crate::script::{Script, dominant_script};

pub use analyzer::{SemanticAnalyzer, TagKey, TagSimilarity, normalize_tag};

pub const TAG_ALGORITHM: &str = "semantic_tag_similarity";
pub const TAG_VERSION: &str = "1.0.0";

const VALIDATION_CONFIDENCE: f64 = 0.9;
const BASE_CONFIDENCE: f64 = 0.7;
const CONTRADICTION_FACTOR: f64 = 1.4;
const MIXED_SCRIPT_FACTOR: f64 = 1.2;
const CASING_ONLY_FACTOR: f64 = 0.8;
const NEAR_ZERO_SIMILARITY: f64 = 0.1;
const NEAR_ZERO_FACTOR: f64 = 1.3;
const HIGH_SIMILARITY: f64 = 0.8;
const HIGH_SIMILARITY_FACTOR: f64 = 0.7;
/// Tag count at which a side is considered fully described.
const FULL_TAG_COUNT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagFlags {
    pub disjoint: bool,
    pub count_mismatch: bool,
    pub mixed_scripts: bool,
    pub contradictions: Vec<[String; 2]>,
    pub casing: Vec<String>,
}

impl TagFlags {
    pub fn any(&self) -> bool {
        self.disjoint
            || self.count_mismatch
            || self.mixed_scripts
            || !self.contradictions.is_empty()
            || !self.casing.is_empty()
    }

    fn casing_only(&self) -> bool {
        !self.casing.is_empty()
            && !self.disjoint
            && !self.count_mismatch
            && !self.mixed_scripts
            && self.contradictions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSuggestions {
    pub union: CappedList<String>,
    pub retained: CappedList<String>,
    pub synonym_collapsed: CappedList<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagDetails {
    pub tags_left: CappedList<String>,
    pub tags_right: CappedList<String>,
    pub similarity: TagSimilarity,
    pub flags: TagFlags,
    pub suggestions: MergeSuggestions,
}

/// Compares tag sets through a synonym, category and antonym vocabulary.
#[derive(Debug, Clone)]
pub struct TagConflictDetector {
    analyzer: SemanticAnalyzer,
    config: TagConfig,
}

impl Default for TagConflictDetector {
    fn default() -> Self {
        let config = TagConfig::default();
        let analyzer = SemanticAnalyzer::try_new(&TagVocabulary::default(), &config)
            .unwrap_or_else(|_| SemanticAnalyzer::without_vocabulary(&config));
        Self { analyzer, config }
    }
}

impl TagConflictDetector {
    pub fn try_new(vocabulary: &TagVocabulary, config: TagConfig) -> Result<Self> {
        let analyzer = SemanticAnalyzer::try_new(vocabulary, &config)?;
        Ok(Self { analyzer, config })
    }

    pub fn analyzer(&self) -> &SemanticAnalyzer {
        &self.analyzer
    }

    pub fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
        let raw_left = left.tags.as_deref()?;
        let raw_right = right.tags.as_deref()?;

        let checked_left = self.validate(raw_left);
        let checked_right = self.validate(raw_right);
        let (tags_left, tags_right) = match (checked_left, checked_right) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(issues), Ok(_)) => return Some(validation_failure(RecordSide::Left, issues)),
            (Ok(_), Err(issues)) => return Some(validation_failure(RecordSide::Right, issues)),
            (Err(l), Err(r)) => {
                let issues = l
                    .into_iter()
                    .map(|issue| format!("left: {issue}"))
                    .chain(r.into_iter().map(|issue| format!("right: {issue}")));
                return Some(validation_failure(RecordSide::Both, issues.collect()));
            }
        };

        let set_left: HashSet<&String> = tags_left.iter().collect();
        let set_right: HashSet<&String> = tags_right.iter().collect();
        if set_left == set_right {
            return None;
        }
        let keys_left = self.analyzer.keys(&tags_left);
        let keys_right = self.analyzer.keys(&tags_right);
        if keys_left == keys_right {
            debug!("tag sets differ only by synonyms");
            return None;
        }

        let similarity = self.analyzer.similarity(&tags_left, &tags_right);
        let flags = TagFlags {
            disjoint: keys_left.is_disjoint(&keys_right),
            count_mismatch: tags_left.len().abs_diff(tags_right.len())
                > self.config.count_difference,
            mixed_scripts: mixed_scripts(&tags_left, &tags_right),
            contradictions: self.analyzer.contradictions(&tags_left, &tags_right),
            casing: casing_inconsistencies(raw_left, raw_right),
        };

        if similarity.overall >= self.config.similarity_cutoff && !flags.any() {
            return None;
        }

        let severity = self.severity(&similarity, &flags);
        let confidence = confidence(&similarity, &flags, tags_left.len(), tags_right.len());
        let suggestions = self.suggestions(&tags_left, &tags_right);

        let details = TagDetails {
            tags_left: CappedList::new(tags_left),
            tags_right: CappedList::new(tags_right),
            similarity,
            flags,
            suggestions,
        };

        Some(ConflictRecord::new(
            severity,
            confidence,
            ConflictDetails::Tags(details),
            DetectorMetadata::new(DetectorKind::Tags, TAG_ALGORITHM, TAG_VERSION),
        ))
    }

    /// Normalized tags in input order, or the list of problems found.
    fn validate(&self, raw: &[String]) -> std::result::Result<Vec<String>, Vec<String>> {
        let mut issues = Vec::new();
        if raw.len() > self.config.max_tags {
            issues.push(format!(
                "{} tags exceed the limit of {}",
                raw.len(),
                self.config.max_tags
            ));
        }

        let mut seen = HashSet::new();
        let mut tags = Vec::with_capacity(raw.len());
        for (index, tag) in raw.iter().enumerate() {
            let normalized = normalize_tag(tag);
            let length = normalized.chars().count();
            if length == 0 {
                issues.push(format!("tag {index} is empty"));
            } else if length > self.config.max_tag_length {
                issues.push(format!(
                    "tag {index} exceeds {} characters",
                    self.config.max_tag_length
                ));
            } else if !seen.insert(normalized.clone()) {
                issues.push(format!("duplicate tag \"{}\"", detail_text(&normalized)));
            } else {
                tags.push(normalized);
            }
        }

        if issues.is_empty() { Ok(tags) } else { Err(issues) }
    }

    fn severity(&self, similarity: &TagSimilarity, flags: &TagFlags) -> Severity {
        if !flags.contradictions.is_empty() {
            Severity::High
        } else if flags.disjoint || flags.count_mismatch {
            Severity::Medium
        } else if similarity.overall < self.config.low {
            Severity::High
        } else if similarity.overall < self.config.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    fn suggestions(&self, left: &[String], right: &[String]) -> MergeSuggestions {
        let left_set: BTreeSet<String> = left.iter().cloned().collect();
        let right_set: BTreeSet<String> = right.iter().cloned().collect();
        let union: BTreeSet<String> = left_set.union(&right_set).cloned().collect();
        let retained = left_set.intersection(&right_set).cloned();
        MergeSuggestions {
            synonym_collapsed: CappedList::new(self.analyzer.collapse_synonyms(&union)),
            retained: CappedList::new(retained),
            union: CappedList::new(union),
        }
    }
}

impl ConflictDetector for TagConflictDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Tags
    }

    fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
        TagConflictDetector::detect(self, left, right)
    }
}

fn validation_failure(side: RecordSide, issues: Vec<String>) -> ConflictRecord {
    debug!(?side, issues = issues.len(), "tag validation failed");
    ConflictRecord::new(
        Severity::Medium,
        VALIDATION_CONFIDENCE,
        ConflictDetails::Validation(ValidationDetails {
            reason: "validation_failure",
            side,
            issues: CappedList::new(issues),
        }),
        DetectorMetadata::new(DetectorKind::Tags, TAG_ALGORITHM, TAG_VERSION),
    )
}

fn has_cjk(tags: &[String]) -> bool {
    tags.iter().any(|tag| dominant_script(tag) == Script::Cjk)
}

/// One side tagged in CJK while the other side has only Latin tags.
fn mixed_scripts(left: &[String], right: &[String]) -> bool {
    let latin_only = |tags: &[String]| {
        !tags.is_empty() && tags.iter().all(|tag| dominant_script(tag) == Script::Latin)
    };
    (has_cjk(left) && latin_only(right)) || (has_cjk(right) && latin_only(left))
}

fn casing_inconsistencies(left: &[String], right: &[String]) -> Vec<String> {
    let mut found = BTreeSet::new();
    for l in left.iter().map(|t| t.trim()) {
        for r in right.iter().map(|t| t.trim()) {
            if l != r && l.to_lowercase() == r.to_lowercase() {
                found.insert(format!("{} / {}", detail_text(l), detail_text(r)));
            }
        }
    }
    found.into_iter().collect()
}

fn tag_count_reliability(count: usize) -> f64 {
    0.5 + 0.5 * count.min(FULL_TAG_COUNT) as f64 / FULL_TAG_COUNT as f64
}

fn confidence(similarity: &TagSimilarity, flags: &TagFlags, left: usize, right: usize) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if !flags.contradictions.is_empty() {
        confidence *= CONTRADICTION_FACTOR;
    }
    if flags.mixed_scripts {
        confidence *= MIXED_SCRIPT_FACTOR;
    }
    if flags.casing_only() {
        confidence *= CASING_ONLY_FACTOR;
    }
    if similarity.overall < NEAR_ZERO_SIMILARITY {
        confidence *= NEAR_ZERO_FACTOR;
    } else if similarity.overall >= HIGH_SIMILARITY {
        confidence *= HIGH_SIMILARITY_FACTOR;
    }
    confidence * (tag_count_reliability(left) + tag_count_reliability(right)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tags: &[&str]) -> BookRecord {
        BookRecord::new().with_tags(tags.iter().copied())
    }

    fn detector() -> TagConflictDetector {
        TagConflictDetector::default()
    }

    fn bare_detector() -> TagConflictDetector {
        TagConflictDetector::try_new(&TagVocabulary::empty(), TagConfig::default()).unwrap()
    }

    fn details(record: &ConflictRecord) -> &TagDetails {
        match &record.details {
            ConflictDetails::Tags(details) => details,
            other => panic!("expected tag details, got {other:?}"),
        }
    }

    #[test]
    fn linked_synonyms_are_not_a_conflict() {
        assert!(detector().detect(&tagged(&["fiction"]), &tagged(&["novel"])).is_none());
        assert!(
            detector()
                .detect(&tagged(&["Fiction", "Fantasy"]), &tagged(&["小說", "奇幻"]))
                .is_none()
        );
    }

    #[test]
    fn unlinked_tags_conflict_at_low_or_medium() {
        let record = bare_detector()
            .detect(&tagged(&["fiction"]), &tagged(&["novel"]))
            .expect("conflict");
        assert!(matches!(record.severity, Severity::Low | Severity::Medium));
        assert!(details(&record).flags.disjoint);
    }

    #[test]
    fn equal_sets_after_normalization() {
        let d = detector();
        assert!(
            d.detect(
                &tagged(&["Sci-Fi", "space opera"]),
                &tagged(&["space  opera", "sci-fi!"])
            )
            .is_none()
        );
        assert!(d.detect(&tagged(&[]), &tagged(&[])).is_none());
    }

    #[test]
    fn missing_tags_yield_none() {
        assert!(detector().detect(&tagged(&["a"]), &BookRecord::new()).is_none());
    }

    #[test]
    fn contradiction_is_high() {
        let record = detector()
            .detect(&tagged(&["fantasy", "completed"]), &tagged(&["fantasy", "ongoing"]))
            .expect("conflict");
        assert_eq!(record.severity, Severity::High);
        assert_eq!(details(&record).flags.contradictions.len(), 1);
    }

    #[test]
    fn contradiction_raises_confidence() {
        let d = detector();
        let plain = d
            .detect(&tagged(&["fantasy", "epic"]), &tagged(&["fantasy", "grim"]))
            .expect("conflict");
        let contradiction = d
            .detect(&tagged(&["fantasy", "read"]), &tagged(&["fantasy", "unread"]))
            .expect("conflict");
        assert!(contradiction.confidence() > plain.confidence());
    }

    #[test]
    fn mixed_scripts_are_flagged() {
        let record = bare_detector()
            .detect(&tagged(&["科幻", "太空"]), &tagged(&["space", "scifi"]))
            .expect("conflict");
        assert!(details(&record).flags.mixed_scripts);
    }

    #[test]
    fn count_difference_is_medium() {
        let d = bare_detector();
        let many = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let record = d.detect(&tagged(&many), &tagged(&["a", "b"])).expect("conflict");
        assert!(details(&record).flags.count_mismatch);
        assert_eq!(record.severity, Severity::Medium);
    }

    #[test]
    fn casing_differences_are_reported() {
        let record = bare_detector()
            .detect(&tagged(&["Horror", "gothic"]), &tagged(&["horror", "ghosts"]))
            .expect("conflict");
        assert_eq!(details(&record).flags.casing, vec!["Horror / horror"]);
    }

    #[test]
    fn validation_failures_are_medium_with_side() {
        let d = detector();
        let long = "x".repeat(60);
        let record = d
            .detect(&tagged(&["ok"]), &tagged(&[long.as_str()]))
            .expect("validation record");
        assert_eq!(record.severity, Severity::Medium);
        assert!((record.confidence() - 0.9).abs() < 1e-9);
        let ConflictDetails::Validation(v) = &record.details else {
            panic!("expected validation details");
        };
        assert_eq!(v.side, RecordSide::Right);
        assert_eq!(v.reason, "validation_failure");

        let record = d
            .detect(&tagged(&["a", "A"]), &tagged(&["!!!"]))
            .expect("validation record");
        let ConflictDetails::Validation(v) = &record.details else {
            panic!("expected validation details");
        };
        assert_eq!(v.side, RecordSide::Both);
        assert_eq!(v.issues.len(), 2);
    }

    #[test]
    fn too_many_tags_fail_validation() {
        let many: Vec<String> = (0..150).map(|i| format!("tag{i}")).collect();
        let record = detector()
            .detect(&BookRecord::new().with_tags(many), &tagged(&["a"]))
            .expect("validation record");
        assert!(matches!(record.details, ConflictDetails::Validation(_)));
    }

    #[test]
    fn merge_suggestions() {
        let record = detector()
            .detect(
                &tagged(&["novel", "fantasy", "dragons"]),
                &tagged(&["小說", "fantasy", "completed"]),
            )
            .expect("conflict");
        let s = &details(&record).suggestions;
        assert_eq!(s.retained.items, vec!["fantasy"]);
        assert_eq!(s.union.len(), 5);
        assert!(s.synonym_collapsed.items.contains(&"小說".to_string()));
        assert!(!s.synonym_collapsed.items.contains(&"novel".to_string()));
        assert_eq!(s.synonym_collapsed.len(), 4);
    }

    fn overall(value: f64) -> TagSimilarity {
        TagSimilarity {
            direct: value,
            synonym: value,
            hierarchical: value,
            overall: value,
        }
    }

    #[test]
    fn mixed_scripts_raise_confidence() {
        let plain = TagFlags {
            disjoint: true,
            ..TagFlags::default()
        };
        let mixed = TagFlags {
            mixed_scripts: true,
            ..plain.clone()
        };
        let sim = overall(0.4);
        assert!(confidence(&sim, &mixed, 3, 3) > confidence(&sim, &plain, 3, 3));
    }

    #[test]
    fn casing_only_lowers_confidence() {
        let casing_only = TagFlags {
            casing: vec!["Fantasy / fantasy".to_string()],
            ..TagFlags::default()
        };
        let with_count = TagFlags {
            count_mismatch: true,
            ..casing_only.clone()
        };
        assert!(casing_only.casing_only());
        assert!(!with_count.casing_only());
        let sim = overall(0.5);
        assert!(confidence(&sim, &casing_only, 3, 3) < confidence(&sim, &with_count, 3, 3));
    }

    #[test]
    fn overall_similarity_bands_scale_confidence() {
        let flags = TagFlags {
            disjoint: true,
            ..TagFlags::default()
        };
        let near_zero = confidence(&overall(0.05), &flags, 3, 3);
        let middle = confidence(&overall(0.5), &flags, 3, 3);
        let high = confidence(&overall(0.85), &flags, 3, 3);
        assert!(near_zero > middle);
        assert!(high < middle);
    }

    #[test]
    fn confidence_in_range() {
        let record = detector()
            .detect(&tagged(&["history"]), &tagged(&["cyberpunk"]))
            .expect("conflict");
        assert!((0.1..=1.0).contains(&record.confidence()));
    }
}
