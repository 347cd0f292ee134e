use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfsyncError};
use crate::vocabulary::TagVocabulary;

// ─── Identity ──────────────────────────────────────────────

/// Maximum length, in characters, of the token part of an identity.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 50;

// ─── Progress ──────────────────────────────────────────────

/// Progress differences at or below this many percentage points are noise.
pub const DEFAULT_ALLOWABLE_VARIANCE: f64 = 2.0;
/// Exponential decay applied per hour between two progress reports.
pub const DEFAULT_DECAY_RATE_PER_HOUR: f64 = 0.001;
/// Weight applied when the later report shows more progress than the earlier one.
pub const DEFAULT_PROGRESSION_FACTOR: f64 = 0.7;
pub const DEFAULT_PROGRESS_LOW: f64 = 5.0;
pub const DEFAULT_PROGRESS_MEDIUM: f64 = 15.0;
pub const DEFAULT_PROGRESS_HIGH: f64 = 30.0;
pub const DEFAULT_PROGRESS_CRITICAL: f64 = 50.0;
/// Reliability weight of a source missing from the reliability table.
pub const DEFAULT_SOURCE_RELIABILITY: f64 = 0.70;

// ─── Tags ──────────────────────────────────────────────────

/// Tag sets at least this similar are not reported unless a special condition holds.
pub const DEFAULT_TAG_SIMILARITY_CUTOFF: f64 = 0.8;
pub const DEFAULT_TAG_LOW: f64 = 0.2;
pub const DEFAULT_TAG_MEDIUM: f64 = 0.5;
pub const DEFAULT_TAG_DIRECT_WEIGHT: f64 = 0.6;
pub const DEFAULT_TAG_SYNONYM_WEIGHT: f64 = 0.3;
pub const DEFAULT_TAG_HIERARCHY_WEIGHT: f64 = 0.1;
pub const DEFAULT_MAX_TAG_LENGTH: usize = 50;
pub const DEFAULT_MAX_TAGS: usize = 100;
/// Tag count difference above which two sets are flagged.
pub const DEFAULT_TAG_COUNT_DIFFERENCE: usize = 5;

// ─── Titles ────────────────────────────────────────────────

/// Titles at least this similar are the same title.
pub const DEFAULT_TITLE_SIMILARITY_CUTOFF: f64 = 0.9;
pub const DEFAULT_TITLE_MEDIUM: f64 = 0.7;
pub const DEFAULT_TITLE_HIGH: f64 = 0.5;
/// Format-only differences above this similarity are LOW.
pub const DEFAULT_TITLE_FORMAT_ONLY: f64 = 0.8;
pub const DEFAULT_TITLE_CHARACTER_WEIGHT: f64 = 0.3;
pub const DEFAULT_TITLE_WORD_WEIGHT: f64 = 0.4;
pub const DEFAULT_TITLE_SEMANTIC_WEIGHT: f64 = 0.3;
pub const DEFAULT_SHORT_TITLE_CHARS: usize = 5;
pub const DEFAULT_LONG_TITLE_CHARS: usize = 30;

// ─── Batch ─────────────────────────────────────────────────

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Root configuration for identity resolution and conflict detection.
///
/// Every section falls back to its defaults, so a partial TOML file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShelfsyncConfig {
    pub identity: IdentityConfig,
    pub progress: ProgressConfig,
    pub tags: TagConfig,
    pub title: TitleConfig,
    pub batch: BatchConfig,
    pub vocabulary: TagVocabulary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub max_token_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressConfig {
    pub allowable_variance: f64,
    pub decay_rate_per_hour: f64,
    pub progression_factor: f64,
    pub default_reliability: f64,
    pub thresholds: ProgressThresholds,
    /// Reliability weight per source name, matched case-insensitively.
    pub source_reliability: BTreeMap<String, f64>,
}

/// Adjusted-difference cut points, in percentage points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TagConfig {
    pub similarity_cutoff: f64,
    pub low: f64,
    pub medium: f64,
    pub direct_weight: f64,
    pub synonym_weight: f64,
    pub hierarchy_weight: f64,
    pub max_tag_length: usize,
    pub max_tags: usize,
    pub count_difference: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TitleConfig {
    pub similarity_cutoff: f64,
    pub medium: f64,
    pub high: f64,
    pub format_only: f64,
    pub character_weight: f64,
    pub word_weight: f64,
    pub semantic_weight: f64,
    pub short_title_chars: usize,
    pub long_title_chars: usize,
    /// `[abbreviation, expansion]` pairs, compared on normalized words.
    pub abbreviations: Vec<[String; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        let source_reliability = [
            ("manual", 0.95),
            ("api", 0.90),
            ("export", 0.85),
            ("scrape", 0.70),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        Self {
            allowable_variance: DEFAULT_ALLOWABLE_VARIANCE,
            decay_rate_per_hour: DEFAULT_DECAY_RATE_PER_HOUR,
            progression_factor: DEFAULT_PROGRESSION_FACTOR,
            default_reliability: DEFAULT_SOURCE_RELIABILITY,
            thresholds: ProgressThresholds::default(),
            source_reliability,
        }
    }
}

impl Default for ProgressThresholds {
    fn default() -> Self {
        Self {
            low: DEFAULT_PROGRESS_LOW,
            medium: DEFAULT_PROGRESS_MEDIUM,
            high: DEFAULT_PROGRESS_HIGH,
            critical: DEFAULT_PROGRESS_CRITICAL,
        }
    }
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            similarity_cutoff: DEFAULT_TAG_SIMILARITY_CUTOFF,
            low: DEFAULT_TAG_LOW,
            medium: DEFAULT_TAG_MEDIUM,
            direct_weight: DEFAULT_TAG_DIRECT_WEIGHT,
            synonym_weight: DEFAULT_TAG_SYNONYM_WEIGHT,
            hierarchy_weight: DEFAULT_TAG_HIERARCHY_WEIGHT,
            max_tag_length: DEFAULT_MAX_TAG_LENGTH,
            max_tags: DEFAULT_MAX_TAGS,
            count_difference: DEFAULT_TAG_COUNT_DIFFERENCE,
        }
    }
}

impl Default for TitleConfig {
    fn default() -> Self {
        let abbreviations = [
            ("vol", "volume"),
            ("ed", "edition"),
            ("pt", "part"),
            ("no", "number"),
            ("intro", "introduction"),
            ("&", "and"),
            ("ai", "artificial intelligence"),
            ("ml", "machine learning"),
            ("js", "javascript"),
            ("ny", "new york"),
            ("uk", "united kingdom"),
        ]
        .into_iter()
        .map(|(short, long)| [short.to_string(), long.to_string()])
        .collect();

        Self {
            similarity_cutoff: DEFAULT_TITLE_SIMILARITY_CUTOFF,
            medium: DEFAULT_TITLE_MEDIUM,
            high: DEFAULT_TITLE_HIGH,
            format_only: DEFAULT_TITLE_FORMAT_ONLY,
            character_weight: DEFAULT_TITLE_CHARACTER_WEIGHT,
            word_weight: DEFAULT_TITLE_WORD_WEIGHT,
            semantic_weight: DEFAULT_TITLE_SEMANTIC_WEIGHT,
            short_title_chars: DEFAULT_SHORT_TITLE_CHARS,
            long_title_chars: DEFAULT_LONG_TITLE_CHARS,
            abbreviations,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

// ─── Parse / Validate ──────────────────────────────────────

impl ShelfsyncConfig {
    /// Parse a TOML document. Missing sections and fields take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check threshold ordering and ranges.
    pub fn validate(&self) -> Result<()> {
        self.progress.validate()?;
        self.tags.validate()?;
        self.title.validate()?;
        if self.identity.max_token_length == 0 {
            return Err(ShelfsyncError::InvalidThreshold {
                name: "identity.max_token_length",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Reliability weight for a source, falling back to the default weight.
    pub fn source_reliability(&self, source: Option<&str>) -> f64 {
        self.progress.reliability_of(source)
    }
}

impl ProgressConfig {
    pub fn reliability_of(&self, source: Option<&str>) -> f64 {
        source
            .map(|s| s.trim().to_lowercase())
            .and_then(|key| self.source_reliability.get(&key).copied())
            .unwrap_or(self.default_reliability)
    }

    fn validate(&self) -> Result<()> {
        non_negative("progress.allowable_variance", self.allowable_variance)?;
        non_negative("progress.decay_rate_per_hour", self.decay_rate_per_hour)?;
        unit_interval("progress.progression_factor", self.progression_factor)?;
        unit_interval("progress.default_reliability", self.default_reliability)?;
        for weight in self.source_reliability.values() {
            unit_interval("progress.source_reliability", *weight)?;
        }
        let t = &self.thresholds;
        ascending(
            "progress.thresholds",
            &[t.low, t.medium, t.high, t.critical],
        )
    }
}

impl TagConfig {
    fn validate(&self) -> Result<()> {
        unit_interval("tags.similarity_cutoff", self.similarity_cutoff)?;
        unit_interval("tags.low", self.low)?;
        unit_interval("tags.medium", self.medium)?;
        ascending("tags.low/medium", &[self.low, self.medium])?;
        weights_sum_to_one(
            "tags weights",
            &[self.direct_weight, self.synonym_weight, self.hierarchy_weight],
        )?;
        if self.max_tag_length == 0 || self.max_tags == 0 {
            return Err(ShelfsyncError::InvalidThreshold {
                name: "tags.max_tag_length/max_tags",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl TitleConfig {
    fn validate(&self) -> Result<()> {
        unit_interval("title.similarity_cutoff", self.similarity_cutoff)?;
        unit_interval("title.format_only", self.format_only)?;
        // Severity grows as similarity falls: high < medium.
        ascending("title.high/medium", &[self.high, self.medium])?;
        unit_interval("title.medium", self.medium)?;
        weights_sum_to_one(
            "title weights",
            &[self.character_weight, self.word_weight, self.semantic_weight],
        )?;
        if self.short_title_chars > self.long_title_chars {
            return Err(ShelfsyncError::InvalidThreshold {
                name: "title.short_title_chars",
                reason: "must not exceed long_title_chars".to_string(),
            });
        }
        Ok(())
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ShelfsyncError::InvalidThreshold {
            name,
            reason: format!("{value} is not a non-negative number"),
        })
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ShelfsyncError::InvalidThreshold {
            name,
            reason: format!("{value} is outside [0, 1]"),
        })
    }
}

fn ascending(name: &'static str, values: &[f64]) -> Result<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ShelfsyncError::InvalidThreshold {
            name,
            reason: "thresholds must be finite".to_string(),
        });
    }
    if values.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err(ShelfsyncError::InvalidThreshold {
            name,
            reason: format!("{values:?} must be strictly ascending"),
        })
    }
}

fn weights_sum_to_one(name: &'static str, weights: &[f64]) -> Result<()> {
    let sum: f64 = weights.iter().sum();
    if weights.iter().all(|w| *w >= 0.0) && (sum - 1.0).abs() < 1e-6 {
        Ok(())
    } else {
        Err(ShelfsyncError::InvalidThreshold {
            name,
            reason: format!("weights {weights:?} must be non-negative and sum to 1"),
        })
    }
}
