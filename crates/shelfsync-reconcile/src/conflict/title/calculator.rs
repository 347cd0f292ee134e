//! Title normalization, similarity and difference extraction.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use shelfsync_core::TitleConfig;

use crate::script::{Script, dominant_script, fold_width, is_full_width};
use crate::similarity::{NgramSize, edit_similarity, jaccard, ngram_cosine, tokenize};

const CJK_NUMERAL: &str = "[0-9]+|[一二三四五六七八九十]+";

/// Edition markers. The first capture group, when present, is the edition.
static EDITION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"第\s*({CJK_NUMERAL})\s*版"),
        r"(修訂|增訂|典藏|紀念|珍藏|新)版".to_string(),
        r"\b([0-9]+)(?:st|nd|rd|th)?\s+(?:edition|ed)\b\.?".to_string(),
        r"\b(revised|new|expanded|updated|anniversary|special|international|illustrated)\s+edition\b"
            .to_string(),
        r"\bedition\s+([0-9]+)\b".to_string(),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Series and volume markers. The first capture group is the index.
static SERIES_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"第\s*({CJK_NUMERAL})\s*[集卷冊册部]"),
        r"\b(?:vol|volume|book|part|pt|no)\.?\s*([0-9]+)\b".to_string(),
        r"\(\s*([0-9]+)\s*\)".to_string(),
        r"\s(ii|iii|iv|vi|vii|viii|ix)$".to_string(),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TitleSimilarity {
    pub character: f64,
    pub word: f64,
    pub semantic: f64,
    pub combined: f64,
}

/// Scores normalized titles with the configured weights.
#[derive(Debug, Clone)]
pub struct TitleSimilarityCalculator {
    character_weight: f64,
    word_weight: f64,
    semantic_weight: f64,
}

impl Default for TitleSimilarityCalculator {
    fn default() -> Self {
        Self::new(&TitleConfig::default())
    }
}

impl TitleSimilarityCalculator {
    pub fn new(config: &TitleConfig) -> Self {
        Self {
            character_weight: config.character_weight,
            word_weight: config.word_weight,
            semantic_weight: config.semantic_weight,
        }
    }

    /// Both arguments are expected to be output of [`normalize_title`].
    pub fn similarity(&self, left: &str, right: &str) -> TitleSimilarity {
        let character = edit_similarity(left, right);

        let left_words: HashSet<String> = tokenize(left).into_iter().collect();
        let right_words: HashSet<String> = tokenize(right).into_iter().collect();
        let word = jaccard(&left_words, &right_words);

        let semantic = ngram_cosine(left, right, NgramSize::Bigram);

        let combined = self.character_weight * character
            + self.word_weight * word
            + self.semantic_weight * semantic;

        TitleSimilarity {
            character,
            word,
            semantic,
            combined: combined.clamp(0.0, 1.0),
        }
    }
}

/// Width-folded, lower-cased title without edition or volume markers, with
/// punctuation turned into spaces.
pub fn normalize_title(title: &str) -> String {
    let mut text = fold_width(title).to_lowercase();
    for pattern in EDITION_PATTERNS.iter().chain(SERIES_PATTERNS.iter()) {
        text = pattern.replace_all(&text, " ").into_owned();
    }
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edition named in the title: a number, or a word such as `revised`.
pub fn edition_marker(title: &str) -> Option<String> {
    let text = fold_width(title).to_lowercase();
    EDITION_PATTERNS.iter().find_map(|pattern| {
        let raw = pattern.captures(&text)?.get(1)?.as_str();
        Some(parse_index(raw).map_or_else(|| raw.to_string(), |n| n.to_string()))
    })
}

/// Series or volume index named in the title.
pub fn series_index(title: &str) -> Option<u32> {
    let text = fold_width(title).to_lowercase();
    let text = text.trim_end();
    SERIES_PATTERNS.iter().find_map(|pattern| {
        let raw = pattern.captures(text)?.get(1)?.as_str();
        parse_index(raw)
    })
}

/// Arabic, small CJK or small roman numeral.
fn parse_index(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    if let Some(n) = parse_roman(raw) {
        return Some(n);
    }
    parse_cjk_numeral(raw)
}

fn parse_roman(raw: &str) -> Option<u32> {
    let value = match raw {
        "ii" => 2,
        "iii" => 3,
        "iv" => 4,
        "vi" => 6,
        "vii" => 7,
        "viii" => 8,
        "ix" => 9,
        _ => return None,
    };
    Some(value)
}

fn cjk_digit(c: char) -> Option<u32> {
    "一二三四五六七八九"
        .chars()
        .position(|d| d == c)
        .map(|p| p as u32 + 1)
}

/// 一 through 九十九.
fn parse_cjk_numeral(raw: &str) -> Option<u32> {
    let chars: Vec<char> = raw.chars().collect();
    match chars.iter().position(|&c| c == '十') {
        None if chars.len() == 1 => cjk_digit(chars[0]),
        None => None,
        Some(at) => {
            let tens = match at {
                0 => 1,
                1 => cjk_digit(chars[0])?,
                _ => return None,
            };
            let ones = match &chars[at + 1..] {
                [] => 0,
                [c] => cjk_digit(*c)?,
                _ => return None,
            };
            Some(tens * 10 + ones)
        }
    }
}

/// Scripts of both titles when they differ and both are classifiable.
pub fn script_mismatch(left: &str, right: &str) -> Option<[Script; 2]> {
    let (l, r) = (dominant_script(left), dominant_script(right));
    (l != r && l != Script::Other && r != Script::Other).then_some([l, r])
}

/// Exactly one side uses full-width forms.
pub fn width_mismatch(left: &str, right: &str) -> bool {
    left.chars().any(is_full_width) != right.chars().any(is_full_width)
}

/// Configured `[short, long]` pairs where one title uses the short form and
/// the other the long form.
pub fn abbreviation_differences(
    left: &str,
    right: &str,
    abbreviations: &[[String; 2]],
) -> Vec<String> {
    let left_words = abbreviation_words(left);
    let right_words = abbreviation_words(right);
    abbreviations
        .iter()
        .filter(|[short, long]| {
            let short = abbreviation_words(short);
            let long = abbreviation_words(long);
            if short.is_empty() || long.is_empty() {
                return false;
            }
            let (left_short, left_long) = forms_used(&left_words, &short, &long);
            let (right_short, right_long) = forms_used(&right_words, &short, &long);
            (left_short && right_long) || (left_long && right_short)
        })
        .map(|[short, long]| format!("{short} / {long}"))
        .collect()
}

/// Whether `words` uses only the short form, and whether only the long form.
fn forms_used(words: &[String], short: &[String], long: &[String]) -> (bool, bool) {
    let has = |phrase: &[String]| words.windows(phrase.len()).any(|window| window == phrase);
    let (has_short, has_long) = (has(short), has(long));
    (has_short && !has_long, has_long && !has_short)
}

/// Lower-case words, keeping `&` as a word of its own.
fn abbreviation_words(text: &str) -> Vec<String> {
    fold_width(text)
        .to_lowercase()
        .replace('&', " & ")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abbreviations() -> Vec<[String; 2]> {
        TitleConfig::default().abbreviations
    }

    #[test]
    fn normalize_strips_markers_and_punctuation() {
        assert_eq!(normalize_title("The Three-Body Problem"), "the three body problem");
        assert_eq!(normalize_title("Clean Code (2nd Edition)"), "clean code");
        assert_eq!(normalize_title("三體：黑暗森林"), "三體 黑暗森林");
        assert_eq!(normalize_title("ＤＵＮＥ"), "dune");
        assert_eq!(normalize_title("鬼滅之刃 第3集"), "鬼滅之刃");
        assert_eq!(normalize_title("Harry Potter, Vol. 2"), "harry potter");
    }

    #[test]
    fn edition_markers() {
        assert_eq!(edition_marker("Clean Code, 2nd edition").as_deref(), Some("2"));
        assert_eq!(edition_marker("演算法 第三版").as_deref(), Some("3"));
        assert_eq!(edition_marker("Dune (Revised Edition)").as_deref(), Some("revised"));
        assert_eq!(edition_marker("紅樓夢 典藏版").as_deref(), Some("典藏"));
        assert_eq!(edition_marker("Dune"), None);
    }

    #[test]
    fn series_indices() {
        assert_eq!(series_index("Harry Potter Vol. 3"), Some(3));
        assert_eq!(series_index("進擊的巨人 第十二卷"), Some(12));
        assert_eq!(series_index("三體 II"), Some(2));
        assert_eq!(series_index("Saga (4)"), Some(4));
        assert_eq!(series_index("Catch 22"), None);
    }

    #[test]
    fn cjk_numerals() {
        assert_eq!(parse_cjk_numeral("三"), Some(3));
        assert_eq!(parse_cjk_numeral("十"), Some(10));
        assert_eq!(parse_cjk_numeral("十二"), Some(12));
        assert_eq!(parse_cjk_numeral("二十"), Some(20));
        assert_eq!(parse_cjk_numeral("九十九"), Some(99));
        assert_eq!(parse_cjk_numeral("十十"), None);
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let calc = TitleSimilarityCalculator::default();
        let ab = calc.similarity("the dark forest", "dark forest");
        let ba = calc.similarity("dark forest", "the dark forest");
        assert!((ab.combined - ba.combined).abs() < 1e-12);
        assert!(ab.combined > 0.5 && ab.combined < 1.0);
        assert!((calc.similarity("dune", "dune").combined - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flags() {
        assert_eq!(
            script_mismatch("The Three-Body Problem", "三體"),
            Some([Script::Latin, Script::Cjk])
        );
        assert_eq!(script_mismatch("Dune", "Emma"), None);
        assert!(width_mismatch("三體：黑暗森林", "三體:黑暗森林"));
        assert!(!width_mismatch("三體：黑暗森林", "三體：死神永生"));
    }

    #[test]
    fn abbreviations_are_detected_both_ways() {
        let pairs = abbreviations();
        assert_eq!(
            abbreviation_differences("Pride & Prejudice", "Pride and Prejudice", &pairs),
            vec!["& / and"]
        );
        assert_eq!(
            abbreviation_differences("Intro to Artificial Intelligence", "Intro to AI", &pairs),
            vec!["ai / artificial intelligence"]
        );
        assert!(abbreviation_differences("Between Us", "Between Us", &pairs).is_empty());
    }
}
