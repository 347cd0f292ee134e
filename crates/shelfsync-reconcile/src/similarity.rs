//! Comparison primitives shared by the conflict detectors.
//!
//! Every function here is total: empty inputs produce a defined score instead
//! of a division by zero.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::script::is_cjk;

/// Levenshtein distance over Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `1 - distance / longest`, so identical strings score 1.0.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// |A∩B| / |A∪B|, defined as 1.0 when both sets are empty.
pub fn jaccard<T>(a: &HashSet<T>, b: &HashSet<T>) -> f64
where
    T: Eq + Hash,
{
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Split on whitespace, then break out every CJK ideograph as its own token.
///
/// CJK text is not space-delimited, so treating each ideograph as a word gives
/// word-level measures something to compare.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let mut run = String::new();
        for c in word.chars() {
            if is_cjk(c) {
                if !run.is_empty() {
                    tokens.push(std::mem::take(&mut run));
                }
                if c.is_alphanumeric() {
                    tokens.push(c.to_string());
                }
            } else {
                run.push(c);
            }
        }
        if !run.is_empty() {
            tokens.push(run);
        }
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramSize {
    Bigram,
    Trigram,
}

impl NgramSize {
    pub fn n(self) -> usize {
        match self {
            Self::Bigram => 2,
            Self::Trigram => 3,
        }
    }
}

/// Cosine similarity of n-gram frequency vectors.
///
/// The vector mixes character n-grams, word n-grams and whole tokens so that
/// both spelling and word order contribute. Returns 0.0 if either side has no
/// features.
pub fn ngram_cosine(a: &str, b: &str, size: NgramSize) -> f64 {
    let left = ngram_features(a, size.n());
    let right = ngram_features(b, size.n());
    cosine(&left, &right)
}

fn ngram_features(text: &str, n: usize) -> HashMap<String, f64> {
    let mut features: HashMap<String, f64> = HashMap::new();

    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !chars.is_empty() {
        if chars.len() < n {
            let gram: String = chars.iter().collect();
            *features.entry(format!("c:{gram}")).or_default() += 1.0;
        } else {
            for window in chars.windows(n) {
                let gram: String = window.iter().collect();
                *features.entry(format!("c:{gram}")).or_default() += 1.0;
            }
        }
    }

    let tokens = tokenize(text);
    for window in tokens.windows(n) {
        *features.entry(format!("w:{}", window.join(" "))).or_default() += 1.0;
    }
    for token in &tokens {
        *features.entry(format!("t:{token}")).or_default() += 1.0;
    }

    features
}

fn cosine(left: &HashMap<String, f64>, right: &HashMap<String, f64>) -> f64 {
    let dot: f64 = left
        .iter()
        .filter_map(|(key, weight)| right.get(key).map(|other| weight * other))
        .sum();
    let left_norm = left.values().map(|w| w * w).sum::<f64>().sqrt();
    let right_norm = right.values().map(|w| w * w).sum::<f64>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    (dot / (left_norm * right_norm)).clamp(0.0, 1.0)
}
