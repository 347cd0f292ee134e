//! Vocabulary-aware tag comparison.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use shelfsync_core::{TagConfig, TagVocabulary};

use crate::error::{ReconcileError, Result};
use crate::script::{Script, dominant_script, fold_width};
use crate::similarity::jaccard;

/// Lower-case, drop punctuation other than hyphens, collapse whitespace.
/// CJK text and full-width letters survive (the latter folded to ASCII).
pub fn normalize_tag(raw: &str) -> String {
    let folded = fold_width(raw);
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' {
            out.push(c);
        } else if c.is_whitespace() && !out.ends_with(' ') && !out.is_empty() {
            out.push(' ');
        }
    }
    out.trim_end().to_string()
}

/// Tags that are synonyms share a key; everything else is keyed by itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKey {
    Group(usize),
    Tag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TagSimilarity {
    pub direct: f64,
    pub synonym: f64,
    pub hierarchical: f64,
    pub overall: f64,
}

/// Index over a [`TagVocabulary`] with every entry already normalized.
#[derive(Debug, Clone)]
pub struct SemanticAnalyzer {
    group_of: HashMap<String, usize>,
    parents: HashMap<TagKey, HashSet<TagKey>>,
    contradictions: HashSet<(TagKey, TagKey)>,
    direct_weight: f64,
    synonym_weight: f64,
    hierarchy_weight: f64,
}

impl SemanticAnalyzer {
    /// Only exact tag matches count.
    pub fn without_vocabulary(config: &TagConfig) -> Self {
        Self {
            group_of: HashMap::new(),
            parents: HashMap::new(),
            contradictions: HashSet::new(),
            direct_weight: config.direct_weight,
            synonym_weight: config.synonym_weight,
            hierarchy_weight: config.hierarchy_weight,
        }
    }

    pub fn try_new(vocabulary: &TagVocabulary, config: &TagConfig) -> Result<Self> {
        let mut group_of = HashMap::new();
        for (index, group) in vocabulary.synonyms.iter().enumerate() {
            if group.is_empty() {
                return Err(ReconcileError::Vocabulary(format!(
                    "synonym group {index} is empty"
                )));
            }
            for entry in group {
                let tag = normalize_entry(entry, "synonym group")?;
                match group_of.insert(tag.clone(), index) {
                    Some(previous) if previous != index => {
                        return Err(ReconcileError::Vocabulary(format!(
                            "tag \"{tag}\" is listed in synonym groups {previous} and {index}"
                        )));
                    }
                    _ => {}
                }
            }
        }

        let mut analyzer = Self {
            group_of,
            ..Self::without_vocabulary(config)
        };

        for (parent, children) in &vocabulary.categories {
            let parent_key = analyzer.key(&normalize_entry(parent, "category")?);
            for child in children {
                let child_key = analyzer.key(&normalize_entry(child, "category")?);
                if child_key != parent_key {
                    analyzer
                        .parents
                        .entry(child_key)
                        .or_default()
                        .insert(parent_key.clone());
                }
            }
        }

        for [left, right] in &vocabulary.contradictions {
            let left = analyzer.key(&normalize_entry(left, "contradiction")?);
            let right = analyzer.key(&normalize_entry(right, "contradiction")?);
            if left == right {
                return Err(ReconcileError::Vocabulary(format!(
                    "contradiction pair {left:?} names the same tag twice"
                )));
            }
            analyzer.contradictions.insert((left.clone(), right.clone()));
            analyzer.contradictions.insert((right, left));
        }

        Ok(analyzer)
    }

    pub fn key(&self, tag: &str) -> TagKey {
        match self.group_of.get(tag) {
            Some(&group) => TagKey::Group(group),
            None => TagKey::Tag(tag.to_string()),
        }
    }

    pub fn keys<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> HashSet<TagKey> {
        tags.into_iter().map(|tag| self.key(tag)).collect()
    }

    /// Equal, parent/child, or siblings under a shared parent.
    pub fn related(&self, left: &TagKey, right: &TagKey) -> bool {
        if left == right {
            return true;
        }
        let empty = HashSet::new();
        let left_parents = self.parents.get(left).unwrap_or(&empty);
        let right_parents = self.parents.get(right).unwrap_or(&empty);
        left_parents.contains(right)
            || right_parents.contains(left)
            || !left_parents.is_disjoint(right_parents)
    }

    pub fn contradicts(&self, left: &TagKey, right: &TagKey) -> bool {
        self.contradictions.contains(&(left.clone(), right.clone()))
    }

    pub fn similarity(&self, left: &[String], right: &[String]) -> TagSimilarity {
        let left_set: HashSet<&String> = left.iter().collect();
        let right_set: HashSet<&String> = right.iter().collect();
        let direct = jaccard(&left_set, &right_set);

        let left_keys: Vec<TagKey> = left.iter().map(|t| self.key(t)).collect();
        let right_keys: Vec<TagKey> = right.iter().map(|t| self.key(t)).collect();

        let synonym = symmetric_share(&left_keys, &right_keys, |a, b| a == b);
        let hierarchical = symmetric_share(&left_keys, &right_keys, |a, b| self.related(a, b));

        let overall = self.direct_weight * direct
            + self.synonym_weight * synonym
            + self.hierarchy_weight * hierarchical;

        TagSimilarity {
            direct,
            synonym,
            hierarchical,
            overall,
        }
    }

    /// Pairs `(left, right)` of tags that the vocabulary marks as mutually
    /// exclusive. A pair is ignored when either side carries both tags.
    pub fn contradictions(&self, left: &[String], right: &[String]) -> Vec<[String; 2]> {
        let left_keys = self.keys(left);
        let right_keys = self.keys(right);
        let mut found = BTreeSet::new();
        for l in left {
            let lk = self.key(l);
            for r in right {
                let rk = self.key(r);
                if self.contradicts(&lk, &rk)
                    && !left_keys.contains(&rk)
                    && !right_keys.contains(&lk)
                {
                    found.insert([l.clone(), r.clone()]);
                }
            }
        }
        found.into_iter().collect()
    }

    /// One representative per synonym group among `tags`: the CJK form when
    /// present, otherwise the shortest, ties broken lexicographically.
    pub fn collapse_synonyms(&self, tags: &BTreeSet<String>) -> Vec<String> {
        let mut chosen: HashMap<TagKey, &String> = HashMap::new();
        for tag in tags {
            chosen
                .entry(self.key(tag))
                .and_modify(|current| {
                    if canonical_rank(tag) < canonical_rank(current) {
                        *current = tag;
                    }
                })
                .or_insert(tag);
        }
        let mut collapsed: Vec<String> = chosen.into_values().cloned().collect();
        collapsed.sort();
        collapsed
    }
}

fn normalize_entry(raw: &str, table: &str) -> Result<String> {
    let tag = normalize_tag(raw);
    if tag.is_empty() {
        return Err(ReconcileError::Vocabulary(format!(
            "{table} entry \"{raw}\" is empty after normalization"
        )));
    }
    Ok(tag)
}

fn canonical_rank(tag: &str) -> (bool, usize, &str) {
    (dominant_script(tag) != Script::Cjk, tag.chars().count(), tag)
}

/// Share of items on both sides that have a matching partner on the other side.
fn symmetric_share<F>(left: &[TagKey], right: &[TagKey], matches: F) -> f64
where
    F: Fn(&TagKey, &TagKey) -> bool,
{
    let total = left.len() + right.len();
    if total == 0 {
        return 1.0;
    }
    let left_hits = left
        .iter()
        .filter(|l| right.iter().any(|r| matches(l, r)))
        .count();
    let right_hits = right
        .iter()
        .filter(|r| left.iter().any(|l| matches(l, r)))
        .count();
    (left_hits + right_hits) as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SemanticAnalyzer {
        SemanticAnalyzer::try_new(&TagVocabulary::default(), &TagConfig::default()).unwrap()
    }

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_strips_punctuation_but_keeps_hyphens_and_cjk() {
        assert_eq!(normalize_tag("  Sci-Fi! "), "sci-fi");
        assert_eq!(normalize_tag("Science   Fiction"), "science fiction");
        assert_eq!(normalize_tag("《科幻》"), "科幻");
        assert_eq!(normalize_tag("ＦＡＮＴＡＳＹ"), "fantasy");
        assert_eq!(normalize_tag("..."), "");
    }

    #[test]
    fn synonyms_share_a_key() {
        let a = analyzer();
        assert_eq!(a.key("fiction"), a.key("novel"));
        assert_eq!(a.key("小說"), a.key("novel"));
        assert_ne!(a.key("fiction"), a.key("fantasy"));
        assert_eq!(a.key("unlisted"), TagKey::Tag("unlisted".to_string()));
    }

    #[test]
    fn hierarchy_covers_parent_child_and_siblings() {
        let a = analyzer();
        assert!(a.related(&a.key("fantasy"), &a.key("fiction")));
        assert!(a.related(&a.key("novel"), &a.key("fantasy")));
        assert!(a.related(&a.key("fantasy"), &a.key("mystery")));
        assert!(!a.related(&a.key("fantasy"), &a.key("history")));
    }

    #[test]
    fn similarity_breakdown() {
        let a = analyzer();
        let same = a.similarity(&tags(&["fantasy"]), &tags(&["fantasy"]));
        assert!((same.overall - 1.0).abs() < 1e-9);

        let synonyms = a.similarity(&tags(&["mystery"]), &tags(&["detective"]));
        assert_eq!(synonyms.direct, 0.0);
        assert_eq!(synonyms.synonym, 1.0);
        assert_eq!(synonyms.hierarchical, 1.0);

        let siblings = a.similarity(&tags(&["fantasy"]), &tags(&["horror"]));
        assert_eq!(siblings.synonym, 0.0);
        assert_eq!(siblings.hierarchical, 1.0);
        assert!((siblings.overall - 0.1).abs() < 1e-9);
    }

    #[test]
    fn contradictions_cross_sides_only() {
        let a = analyzer();
        let found = a.contradictions(&tags(&["completed"]), &tags(&["ongoing"]));
        assert_eq!(found, vec![["completed".to_string(), "ongoing".to_string()]]);

        let found = a.contradictions(&tags(&["novel"]), &tags(&["nonfiction"]));
        assert_eq!(found.len(), 1);

        let both = a.contradictions(&tags(&["read", "unread"]), &tags(&["unread"]));
        assert!(both.is_empty());
    }

    #[test]
    fn collapse_prefers_cjk_then_shortest() {
        let a = analyzer();
        let set: BTreeSet<String> = tags(&["fiction", "novel", "小說", "fantasy"])
            .into_iter()
            .collect();
        assert_eq!(a.collapse_synonyms(&set), vec!["fantasy", "小說"]);

        let set: BTreeSet<String> = tags(&["novels", "novel", "fiction"]).into_iter().collect();
        assert_eq!(a.collapse_synonyms(&set), vec!["novel"]);
    }

    #[test]
    fn rejects_overlapping_and_empty_groups() {
        let config = TagConfig::default();
        let mut vocab = TagVocabulary::empty();
        vocab.synonyms = vec![tags(&["a", "b"]), tags(&["B", "c"])];
        assert!(SemanticAnalyzer::try_new(&vocab, &config).is_err());

        vocab.synonyms = vec![vec![]];
        assert!(SemanticAnalyzer::try_new(&vocab, &config).is_err());

        vocab.synonyms = vec![tags(&["a", "!!!"])];
        assert!(SemanticAnalyzer::try_new(&vocab, &config).is_err());

        vocab.synonyms = vec![tags(&["Sci-Fi", "sci-fi"])];
        assert!(SemanticAnalyzer::try_new(&vocab, &config).is_ok());
    }
}
