use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Curated tag knowledge handed to the tag conflict detector.
///
/// The default tables cover English and Traditional Chinese genre tags. Callers
/// with their own taxonomy replace the whole table through configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TagVocabulary {
    /// Groups of interchangeable tags.
    pub synonyms: Vec<Vec<String>>,

    /// Pairs of tags that cannot both describe the same book.
    pub contradictions: Vec<[String; 2]>,

    /// Parent category to its direct children.
    pub categories: BTreeMap<String, Vec<String>>,
}

impl TagVocabulary {
    /// A vocabulary with no synonyms, categories or contradictions.
    pub fn empty() -> Self {
        Self {
            synonyms: Vec::new(),
            contradictions: Vec::new(),
            categories: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.synonyms.is_empty() && self.contradictions.is_empty() && self.categories.is_empty()
    }
}

impl Default for TagVocabulary {
    fn default() -> Self {
        let synonyms = [
            &["fiction", "novel", "novels", "小說", "小说"][..],
            &["science fiction", "sci-fi", "scifi", "sf", "科幻"],
            &["fantasy", "奇幻"],
            &["mystery", "detective", "推理", "偵探"],
            &["thriller", "suspense", "懸疑", "驚悚"],
            &["romance", "love story", "愛情", "言情"],
            &["horror", "恐怖"],
            &["history", "歷史"],
            &["biography", "memoir", "傳記", "回憶錄"],
            &["business", "economics", "商業", "財經"],
            &["self-help", "personal development", "心理勵志", "勵志"],
            &["psychology", "心理學"],
            &["philosophy", "哲學"],
            &["poetry", "詩", "詩集"],
            &["comics", "manga", "graphic novel", "漫畫"],
            &["light novel", "輕小說"],
            &["children", "kids", "兒童", "童書"],
            &["travel", "旅遊", "旅行"],
            &["cooking", "cookbook", "食譜", "料理"],
            &["computer science", "programming", "電腦", "程式設計"],
            &["non-fiction", "nonfiction", "非文學", "非小說"],
            &["essay", "essays", "散文"],
        ]
        .iter()
        .map(|group| group.iter().map(|tag| tag.to_string()).collect())
        .collect();

        let contradictions = [
            ("completed", "in-progress"),
            ("completed", "ongoing"),
            ("finished", "reading"),
            ("read", "unread"),
            ("read", "to-read"),
            ("fiction", "non-fiction"),
            ("完結", "連載"),
            ("已讀", "未讀"),
            ("免費", "付費"),
            ("free", "paid"),
        ]
        .into_iter()
        .map(|(left, right)| [left.to_string(), right.to_string()])
        .collect();

        let categories = [
            (
                "fiction",
                &[
                    "science fiction",
                    "fantasy",
                    "mystery",
                    "thriller",
                    "romance",
                    "horror",
                    "light novel",
                ][..],
            ),
            (
                "non-fiction",
                &[
                    "history",
                    "biography",
                    "business",
                    "self-help",
                    "psychology",
                    "philosophy",
                    "travel",
                    "cooking",
                    "computer science",
                    "essay",
                ],
            ),
            ("science fiction", &["cyberpunk", "space opera", "dystopia"]),
            ("fantasy", &["urban fantasy", "epic fantasy", "武俠", "仙俠"]),
            ("business", &["finance", "investing", "marketing", "management"]),
            ("psychology", &["self-help"]),
        ]
        .iter()
        .map(|(parent, children)| {
            (
                parent.to_string(),
                children.iter().map(|child| child.to_string()).collect(),
            )
        })
        .collect();

        Self {
            synonyms,
            contradictions,
            categories,
        }
    }
}
