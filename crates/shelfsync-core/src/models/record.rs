use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const READER_LINK_KEYS: &[&str] = &["readerLinkId", "readerLink", "id"];
const TITLE_KEYS: &[&str] = &["title", "name", "bookTitle"];
const COVER_KEYS: &[&str] = &["coverUrl", "cover", "coverImage"];
const TAG_KEYS: &[&str] = &["tags", "categories", "genres", "labels", "keywords"];
const PROGRESS_KEYS: &[&str] = &["progress", "readingProgress", "progressPercent"];
const TIMESTAMP_KEYS: &[&str] = &["lastUpdated", "updatedAt", "timestamp"];

/// One book as reported by a single source or extraction pass.
///
/// Every field is optional: extraction is best-effort and records arrive with
/// any subset of fields present. Deserialization never fails; values of the
/// wrong JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct BookRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_link_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Reading progress in percent. Not range-checked on ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl BookRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_reader_link_id(mut self, id: impl Into<String>) -> Self {
        self.reader_link_id = Some(id.into());
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_progress(mut self, progress: f64, at: DateTime<Utc>) -> Self {
        self.progress = Some(progress);
        self.last_updated = Some(at);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.reader_link_id.is_none()
            && self.title.is_none()
            && self.cover_url.is_none()
            && self.tags.is_none()
            && self.progress.is_none()
            && self.last_updated.is_none()
            && self.source.is_none()
    }

    /// Build a record from arbitrary JSON.
    ///
    /// Field aliases are tried in order and the first usable value wins.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        Self {
            reader_link_id: first_string(object, READER_LINK_KEYS),
            title: first_string(object, TITLE_KEYS),
            cover_url: first_string(object, COVER_KEYS),
            tags: first_string_list(object, TAG_KEYS),
            progress: first_number(object, PROGRESS_KEYS),
            last_updated: first_timestamp(object, TIMESTAMP_KEYS),
            source: first_string(object, &["source"]),
        }
    }

    /// Parse a JSON document holding either an array of records or an object
    /// with a `books` array. Anything else yields no records.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        let items = match value {
            Value::Array(items) => items,
            Value::Object(object) => match object.get("books") {
                Some(Value::Array(items)) => items,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };
        items.iter().map(Self::from_value).collect()
    }
}

impl From<Value> for BookRecord {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn first_string_list(object: &Map<String, Value>, keys: &[&str]) -> Option<Vec<String>> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
}

fn first_number(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(number_like))
}

fn number_like(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn first_timestamp(object: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(timestamp_like))
}

fn timestamp_like(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                    .map(|f| f.round() as i64)
            })?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_reads_all_fields() {
        let record = BookRecord::from_value(&json!({
            "readerLinkId": "r-1",
            "title": "三體",
            "coverUrl": "https://cdn.example.com/cover/ab/x1_210x315.jpg",
            "tags": ["科幻", "fiction"],
            "progress": 42.5,
            "lastUpdated": "2024-03-01T10:00:00Z",
            "source": "scrape"
        }));

        assert_eq!(record.reader_link_id.as_deref(), Some("r-1"));
        assert_eq!(record.title.as_deref(), Some("三體"));
        assert_eq!(record.tags.as_ref().map(Vec::len), Some(2));
        assert_eq!(record.progress, Some(42.5));
        assert!(record.last_updated.is_some());
        assert_eq!(record.source.as_deref(), Some("scrape"));
    }

    #[test]
    fn test_wrong_types_are_absent() {
        let record = BookRecord::from_value(&json!({
            "title": 42,
            "readerLinkId": {"nested": true},
            "coverUrl": false,
            "progress": "not a number",
            "lastUpdated": "yesterday"
        }));
        assert!(record.is_empty());
    }

    #[test]
    fn test_non_object_yields_empty_record() {
        assert!(BookRecord::from_value(&json!("just a string")).is_empty());
        assert!(BookRecord::from_value(&Value::Null).is_empty());
    }

    #[test]
    fn test_aliases_first_present_wins() {
        let record = BookRecord::from_value(&json!({
            "name": "Second",
            "bookTitle": "Third",
            "genres": ["mystery"],
            "keywords": ["ignored"],
            "readingProgress": "55%",
            "updatedAt": 1_700_000_000_000i64
        }));
        assert_eq!(record.title.as_deref(), Some("Second"));
        assert_eq!(record.tags, Some(vec!["mystery".to_string()]));
        assert_eq!(record.progress, Some(55.0));
        assert_eq!(
            record.last_updated.map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn test_non_string_tags_are_dropped() {
        let record = BookRecord::from_value(&json!({"tags": ["a", 1, null, "b"]}));
        assert_eq!(record.tags, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_deserialize_is_lenient() {
        let record: BookRecord =
            serde_json::from_str(r#"{"title": ["not", "a", "string"], "source": "api"}"#).unwrap();
        assert!(record.title.is_none());
        assert_eq!(record.source.as_deref(), Some("api"));
    }

    #[test]
    fn test_serialize_uses_camel_case_and_round_trips() {
        let record = BookRecord::new()
            .with_reader_link_id("r-9")
            .with_cover_url("https://cdn.example.com/cover/a/b_1x1.png");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["readerLinkId"], "r-9");
        assert!(json.get("title").is_none());
        assert_eq!(BookRecord::from_value(&json), record);
    }

    #[test]
    fn test_list_from_value_accepts_books_wrapper() {
        let wrapped = json!({"books": [{"title": "A"}, {"title": "B"}]});
        assert_eq!(BookRecord::list_from_value(&wrapped).len(), 2);
        assert_eq!(BookRecord::list_from_value(&json!([{"title": "A"}])).len(), 1);
        assert!(BookRecord::list_from_value(&json!(7)).is_empty());
    }
}
