//! Raw catalog records as returned by the backend.
//!
//! The backend schema is not under our control, so decoding is lenient:
//! ids may be strings or numbers, tags may be strings or `{name}` objects,
//! counters may be numbers or numeric strings. A single malformed record
//! is skipped instead of failing the whole batch.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::NumericId;

// ---------------------------------------------------------------------------
// Field shapes
// ---------------------------------------------------------------------------

/// A record id, either numeric or textual.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// The id as used by the ratings endpoint, if it is numeric.
    pub fn as_numeric(&self) -> Option<NumericId> {
        match self {
            RecordId::Int(n) => Some(*n),
            RecordId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s.trim()),
        }
    }
}

/// A tag entry: bare string, `{name}` object, or something unusable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTag {
    Name(String),
    Object { name: String },
    Other(Value),
}

impl RawTag {
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            RawTag::Name(s) => s.as_str(),
            RawTag::Object { name } => name.as_str(),
            RawTag::Other(_) => return None,
        };
        let name = name.trim();
        (!name.is_empty()).then_some(name)
    }
}

// ---------------------------------------------------------------------------
// RawCharacterRecord
// ---------------------------------------------------------------------------

/// One entry of the catalog response, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCharacterRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub character_appearance: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<RawTag>>,
    #[serde(default)]
    pub is_nsfw: Option<bool>,
    /// Array, JSON-encoded string, or absent.
    #[serde(default)]
    pub main_photos: Option<Value>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub likes: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub views: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub comments: Option<u64>,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub creator_username: Option<String>,
}

impl RawCharacterRecord {
    /// `name`, falling back to `display_name`. Blank values count as missing.
    pub fn resolved_name(&self) -> Option<&str> {
        [self.name.as_deref(), self.display_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// `description`, falling back to `character_appearance`.
    pub fn resolved_description(&self) -> &str {
        [
            self.description.as_deref(),
            self.character_appearance.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or("")
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags
            .iter()
            .flatten()
            .filter_map(RawTag::name)
            .map(str::to_string)
            .collect()
    }

    /// A non-null `user_id` marks the character as user-authored.
    pub fn is_user_authored(&self) -> bool {
        self.user_id.as_ref().is_some_and(|v| !v.is_null())
    }
}

/// Accept `12`, `12.0`, or `"12"`; anything else becomes `None`.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

// ---------------------------------------------------------------------------
// Batch extraction
// ---------------------------------------------------------------------------

/// Pull the record list out of a catalog response body.
///
/// Accepts either a bare array or an object with a `characters` array.
/// Returns `None` when the body has neither shape. Entries that fail to
/// decode are skipped.
pub fn extract_records(body: Value) -> Option<Vec<RawCharacterRecord>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("characters") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let total = items.len();
    let records: Vec<RawCharacterRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable catalog record");
                None
            }
        })
        .collect();

    if records.len() < total {
        tracing::debug!(total, kept = records.len(), "Catalog batch had undecodable records");
    }

    Some(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_numeric_and_string_ids() {
        let a: RawCharacterRecord = serde_json::from_value(json!({"id": 7})).unwrap();
        let b: RawCharacterRecord = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert_eq!(a.id.unwrap().to_string(), "7");
        assert_eq!(b.id.as_ref().unwrap().to_string(), "abc");
        assert_eq!(b.id.unwrap().as_numeric(), None);
    }

    #[test]
    fn numeric_string_id_parses_for_ratings() {
        assert_eq!(RecordId::Text(" 42 ".into()).as_numeric(), Some(42));
    }

    #[test]
    fn counters_accept_strings_and_floats() {
        let r: RawCharacterRecord =
            serde_json::from_value(json!({"likes": "12", "views": 3.0, "comments": "x"})).unwrap();
        assert_eq!(r.likes, Some(12));
        assert_eq!(r.views, Some(3));
        assert_eq!(r.comments, None);
    }

    #[test]
    fn tags_accept_strings_and_objects() {
        let r: RawCharacterRecord = serde_json::from_value(json!({
            "tags": ["Fantasy", {"name": " Anime "}, 5, {"slug": "x"}, ""]
        }))
        .unwrap();
        assert_eq!(r.tag_names(), vec!["Fantasy", "Anime"]);
    }

    #[test]
    fn name_falls_back_to_display_name() {
        let r: RawCharacterRecord =
            serde_json::from_value(json!({"name": "  ", "display_name": "Mira"})).unwrap();
        assert_eq!(r.resolved_name(), Some("Mira"));
    }

    #[test]
    fn description_falls_back_to_appearance() {
        let r: RawCharacterRecord =
            serde_json::from_value(json!({"character_appearance": "tall"})).unwrap();
        assert_eq!(r.resolved_description(), "tall");
    }

    #[test]
    fn null_user_id_is_system_authored() {
        let r: RawCharacterRecord = serde_json::from_value(json!({"user_id": null})).unwrap();
        assert!(!r.is_user_authored());
        let r: RawCharacterRecord = serde_json::from_value(json!({"user_id": 3})).unwrap();
        assert!(r.is_user_authored());
    }

    #[test]
    fn extract_accepts_array_and_wrapped_object() {
        assert_eq!(extract_records(json!([{"id": 1}, {"id": 2}])).unwrap().len(), 2);
        assert_eq!(
            extract_records(json!({"characters": [{"id": 1}]})).unwrap().len(),
            1
        );
    }

    #[test]
    fn extract_rejects_other_shapes() {
        assert!(extract_records(json!({"items": []})).is_none());
        assert!(extract_records(json!("nope")).is_none());
    }

    #[test]
    fn extract_skips_non_object_entries() {
        let records = extract_records(json!([{"id": 1}, "garbage", {"id": 2}])).unwrap();
        assert_eq!(records.len(), 2);
    }
}
