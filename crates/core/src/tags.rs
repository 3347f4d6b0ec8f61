//! Tag descriptors from `available-tags`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One selectable tag. Bare-string descriptors use the string for every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDescriptor {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_ru: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
}

impl TagDescriptor {
    /// Parse a single descriptor; entries without a usable name yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self {
                name: s.trim().to_string(),
                slug: s.trim().to_string(),
                name_ru: None,
                name_en: None,
            }),
            Value::Object(map) => {
                let text = |key: &str| {
                    map.get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                let name = text("name")?;
                Some(Self {
                    slug: text("slug").unwrap_or_else(|| name.clone()),
                    name_ru: text("name_ru"),
                    name_en: text("name_en"),
                    name,
                })
            }
            _ => None,
        }
    }

    /// Parse a list response, skipping unusable entries.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(Self::from_value).collect())
            .unwrap_or_default()
    }

    /// Name for a UI language (`"ru"` / `"en"`), falling back to `name`.
    pub fn label(&self, language: &str) -> &str {
        let localized = match language {
            "ru" => self.name_ru.as_deref(),
            "en" => self.name_en.as_deref(),
            _ => None,
        };
        localized.unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_strings_and_objects() {
        let tags = TagDescriptor::list_from_value(&json!([
            "Fantasy",
            {"name": "Аниме", "slug": "anime", "name_ru": "Аниме", "name_en": "Anime"},
            {"slug": "nameless"},
            42
        ]));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].slug, "Fantasy");
        assert_eq!(tags[1].label("en"), "Anime");
        assert_eq!(tags[1].label("de"), "Аниме");
    }

    #[test]
    fn non_array_is_empty() {
        assert!(TagDescriptor::list_from_value(&json!({"tags": []})).is_empty());
    }
}
