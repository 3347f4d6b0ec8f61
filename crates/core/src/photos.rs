//! Photo URL resolution and the name-keyed photo index.
//!
//! Photos are never stored on a [`Character`](crate::character::Character)
//! directly from its own record; they are always looked up by name in a
//! [`PhotoMap`] built from the same batch (plus any supplementary maps),
//! so a rebuilt map is immediately reflected in every derived view.
//!
//! URLs served from the object-storage host are rewritten to the
//! same-origin `/media/<object-key>` proxy path.

use std::collections::HashMap;

use serde_json::Value;

use crate::record::RawCharacterRecord;
use crate::types::normalize_name;

/// Host marker identifying object-storage URLs.
pub const DEFAULT_STORAGE_HOST_MARKER: &str = "storage.yandexcloud.net/";

/// Proxy path prefix that object-storage keys are served under.
pub const MEDIA_PREFIX: &str = "/media/";

// ---------------------------------------------------------------------------
// PhotoUrlResolver
// ---------------------------------------------------------------------------

/// Turns the raw URL strings found in records into URLs the client can load.
#[derive(Debug, Clone)]
pub struct PhotoUrlResolver {
    base_url: String,
    storage_marker: String,
}

impl PhotoUrlResolver {
    /// * `base_url` - public base URL; empty means same-origin relative paths.
    /// * `storage_marker` - substring that identifies object-storage URLs.
    pub fn new(base_url: impl Into<String>, storage_marker: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            storage_marker: storage_marker.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve one raw URL. Blank input yields `None`.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if !self.storage_marker.is_empty() {
            if let Some((_, key)) = raw.split_once(self.storage_marker.as_str()) {
                let key = key.trim_start_matches('/');
                return Some(format!("{}{MEDIA_PREFIX}{key}", self.base_url));
            }
        }

        if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:") {
            return Some(raw.to_string());
        }

        if raw.starts_with('/') {
            Some(format!("{}{raw}", self.base_url))
        } else {
            Some(format!("{}/{raw}", self.base_url))
        }
    }
}

impl Default for PhotoUrlResolver {
    fn default() -> Self {
        Self::new("", DEFAULT_STORAGE_HOST_MARKER)
    }
}

// ---------------------------------------------------------------------------
// Entry extraction
// ---------------------------------------------------------------------------

/// Expand a `main_photos` value into its list of entries.
///
/// Accepts an array, a JSON-encoded array (or single entry) string, or
/// nothing. Malformed JSON yields an empty list.
pub fn photo_entries(main_photos: Option<&Value>) -> Vec<Value> {
    match main_photos {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(encoded)) => {
            let encoded = encoded.trim();
            if encoded.is_empty() {
                return Vec::new();
            }
            match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Array(items)) => items,
                Ok(Value::Null) => Vec::new(),
                Ok(single) => vec![single],
                Err(e) => {
                    tracing::debug!(error = %e, "Ignoring malformed main_photos JSON");
                    Vec::new()
                }
            }
        }
        Some(single @ Value::Object(_)) => vec![single.clone()],
        Some(_) => Vec::new(),
    }
}

/// URL of a single photo entry: bare string, `{url}`, or `{photo_url}`.
pub fn entry_url(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("url")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| map.get("photo_url").and_then(Value::as_str)),
        _ => None,
    }
}

fn resolve_entries(entries: &[Value], resolver: &PhotoUrlResolver) -> Vec<String> {
    entries
        .iter()
        .filter_map(entry_url)
        .filter_map(|raw| resolver.resolve(raw))
        .collect()
}

// ---------------------------------------------------------------------------
// PhotoMap
// ---------------------------------------------------------------------------

/// Lowercased character name → ordered photo URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoMap {
    entries: HashMap<String, Vec<String>>,
}

impl PhotoMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from a raw catalog batch.
    ///
    /// Records without a resolvable name are skipped. When a name occurs
    /// more than once, the first non-empty photo list is kept.
    pub fn from_records(records: &[RawCharacterRecord], resolver: &PhotoUrlResolver) -> Self {
        let mut map = Self::new();
        for record in records {
            let Some(name) = record.resolved_name() else {
                continue;
            };
            let urls = resolve_entries(&photo_entries(record.main_photos.as_ref()), resolver);
            map.insert_if_missing(name, urls);
        }
        map
    }

    /// Build a map from a supplementary `{ name: [photo, ...] }` document.
    ///
    /// Values may be arrays or JSON-encoded strings, like `main_photos`.
    /// Anything other than an object yields an empty map.
    pub fn from_supplementary(document: &Value, resolver: &PhotoUrlResolver) -> Self {
        let mut map = Self::new();
        let Some(object) = document.as_object() else {
            return map;
        };
        for (name, photos) in object {
            let urls = resolve_entries(&photo_entries(Some(photos)), resolver);
            map.insert_if_missing(name, urls);
        }
        map
    }

    /// Photos for a name (case-insensitive). Empty when unknown.
    pub fn get(&self, name: &str) -> &[String] {
        self.entries
            .get(&normalize_name(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Merge `other` in without overwriting entries that already have photos.
    ///
    /// Returns the number of names that gained photos.
    pub fn merge_missing(&mut self, other: PhotoMap) -> usize {
        let mut added = 0;
        for (key, urls) in other.entries {
            if self.insert_key_if_missing(key, urls) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_if_missing(&mut self, name: &str, urls: Vec<String>) -> bool {
        let key = normalize_name(name);
        if key.is_empty() {
            return false;
        }
        self.insert_key_if_missing(key, urls)
    }

    fn insert_key_if_missing(&mut self, key: String, urls: Vec<String>) -> bool {
        if urls.is_empty() {
            self.entries.entry(key).or_default();
            return false;
        }
        let slot = self.entries.entry(key).or_default();
        if slot.is_empty() {
            *slot = urls;
            true
        } else {
            false
        }
    }
}
