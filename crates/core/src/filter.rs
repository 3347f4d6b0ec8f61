//! View filters: content mode and tag selection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// ContentMode
// ---------------------------------------------------------------------------

/// Binary view filter over the catalog. The two modes partition it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    #[default]
    Safe,
    Nsfw,
}

impl ContentMode {
    pub fn matches(self, character: &Character) -> bool {
        match self {
            ContentMode::Safe => !character.is_nsfw,
            ContentMode::Nsfw => character.is_nsfw,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentMode::Safe => "safe",
            ContentMode::Nsfw => "nsfw",
        }
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" | "sfw" => Ok(ContentMode::Safe),
            "nsfw" => Ok(ContentMode::Nsfw),
            other => Err(CoreError::InvalidContentMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TagSelection
// ---------------------------------------------------------------------------

/// Canonical comparison form of a tag.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// A set of selected tags combined with AND semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSelection {
    tags: BTreeSet<String>,
}

impl TagSelection {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|t| normalize_tag(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// True when every selected tag is present on the character.
    pub fn matches(&self, character: &Character) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        let own: BTreeSet<String> = character.tags.iter().map(|t| normalize_tag(t)).collect();
        self.tags.iter().all(|t| own.contains(t))
    }
}

// ---------------------------------------------------------------------------
// ViewFilter
// ---------------------------------------------------------------------------

/// Everything that decides which cached characters are in the derived view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    pub mode: ContentMode,
    pub tags: TagSelection,
}

impl ViewFilter {
    pub fn new(mode: ContentMode, tags: TagSelection) -> Self {
        Self { mode, tags }
    }

    pub fn matches(&self, character: &Character) -> bool {
        self.mode.matches(character) && self.tags.matches(character)
    }
}
