use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric character id as used by the ratings endpoint.
pub type NumericId = i64;

/// Monotonically increasing id of a catalog fetch.
pub type Generation = u64;

/// Composite identity used for de-duplication: `(id, lowercased name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterKey {
    pub id: String,
    pub name: String,
}

impl CharacterKey {
    pub fn new(id: impl Into<String>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: normalize_name(name),
        }
    }
}

impl fmt::Display for CharacterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.name)
    }
}

/// Canonical lookup form of a character name (trimmed, lowercased).
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
