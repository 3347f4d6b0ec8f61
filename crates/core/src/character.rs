//! The normalized, client-owned character model.

use serde::{Deserialize, Serialize};

use crate::photos::PhotoMap;
use crate::record::RawCharacterRecord;
use crate::types::{CharacterKey, NumericId};

/// Who authored a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Author {
    User,
    System,
}

/// A catalog entry ready for display.
///
/// Immutable after projection except for `likes` / `dislikes`, which may
/// be overlaid from a separately fetched [`Rating`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Uppercased first letter of the name.
    pub avatar: char,
    pub photos: Vec<String>,
    pub tags: Vec<String>,
    pub author: Author,
    pub likes: u64,
    pub dislikes: u64,
    pub views: u64,
    pub comments: u64,
    pub is_nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_username: Option<String>,
}

impl Character {
    /// Project a raw record into a `Character`, taking photos from `photos`.
    ///
    /// Returns `None` for records without an id.
    pub fn from_record(record: &RawCharacterRecord, photos: &PhotoMap) -> Option<Self> {
        let id = record.id.as_ref()?.to_string();
        if id.is_empty() {
            return None;
        }
        let name = record
            .resolved_name()
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());

        Some(Self {
            avatar: avatar_for(&name),
            photos: photos.get(&name).to_vec(),
            description: record.resolved_description().to_string(),
            tags: record.tag_names(),
            author: if record.is_user_authored() {
                Author::User
            } else {
                Author::System
            },
            likes: record.likes.unwrap_or(0),
            dislikes: 0,
            views: record.views.unwrap_or(0),
            comments: record.comments.unwrap_or(0),
            is_nsfw: record.is_nsfw.unwrap_or(false),
            creator_username: record
                .creator_username
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            id,
            name,
        })
    }

    pub fn key(&self) -> CharacterKey {
        CharacterKey::new(self.id.clone(), &self.name)
    }

    /// The id as used by the ratings endpoint, if it is numeric.
    pub fn numeric_id(&self) -> Option<NumericId> {
        self.id.parse().ok()
    }

    pub fn has_photos(&self) -> bool {
        !self.photos.is_empty()
    }

    /// Replace like/dislike counters with a fetched rating.
    pub fn apply_rating(&mut self, rating: Rating) {
        self.likes = rating.likes;
        self.dislikes = rating.dislikes;
    }
}

fn avatar_for(name: &str) -> char {
    name.chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?')
}

/// Like/dislike counters from `character-ratings/{id}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
}
