//! Display order of the derived feed view.
//!
//! This is a presentation policy recomputed on every derived view; it is
//! never stored on the cache.
//!
//! Priority, highest first:
//! 1. characters with at least one photo,
//! 2. characters tagged "original" (or "оригинальный"),
//! 3. more likes,
//! 4. more comments, falling back to views when there are no comments.

use std::cmp::Ordering;

use crate::character::Character;
use crate::filter::normalize_tag;

/// Tags marking a character as an original creation.
pub const ORIGINAL_TAGS: &[&str] = &["original", "оригинальный"];

pub fn is_original(character: &Character) -> bool {
    character
        .tags
        .iter()
        .any(|t| ORIGINAL_TAGS.contains(&normalize_tag(t).as_str()))
}

fn engagement(character: &Character) -> u64 {
    if character.comments > 0 {
        character.comments
    } else {
        character.views
    }
}

/// Ordering for display: `Less` means `a` is shown before `b`.
pub fn compare_for_display(a: &Character, b: &Character) -> Ordering {
    b.has_photos()
        .cmp(&a.has_photos())
        .then_with(|| is_original(b).cmp(&is_original(a)))
        .then_with(|| b.likes.cmp(&a.likes))
        .then_with(|| engagement(b).cmp(&engagement(a)))
}

/// Stable sort into display order; ties keep catalog order.
pub fn sort_for_display(characters: &mut [&Character]) {
    characters.sort_by(|a, b| compare_for_display(a, b));
}
