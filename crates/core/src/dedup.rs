//! De-duplication and normalization of raw catalog batches.
//!
//! Must run before a batch reaches the [`CatalogCache`](crate::cache::CatalogCache):
//! every downstream consumer assumes the cache is duplicate-free.

use std::collections::HashSet;

use crate::character::Character;
use crate::photos::PhotoMap;
use crate::record::RawCharacterRecord;
use crate::types::CharacterKey;

/// Composite identity of a raw record, or `None` when it has no id.
///
/// A missing name falls back to the id, matching [`Character::from_record`].
pub fn record_key(record: &RawCharacterRecord) -> Option<CharacterKey> {
    let id = record.id.as_ref()?.to_string();
    if id.is_empty() {
        return None;
    }
    let name = record.resolved_name().unwrap_or(&id).to_string();
    Some(CharacterKey::new(id, &name))
}

/// Keep the first occurrence of each `(id, lowercased name)` pair, in order.
///
/// Records without an id are dropped.
pub fn dedup_records(batch: Vec<RawCharacterRecord>) -> Vec<RawCharacterRecord> {
    let total = batch.len();
    let mut seen: HashSet<CharacterKey> = HashSet::with_capacity(total);
    let unique: Vec<RawCharacterRecord> = batch
        .into_iter()
        .filter(|record| match record_key(record) {
            Some(key) => seen.insert(key),
            None => false,
        })
        .collect();

    if unique.len() < total {
        tracing::debug!(total, unique = unique.len(), "Dropped duplicate or id-less records");
    }
    unique
}

/// Dedup a batch and project every survivor into a [`Character`].
pub fn normalize_batch(batch: Vec<RawCharacterRecord>, photos: &PhotoMap) -> Vec<Character> {
    dedup_records(batch)
        .iter()
        .filter_map(|record| Character::from_record(record, photos))
        .collect()
}
