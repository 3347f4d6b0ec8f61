//! Owned full-catalog cache with filter-aware cursor paging.
//!
//! [`CatalogCache`] holds the de-duplicated catalog of the latest fetch and
//! a cursor counting how many entries of the *currently filtered* view have
//! been revealed. The visible list is always the prefix `view[..cursor]`.
//!
//! Every fetch is tagged with a [`Generation`]; a result whose generation
//! is no longer current when it arrives is discarded, so an older response
//! can never overwrite a newer one.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::character::{Character, Rating};
use crate::filter::ViewFilter;
use crate::sort::sort_for_display;
use crate::types::{CharacterKey, Generation, NumericId};

/// Number of characters revealed per page.
pub const DEFAULT_PAGE_SIZE: usize = 26;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    /// Nothing fetched yet.
    Empty,
    /// First fetch in flight.
    Loading,
    /// Full catalog cached.
    Loaded,
    /// Forced refetch in flight; the previous catalog is still served.
    Refreshing,
}

/// One slice of the derived view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    /// Characters in this slice, in display order.
    pub items: Vec<Character>,
    /// Cursor after this slice was revealed.
    pub revealed: usize,
    /// Size of the filtered view.
    pub total: usize,
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// CatalogCache
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CatalogCache {
    entries: Vec<Character>,
    loaded_keys: HashSet<CharacterKey>,
    state: CacheState,
    generation: Generation,
    cursor: usize,
    page_size: usize,
}

impl CatalogCache {
    /// Create an empty cache. A zero page size is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            loaded_keys: HashSet::new(),
            state: CacheState::Empty,
            generation: 0,
            cursor: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, CacheState::Loaded | CacheState::Refreshing)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of cached characters, unfiltered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ---- fetch lifecycle ----

    /// Start a fetch and return its generation.
    ///
    /// A loaded cache moves to `Refreshing` and keeps serving its entries;
    /// otherwise the cache moves to `Loading`.
    pub fn begin_fetch(&mut self) -> Generation {
        self.generation += 1;
        self.state = if self.is_loaded() {
            CacheState::Refreshing
        } else {
            CacheState::Loading
        };
        self.generation
    }

    /// Replace the catalog with a fetched batch.
    ///
    /// Returns `false` (and changes nothing) when `generation` is stale.
    /// Duplicates that slipped past normalization are dropped here too.
    pub fn ingest(&mut self, generation: Generation, batch: Vec<Character>) -> bool {
        if generation != self.generation {
            tracing::debug!(
                generation,
                current = self.generation,
                "Discarding stale catalog batch",
            );
            return false;
        }

        self.entries.clear();
        self.loaded_keys.clear();
        for character in batch {
            if self.loaded_keys.insert(character.key()) {
                self.entries.push(character);
            }
        }
        self.state = CacheState::Loaded;
        self.cursor = 0;
        true
    }

    /// Record a failed fetch: the cache fails closed to an empty catalog.
    ///
    /// Returns `false` when `generation` is stale.
    pub fn fail(&mut self, generation: Generation) -> bool {
        self.ingest(generation, Vec::new())
    }

    /// Forget which keys were loaded (used when the mode changes before
    /// the first fetch completed).
    pub fn reset_tracking(&mut self) {
        self.loaded_keys.clear();
    }

    // ---- derived views ----

    /// The filtered, display-sorted view of the cache.
    pub fn filtered_view(&self, filter: &ViewFilter) -> Vec<&Character> {
        let mut view: Vec<&Character> = self.entries.iter().filter(|c| filter.matches(c)).collect();
        sort_for_display(&mut view);
        view
    }

    /// Reset the cursor for a (possibly new) filter and return the first page.
    pub fn first_page(&mut self, filter: &ViewFilter) -> Page {
        let view = self.filtered_view(filter);
        let end = self.page_size.min(view.len());
        let page = Page {
            items: view[..end].iter().map(|c| (*c).clone()).collect(),
            revealed: end,
            total: view.len(),
            has_more: end < view.len(),
        };
        self.cursor = end;
        page
    }

    /// Reveal the next page of the filtered view.
    ///
    /// Returns `None` when the view is exhausted. Never moves the cursor
    /// past the filtered length.
    pub fn next_page(&mut self, filter: &ViewFilter) -> Option<Page> {
        let view = self.filtered_view(filter);
        let start = self.cursor.min(view.len());
        if start >= view.len() {
            self.cursor = start;
            return None;
        }
        let end = (start + self.page_size).min(view.len());
        let page = Page {
            items: view[start..end].iter().map(|c| (*c).clone()).collect(),
            revealed: end,
            total: view.len(),
            has_more: end < view.len(),
        };
        self.cursor = end;
        Some(page)
    }

    /// The currently revealed prefix of the filtered view.
    pub fn revealed(&self, filter: &ViewFilter) -> Vec<Character> {
        let view = self.filtered_view(filter);
        let end = self.cursor.min(view.len());
        view[..end].iter().map(|c| (*c).clone()).collect()
    }

    pub fn has_more(&self, filter: &ViewFilter) -> bool {
        self.cursor < self.filtered_view(filter).len()
    }

    // ---- ratings ----

    /// Distinct numeric ids of all cached characters, ascending.
    pub fn numeric_ids(&self) -> Vec<NumericId> {
        let mut ids: Vec<NumericId> = self.entries.iter().filter_map(Character::numeric_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Overlay like/dislike counters keyed by numeric id.
    ///
    /// Returns the number of characters updated.
    pub fn apply_ratings(&mut self, ratings: &HashMap<NumericId, Rating>) -> usize {
        let mut updated = 0;
        for character in &mut self.entries {
            if let Some(rating) = character.numeric_id().and_then(|id| ratings.get(&id)) {
                character.apply_rating(*rating);
                updated += 1;
            }
        }
        updated
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Author;
    use crate::filter::{ContentMode, TagSelection};
    use assert_matches::assert_matches;

    fn character(id: usize, is_nsfw: bool, tags: &[&str]) -> Character {
        Character {
            id: id.to_string(),
            name: format!("char-{id}"),
            description: String::new(),
            avatar: 'C',
            photos: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author: Author::System,
            likes: 0,
            dislikes: 0,
            views: 0,
            comments: 0,
            is_nsfw,
            creator_username: None,
        }
    }

    fn loaded(batch: Vec<Character>) -> CatalogCache {
        let mut cache = CatalogCache::default();
        let generation = cache.begin_fetch();
        assert!(cache.ingest(generation, batch));
        cache
    }

    fn safe() -> ViewFilter {
        ViewFilter::new(ContentMode::Safe, TagSelection::default())
    }

    #[test]
    fn thirty_records_reveal_26_then_4() {
        let mut cache = loaded((0..30).map(|i| character(i, false, &[])).collect());

        let first = cache.first_page(&safe());
        assert_eq!(first.items.len(), 26);
        assert!(first.has_more);

        let second = cache.next_page(&safe()).expect("second page");
        assert_eq!(second.items.len(), 4);
        assert!(!second.has_more);
        assert!(cache.next_page(&safe()).is_none());
        assert!(!cache.has_more(&safe()));
    }

    #[test]
    fn paging_is_exhaustive_without_repeats() {
        let n = 83;
        let mut cache = loaded((0..n).map(|i| character(i, false, &[])).collect());

        let mut seen = HashSet::new();
        let mut loads = 1;
        for c in cache.first_page(&safe()).items {
            assert!(seen.insert(c.id));
        }
        while let Some(page) = cache.next_page(&safe()) {
            loads += 1;
            for c in page.items {
                assert!(seen.insert(c.id), "item revealed twice");
            }
        }

        assert_eq!(loads, n.div_ceil(DEFAULT_PAGE_SIZE));
        assert_eq!(seen.len(), n);
        assert!(!cache.has_more(&safe()));
    }

    #[test]
    fn cursor_resets_to_new_filter_first_page() {
        let mut batch: Vec<Character> = (0..40).map(|i| character(i, false, &[])).collect();
        batch.extend((40..45).map(|i| character(i, true, &[])));
        let mut cache = loaded(batch);

        cache.first_page(&safe());
        cache.next_page(&safe());
        assert_eq!(cache.cursor(), 40);

        let nsfw = ViewFilter::new(ContentMode::Nsfw, TagSelection::default());
        let page = cache.first_page(&nsfw);
        assert_eq!(cache.cursor(), 5);
        assert_eq!(page.items.len(), 5);
        assert!(page.items.iter().all(|c| c.is_nsfw));
        assert!(!page.has_more);
    }

    #[test]
    fn revealed_is_prefix_of_filtered_view() {
        let mut cache = loaded((0..30).map(|i| character(i, i % 2 == 0, &[])).collect());
        cache.first_page(&safe());
        let revealed = cache.revealed(&safe());
        let view = cache.filtered_view(&safe());
        assert_eq!(revealed.len(), 15);
        assert!(revealed.iter().zip(view).all(|(a, b)| a == b));
    }

    #[test]
    fn tag_filter_applies_and_semantics() {
        let mut cache = loaded(vec![
            character(1, false, &["A"]),
            character(2, false, &["A", "B"]),
            character(3, false, &["B"]),
        ]);
        let filter = ViewFilter::new(ContentMode::Safe, TagSelection::new(["a", "b"]));
        let page = cache.first_page(&filter);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "2");
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut cache = CatalogCache::default();
        let old = cache.begin_fetch();
        let new = cache.begin_fetch();

        assert!(cache.ingest(new, vec![character(1, false, &[])]));
        assert!(!cache.ingest(old, vec![character(2, false, &[]), character(3, false, &[])]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.state(), CacheState::Loaded);
    }

    #[test]
    fn refresh_keeps_serving_until_ingest() {
        let mut cache = loaded(vec![character(1, false, &[])]);
        let generation = cache.begin_fetch();
        assert_matches!(cache.state(), CacheState::Refreshing);
        assert_eq!(cache.len(), 1);

        cache.ingest(generation, vec![character(2, false, &[]), character(3, false, &[])]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failure_empties_the_cache() {
        let mut cache = loaded((0..5).map(|i| character(i, false, &[])).collect());
        let generation = cache.begin_fetch();
        assert!(cache.fail(generation));
        assert!(cache.is_empty());
        assert!(!cache.has_more(&safe()));
        assert!(cache.first_page(&safe()).items.is_empty());
    }

    #[test]
    fn ingest_drops_duplicate_keys() {
        let cache = loaded(vec![character(1, false, &[]), character(1, false, &[])]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn ratings_overlay_by_numeric_id() {
        let mut cache = loaded(vec![character(1, false, &[]), character(2, false, &[])]);
        let ratings = HashMap::from([(2, Rating { likes: 9, dislikes: 1 })]);
        assert_eq!(cache.apply_ratings(&ratings), 1);
        let view = cache.filtered_view(&safe());
        assert_eq!(view[0].id, "2", "more likes sort first");
        assert_eq!(view[0].dislikes, 1);
    }

    #[test]
    fn numeric_ids_cover_both_modes() {
        let mut text_id = character(9, false, &[]);
        text_id.id = "abc".into();
        let cache = loaded(vec![character(3, true, &[]), character(1, false, &[]), text_id]);
        assert_eq!(cache.numeric_ids(), vec![1, 3]);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(CatalogCache::new(0).page_size(), 1);
    }
}
