//! The feed service: one owner for the cache and its view state.
//!
//! All mutable state lives in a single [`FeedState`] behind a
//! `tokio::sync::RwLock`. Network calls are made without holding the lock;
//! the cache's generation counter decides whether a finished fetch may
//! still be applied. Refresh coalescing uses a separate [`RefreshGate`]
//! so a dropped refresh can release it synchronously.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use charfeed_core::cache::{CacheState, CatalogCache, Page};
use charfeed_core::character::{Character, Rating};
use charfeed_core::dedup::normalize_batch;
use charfeed_core::filter::{ContentMode, TagSelection, ViewFilter};
use charfeed_core::photos::{PhotoMap, PhotoUrlResolver};
use charfeed_core::ports::{CatalogRequest, CatalogSource, FetchOutcome};
use charfeed_core::types::{Generation, NumericId};
use charfeed_events::{CatalogObserver, InvalidationReason};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::sentinel::{ScrollSentinel, ViewportGeometry};

/// Broadcast channel capacity for feed updates.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Notification sent to feed subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedUpdate {
    /// A fetch was applied to the cache and the first page recomputed.
    CatalogLoaded {
        generation: Generation,
        cached: usize,
        total: usize,
        revealed: usize,
        failed: bool,
    },
    /// A refresh is starting.
    CatalogInvalidated { reason: InvalidationReason },
    /// Content mode or tag selection changed; the cursor was reset.
    FilterChanged {
        mode: ContentMode,
        tags: Vec<String>,
        total: usize,
        revealed: usize,
    },
    PageRevealed {
        revealed: usize,
        total: usize,
        has_more: bool,
    },
    /// Counters were overlaid. Likes are a sort key, so the view was
    /// re-sorted and the cursor reset to the new first page.
    RatingsApplied {
        updated: usize,
        total: usize,
        revealed: usize,
    },
}

/// What became of a load or refresh request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The fetch was applied; this is the new first page.
    Loaded(Page),
    /// A newer fetch started meanwhile; this result was discarded.
    Superseded,
    /// A refresh was already running; it will run once more afterwards.
    Coalesced,
}

/// Point-in-time view of the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub state: CacheState,
    pub generation: Generation,
    pub mode: ContentMode,
    pub tags: Vec<String>,
    /// The revealed prefix of the filtered view.
    pub items: Vec<Character>,
    /// Size of the filtered view.
    pub total: usize,
    pub has_more: bool,
    /// Whether a catalog fetch is in flight.
    pub is_loading: bool,
    /// Whether the end-of-list sentinel should be shown.
    pub sentinel_visible: bool,
}

// ---------------------------------------------------------------------------
// FeedState
// ---------------------------------------------------------------------------

struct FeedState {
    cache: CatalogCache,
    mode: ContentMode,
    tags: TagSelection,
}

impl FeedState {
    fn filter(&self) -> ViewFilter {
        ViewFilter::new(self.mode, self.tags.clone())
    }

    fn is_loading(&self) -> bool {
        matches!(
            self.cache.state(),
            CacheState::Loading | CacheState::Refreshing
        )
    }

    fn tag_list(&self) -> Vec<String> {
        self.tags.iter().map(str::to_string).collect()
    }
}

// ---------------------------------------------------------------------------
// RefreshGate
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RefreshGate {
    in_flight: bool,
    /// Set when refreshes were requested during a running one. `true` if
    /// any of them asked the backend to bypass its caches.
    pending: Option<bool>,
}

fn lock_gate(gate: &Mutex<RefreshGate>) -> MutexGuard<'_, RefreshGate> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a refresh as running until it finishes or is dropped.
struct RefreshTicket<'a> {
    gate: &'a Mutex<RefreshGate>,
    armed: bool,
}

impl<'a> RefreshTicket<'a> {
    /// Claim the gate, or record a pending request and return `None`.
    fn acquire(gate: &'a Mutex<RefreshGate>, force_refresh: bool) -> Option<Self> {
        let mut guard = lock_gate(gate);
        if guard.in_flight {
            guard.pending = Some(guard.pending.unwrap_or(false) || force_refresh);
            return None;
        }
        guard.in_flight = true;
        Some(Self { gate, armed: true })
    }

    /// Take a pending request, or release the gate when there is none.
    /// Both happen under one lock so no request slips in between.
    fn next_pending(&mut self) -> Option<bool> {
        let mut guard = lock_gate(self.gate);
        let pending = guard.pending.take();
        if pending.is_none() {
            guard.in_flight = false;
            self.armed = false;
        }
        pending
    }
}

impl Drop for RefreshTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Refresh dropped before completion, releasing");
            let mut guard = lock_gate(self.gate);
            guard.in_flight = false;
            guard.pending = None;
        }
    }
}

// ---------------------------------------------------------------------------
// FeedService
// ---------------------------------------------------------------------------

pub struct FeedService<S: ?Sized> {
    state: RwLock<FeedState>,
    refresh_gate: Mutex<RefreshGate>,
    updates: broadcast::Sender<FeedUpdate>,
    resolver: PhotoUrlResolver,
    sentinel: ScrollSentinel,
    config: FeedConfig,
    source: Arc<S>,
}

impl<S> FeedService<S>
where
    S: CatalogSource + ?Sized,
{
    /// Create an empty feed. Nothing is fetched until [`FeedService::load`].
    pub fn new(source: Arc<S>, resolver: PhotoUrlResolver, config: FeedConfig) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let state = FeedState {
            cache: CatalogCache::new(config.page_size),
            mode: config.content_mode,
            tags: TagSelection::default(),
        };
        Self {
            state: RwLock::new(state),
            refresh_gate: Mutex::new(RefreshGate::default()),
            updates,
            resolver,
            sentinel: ScrollSentinel::default(),
            config,
            source,
        }
    }

    /// Replace the default scroll sentinel.
    pub fn with_sentinel(mut self, sentinel: ScrollSentinel) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedUpdate> {
        self.updates.subscribe()
    }

    // ---- loading ----

    /// Fetch the full catalog and reveal the first page.
    ///
    /// A failed fetch empties the cache, publishes the (empty) result and
    /// returns [`FeedError::FetchFailed`].
    pub async fn load(&self) -> Result<LoadOutcome, FeedError> {
        self.fetch_and_apply(false).await
    }

    /// Refetch because the catalog went stale.
    ///
    /// Only one refresh runs at a time. Requests arriving meanwhile are
    /// folded into a single trailing refresh and return
    /// [`LoadOutcome::Coalesced`]. Dropping a running refresh (timeout,
    /// `select!`, aborted task) releases the gate for the next caller.
    pub async fn refresh(&self, reason: InvalidationReason) -> Result<LoadOutcome, FeedError> {
        let Some(mut ticket) = RefreshTicket::acquire(&self.refresh_gate, reason.forces_refresh())
        else {
            tracing::debug!(?reason, "Refresh already running, coalescing");
            return Ok(LoadOutcome::Coalesced);
        };

        tracing::info!(?reason, "Refreshing catalog");
        self.publish(FeedUpdate::CatalogInvalidated { reason });

        let mut force_refresh = reason.forces_refresh();
        loop {
            let result = self.fetch_and_apply(force_refresh).await;

            match ticket.next_pending() {
                Some(force) => {
                    tracing::debug!(force_refresh = force, "Running trailing refresh");
                    force_refresh = force;
                }
                None => return result,
            }
        }
    }

    async fn fetch_and_apply(&self, force_refresh: bool) -> Result<LoadOutcome, FeedError> {
        let generation = self.state.write().await.cache.begin_fetch();
        let request = CatalogRequest {
            skip: 0,
            limit: self.config.catalog_limit,
            force_refresh,
        };

        let outcome = self.source.fetch_catalog(request).await;
        let failure = match &outcome {
            FetchOutcome::Failed(message) => Some(message.clone()),
            FetchOutcome::Records(_) | FetchOutcome::Empty => None,
        };

        let records = outcome.into_records();
        let batch = if records.is_empty() {
            Vec::new()
        } else {
            let mut photos = PhotoMap::from_records(&records, &self.resolver);
            for document in self.source.fetch_supplementary_photos().await {
                let added = photos.merge_missing(PhotoMap::from_supplementary(&document, &self.resolver));
                if added > 0 {
                    tracing::debug!(added, "Merged supplementary photos");
                }
            }
            normalize_batch(records, &photos)
        };

        let mut state = self.state.write().await;
        let applied = if failure.is_some() {
            state.cache.fail(generation)
        } else {
            state.cache.ingest(generation, batch)
        };
        if !applied {
            return Ok(LoadOutcome::Superseded);
        }

        let filter = state.filter();
        let page = state.cache.first_page(&filter);
        let cached = state.cache.len();
        drop(state);

        self.publish(FeedUpdate::CatalogLoaded {
            generation,
            cached,
            total: page.total,
            revealed: page.revealed,
            failed: failure.is_some(),
        });

        match failure {
            Some(message) => {
                tracing::warn!(generation, error = %message, "Catalog fetch failed, cache emptied");
                Err(FeedError::FetchFailed(message))
            }
            None => {
                tracing::info!(
                    generation,
                    cached,
                    visible = page.total,
                    force_refresh,
                    "Catalog loaded",
                );
                Ok(LoadOutcome::Loaded(page))
            }
        }
    }

    // ---- filters ----

    /// Switch between safe and NSFW content.
    ///
    /// With a loaded cache this only recomputes the view and returns its
    /// first page. Otherwise the dedup tracking is cleared and a load is
    /// started; the returned outcome is that load's.
    pub async fn set_content_mode(&self, mode: ContentMode) -> Result<LoadOutcome, FeedError> {
        let mut state = self.state.write().await;
        state.mode = mode;

        if state.cache.is_loaded() {
            let filter = state.filter();
            let page = state.cache.first_page(&filter);
            let tags = state.tag_list();
            drop(state);
            self.publish_filter_change(mode, tags, &page);
            return Ok(LoadOutcome::Loaded(page));
        }

        state.cache.reset_tracking();
        drop(state);
        tracing::debug!(%mode, "Content mode changed before load, fetching");
        self.load().await
    }

    /// Replace the selected tags (AND semantics) and return the new first
    /// page. The cache itself is untouched.
    pub async fn set_selected_tags<I, T>(&self, tags: I) -> Page
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut state = self.state.write().await;
        state.tags = TagSelection::new(tags);
        let filter = state.filter();
        let page = state.cache.first_page(&filter);
        let mode = state.mode;
        let tags = state.tag_list();
        drop(state);

        self.publish_filter_change(mode, tags, &page);
        page
    }

    fn publish_filter_change(&self, mode: ContentMode, tags: Vec<String>, page: &Page) {
        tracing::debug!(%mode, total = page.total, "Feed filter changed");
        self.publish(FeedUpdate::FilterChanged {
            mode,
            tags,
            total: page.total,
            revealed: page.revealed,
        });
    }

    // ---- reveal ----

    /// Reveal the next page of the current view.
    ///
    /// Returns `None` while a fetch is in flight or when the view is
    /// exhausted. Never fetches.
    pub async fn load_more(&self) -> Option<Page> {
        let mut state = self.state.write().await;
        if state.is_loading() || !state.cache.is_loaded() {
            return None;
        }
        let filter = state.filter();
        let page = state.cache.next_page(&filter)?;
        drop(state);

        self.publish(FeedUpdate::PageRevealed {
            revealed: page.revealed,
            total: page.total,
            has_more: page.has_more,
        });
        Some(page)
    }

    /// Reveal the next page if the sentinel is close enough to the viewport.
    pub async fn on_scroll(&self, geometry: ViewportGeometry) -> Option<Page> {
        if !self.sentinel.is_triggered(geometry) {
            return None;
        }
        self.load_more().await
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.read().await;
        let filter = state.filter();
        let items = state.cache.revealed(&filter);
        let total = state.cache.filtered_view(&filter).len();
        let has_more = state.cache.has_more(&filter);
        FeedSnapshot {
            state: state.cache.state(),
            generation: state.cache.generation(),
            mode: state.mode,
            tags: state.tag_list(),
            items,
            total,
            has_more,
            is_loading: state.is_loading(),
            sentinel_visible: has_more,
        }
    }

    // ---- ratings ----

    /// Fetch like/dislike counters for every cached character with a
    /// numeric id and overlay them. Returns the number updated.
    ///
    /// When anything changed the view is re-sorted and the cursor reset to
    /// the first page, so later pages never repeat or skip characters.
    pub async fn refresh_ratings(&self) -> usize {
        let ids = self.state.read().await.cache.numeric_ids();
        if ids.is_empty() {
            return 0;
        }

        let source = &self.source;
        let ratings: HashMap<NumericId, Rating> = stream::iter(ids)
            .map(|id| async move { (id, source.fetch_rating(id).await) })
            .buffer_unordered(self.config.rating_concurrency)
            .filter_map(|(id, rating)| async move { rating.map(|r| (id, r)) })
            .collect()
            .await;

        let mut state = self.state.write().await;
        let updated = state.cache.apply_ratings(&ratings);
        if updated == 0 {
            return 0;
        }
        let filter = state.filter();
        let page = state.cache.first_page(&filter);
        drop(state);

        tracing::info!(fetched = ratings.len(), updated, "Ratings applied");
        self.publish(FeedUpdate::RatingsApplied {
            updated,
            total: page.total,
            revealed: page.revealed,
        });
        updated
    }

    fn publish(&self, update: FeedUpdate) {
        // No subscribers is fine.
        let _ = self.updates.send(update);
    }
}

#[async_trait]
impl<S> CatalogObserver for FeedService<S>
where
    S: CatalogSource + ?Sized,
{
    async fn on_catalog_invalidated(&self, reason: InvalidationReason) {
        match self.refresh(reason).await {
            Ok(LoadOutcome::Loaded(page)) => {
                tracing::debug!(?reason, visible = page.total, "Invalidation handled");
            }
            Ok(outcome) => tracing::debug!(?reason, ?outcome, "Invalidation deferred"),
            Err(e) => tracing::warn!(?reason, error = %e, "Refresh after invalidation failed"),
        }
    }
}
