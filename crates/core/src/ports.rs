//! The seam between the feed and whatever serves the catalog.
//!
//! `charfeed-client` implements [`CatalogSource`] over HTTP; tests
//! implement it in memory.

use async_trait::async_trait;
use serde_json::Value;

use crate::character::Rating;
use crate::record::RawCharacterRecord;
use crate::types::NumericId;

/// Parameters of one catalog fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogRequest {
    pub skip: u64,
    pub limit: u64,
    /// Ask the backend to bypass its own caches.
    pub force_refresh: bool,
}

/// Result of fetching the catalog.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A non-empty batch.
    Records(Vec<RawCharacterRecord>),
    /// A source answered, but with no records.
    Empty,
    /// Every source failed; the message describes the last failure.
    Failed(String),
}

impl FetchOutcome {
    /// Records of a successful fetch; empty for `Empty` and `Failed`.
    pub fn into_records(self) -> Vec<RawCharacterRecord> {
        match self {
            FetchOutcome::Records(records) => records,
            FetchOutcome::Empty | FetchOutcome::Failed(_) => Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch (a page of) the catalog. Never errors: failures are folded
    /// into [`FetchOutcome::Failed`].
    async fn fetch_catalog(&self, request: CatalogRequest) -> FetchOutcome;

    /// Supplementary `{ name: [photo, ...] }` documents, in priority order.
    /// Sources that fail are omitted.
    async fn fetch_supplementary_photos(&self) -> Vec<Value>;

    /// Like/dislike counters of one character, or `None` on any failure.
    async fn fetch_rating(&self, id: NumericId) -> Option<Rating>;
}
