//! Async feed façade over the character catalog.
//!
//! [`FeedService`] owns the [`charfeed_core::cache::CatalogCache`] together
//! with the active content mode and tag selection, drives catalog loads
//! through a [`charfeed_core::ports::CatalogSource`], and broadcasts
//! [`FeedUpdate`]s to subscribers. It implements
//! [`charfeed_events::CatalogObserver`] so the invalidation listener can
//! force refreshes directly.

pub mod config;
pub mod error;
pub mod poller;
pub mod sentinel;
pub mod service;

pub use config::FeedConfig;
pub use error::FeedError;
pub use poller::run_poller;
pub use sentinel::{ScrollSentinel, ViewportGeometry};
pub use service::{FeedService, FeedSnapshot, FeedUpdate, LoadOutcome};
