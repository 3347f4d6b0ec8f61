//! Domain model and pure data-shaping logic for the character feed.
//!
//! Nothing in this crate performs I/O. The REST client lives in
//! `charfeed-client`, the async feed façade in `charfeed-feed`; both
//! build on the types and helpers defined here:
//!
//! - [`record`] -- lenient decoding of raw catalog records.
//! - [`photos`] -- the name-keyed [`photos::PhotoMap`] and URL rewriting.
//! - [`dedup`] -- composite-key de-duplication and normalization.
//! - [`filter`] / [`sort`] -- content mode, tag selection, display order.
//! - [`cache`] -- the owned [`cache::CatalogCache`] with cursor paging.
//! - [`ports`] -- the [`ports::CatalogSource`] seam implemented by clients.

pub mod cache;
pub mod character;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod photos;
pub mod ports;
pub mod record;
pub mod sort;
pub mod tags;
pub mod types;
