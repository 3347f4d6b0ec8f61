//! Catalog invalidation events.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub for [`CatalogEvent`]s,
//!   backed by `tokio::sync::broadcast`.
//! - [`CatalogObserver`] -- the interface the data layer implements to be
//!   told that its catalog went stale.
//! - [`run_invalidation_listener`] -- debounces bus events per kind and
//!   forwards them to an observer.

pub mod bus;
pub mod debounce;

pub use bus::{CatalogEvent, CatalogEventKind, EventBus, UnknownEventKind};
pub use debounce::{run_invalidation_listener, CatalogObserver, Debouncer, InvalidationReason};
