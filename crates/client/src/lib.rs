//! REST client for the character catalog backend.
//!
//! [`CatalogApi`] wraps the catalog, ratings, tags, and photo-map
//! endpoints using [`reqwest`], tries the catalog endpoints in fallback
//! order, and implements [`charfeed_core::ports::CatalogSource`] so the
//! feed can be driven from it. Authenticated calls go through an optional
//! [`AuthSession`] that refreshes the access token once on a 401.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
mod source;

pub use api::{CatalogApi, EndpointOutcome};
pub use auth::{AuthSession, AuthTokens};
pub use config::ApiConfig;
pub use error::ClientError;
