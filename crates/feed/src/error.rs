use charfeed_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Every catalog source failed. The cache has been emptied.
    #[error("Catalog fetch failed: {0}")]
    FetchFailed(String),
}
