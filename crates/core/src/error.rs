#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid content mode: {0}")]
    InvalidContentMode(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
