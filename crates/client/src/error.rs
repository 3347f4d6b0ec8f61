/// Errors from the catalog REST client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with an unexpected status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body was JSON, but not in any shape we understand.
    #[error("Unexpected response shape from {url}")]
    UnexpectedShape { url: String },

    /// No refresh token is available to renew the session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The token refresh failed or the retried request was rejected again;
    /// the session has been cleared.
    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid configuration: {0}")]
    Config(String),
}
