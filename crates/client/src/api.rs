//! HTTP client for the catalog backend.

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, PRAGMA};
use reqwest::StatusCode;
use serde_json::Value;

use charfeed_core::character::Rating;
use charfeed_core::ports::{CatalogRequest, FetchOutcome};
use charfeed_core::record::{extract_records, RawCharacterRecord};
use charfeed_core::tags::TagDescriptor;
use charfeed_core::types::NumericId;

use crate::auth::AuthSession;
use crate::config::{ApiConfig, AVAILABLE_TAGS_PATH, RATINGS_PATH};
use crate::error::ClientError;

/// Result of asking one catalog endpoint.
#[derive(Debug)]
pub enum EndpointOutcome {
    Records(Vec<RawCharacterRecord>),
    Empty,
    Failed(ClientError),
}

/// HTTP client for the catalog backend.
pub struct CatalogApi {
    client: reqwest::Client,
    config: ApiConfig,
    session: Option<Arc<AuthSession>>,
}

impl CatalogApi {
    /// Create a client with the configured request timeout.
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self {
            client,
            config,
            session: None,
        }
    }

    /// Attach a session used for authenticated calls.
    pub fn with_session(mut self, session: Arc<AuthSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    // ---- catalog ----

    /// Fetch the catalog, trying each configured endpoint in order.
    ///
    /// The first endpoint that answers with a catalog body wins, even when
    /// that body is an empty list. `Failed` means every endpoint failed.
    pub async fn fetch_catalog(&self, request: CatalogRequest) -> FetchOutcome {
        let mut last_error = None;

        for endpoint in self.config.catalog_endpoints() {
            match self.fetch_catalog_from(&endpoint, request).await {
                EndpointOutcome::Records(records) => {
                    tracing::info!(
                        endpoint = %endpoint,
                        count = records.len(),
                        force_refresh = request.force_refresh,
                        "Fetched character catalog",
                    );
                    return FetchOutcome::Records(records);
                }
                EndpointOutcome::Empty => {
                    tracing::info!(endpoint = %endpoint, "Catalog endpoint returned no records");
                    return FetchOutcome::Empty;
                }
                EndpointOutcome::Failed(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Catalog endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        FetchOutcome::Failed(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no catalog endpoints configured".to_string()),
        )
    }

    /// Ask a single catalog endpoint.
    ///
    /// Sends no-cache headers and a `_t` cache-busting timestamp. Only an
    /// HTTP 200 with an array (or `{characters: [...]}`) body counts.
    pub async fn fetch_catalog_from(&self, endpoint: &str, request: CatalogRequest) -> EndpointOutcome {
        let url = self.config.url(endpoint);
        let query = [
            ("skip", request.skip.to_string()),
            ("limit", request.limit.to_string()),
            ("force_refresh", request.force_refresh.to_string()),
            ("_t", Utc::now().timestamp_millis().to_string()),
        ];

        let response = match self
            .client
            .get(&url)
            .query(&query)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return EndpointOutcome::Failed(e.into()),
        };

        let response = match Self::ensure_status(response, StatusCode::OK).await {
            Ok(response) => response,
            Err(e) => return EndpointOutcome::Failed(e),
        };

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => return EndpointOutcome::Failed(e.into()),
        };

        match extract_records(body) {
            Some(records) if records.is_empty() => EndpointOutcome::Empty,
            Some(records) => EndpointOutcome::Records(records),
            None => EndpointOutcome::Failed(ClientError::UnexpectedShape { url }),
        }
    }

    // ---- auxiliary endpoints ----

    /// Like/dislike counters for one character.
    ///
    /// Sent with the session's bearer token when a session is attached.
    pub async fn fetch_rating(&self, id: NumericId) -> Result<Rating, ClientError> {
        let response = self
            .get_authorized(&format!("{RATINGS_PATH}/{id}"))
            .await?;
        Self::parse_response(response).await
    }

    /// The list of selectable tags.
    pub async fn fetch_available_tags(&self) -> Result<Vec<TagDescriptor>, ClientError> {
        let response = self
            .client
            .get(self.config.url(AVAILABLE_TAGS_PATH))
            .send()
            .await?;
        let body: Value = Self::parse_response(response).await?;
        Ok(TagDescriptor::list_from_value(&body))
    }

    /// A supplementary `{ name: [photo, ...] }` document.
    pub async fn fetch_photo_document(&self, path: &str) -> Result<Value, ClientError> {
        let url = self.config.url(path);
        let response = self
            .client
            .get(&url)
            .query(&[("_t", Utc::now().timestamp_millis().to_string())])
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let body: Value = Self::parse_response(response).await?;
        if body.is_object() {
            Ok(body)
        } else {
            Err(ClientError::UnexpectedShape { url })
        }
    }

    // ---- private helpers ----

    /// GET with the session's access token, refreshing once on a 401.
    async fn get_authorized(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = self.config.url(path);
        let Some(session) = &self.session else {
            return Ok(self.client.get(&url).send().await?);
        };

        let response = self.get_with_token(&url, session.access_token().await).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(url = %url, "Access token rejected, refreshing session");
        if let Err(e) = session.refresh(&self.client, &self.config).await {
            tracing::warn!(error = %e, "Token refresh failed");
            session.logout().await;
            return Err(ClientError::SessionExpired);
        }

        let retried = self.get_with_token(&url, session.access_token().await).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %url, "Request rejected after token refresh");
            session.logout().await;
            return Err(ClientError::SessionExpired);
        }
        Ok(retried)
    }

    async fn get_with_token(
        &self,
        url: &str,
        token: Option<String>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        Ok(request.send().await?)
    }

    /// Return the response unchanged if its status is `expected`, or an
    /// [`ClientError::Api`] carrying the status and body otherwise.
    async fn ensure_status(
        response: reqwest::Response,
        expected: StatusCode,
    ) -> Result<reqwest::Response, ClientError> {
        if response.status() != expected {
            return Err(Self::api_error(response).await);
        }
        Ok(response)
    }

    /// Parse a successful (2xx) JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn api_error(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        ClientError::Api {
            status: status.as_u16(),
            body,
        }
    }
}
