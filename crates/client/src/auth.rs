//! Access/refresh token session.
//!
//! Authenticated requests carry the access token as a bearer token. On a
//! 401 the session is refreshed once and the request retried once; if
//! either fails the session is cleared (logged out).

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::{ApiConfig, REFRESH_TOKEN_PATH};
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    /// Some backends rotate the refresh token, some don't.
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Shared token state for one signed-in user.
#[derive(Debug, Default)]
pub struct AuthSession {
    tokens: RwLock<Option<AuthTokens>>,
}

impl AuthSession {
    pub fn new(tokens: Option<AuthTokens>) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    /// Session from `CHARFEED_ACCESS_TOKEN` / `CHARFEED_REFRESH_TOKEN`,
    /// or `None` when no access token is set.
    pub fn from_env() -> Option<Self> {
        let access_token = std::env::var("CHARFEED_ACCESS_TOKEN").ok()?;
        let refresh_token = std::env::var("CHARFEED_REFRESH_TOKEN").unwrap_or_default();
        Some(Self::new(Some(AuthTokens {
            access_token,
            refresh_token,
        })))
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    /// Drop both tokens.
    pub async fn logout(&self) {
        tracing::info!("Clearing auth session");
        *self.tokens.write().await = None;
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(
        &self,
        client: &reqwest::Client,
        config: &ApiConfig,
    ) -> Result<(), ClientError> {
        let refresh_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::NotAuthenticated)?;

        let response = client
            .post(config.url(REFRESH_TOKEN_PATH))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let renewed: RefreshResponse = response.json().await?;
        let mut tokens = self.tokens.write().await;
        *tokens = Some(AuthTokens {
            access_token: renewed.access_token,
            refresh_token: renewed.refresh_token.unwrap_or(refresh_token),
        });
        tracing::debug!("Access token refreshed");
        Ok(())
    }
}
