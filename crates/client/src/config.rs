use std::net::IpAddr;
use std::time::Duration;

use charfeed_core::photos::{PhotoUrlResolver, DEFAULT_STORAGE_HOST_MARKER};

use crate::error::ClientError;

/// Primary characters endpoint when none is configured.
pub const DEFAULT_CHARACTERS_ENDPOINT: &str = "/api/v1/characters/";

/// Fallback characters endpoints, tried after the primary one.
pub const FALLBACK_CHARACTERS_ENDPOINTS: &[&str] = &["/api/v1/characters/", "/api/characters/"];

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const RATINGS_PATH: &str = "/api/v1/characters/character-ratings";
pub const AVAILABLE_TAGS_PATH: &str = "/api/v1/characters/available-tags";
pub const REFRESH_TOKEN_PATH: &str = "/api/v1/auth/refresh/";

/// Supplementary photo-map documents, in merge priority order.
pub const PHOTO_MAP_PATHS: &[&str] = &["/api/v1/characters/photos", "/character-photos.json"];

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Where requests are sent, e.g. `http://localhost:8000`.
    pub origin: String,
    /// Public base URL used for media and relative photo URLs.
    /// Empty means same-origin relative paths.
    pub base_url: String,
    /// Primary characters endpoint.
    pub characters_endpoint: String,
    /// Substring identifying object-storage photo URLs.
    pub storage_host_marker: String,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                    |
    /// |----------------------------------|----------------------------|
    /// | `CHARFEED_API_ORIGIN`            | `http://localhost:8000`    |
    /// | `CHARFEED_BASE_URL`              | unset                      |
    /// | `CHARFEED_ENV`                   | `development`              |
    /// | `CHARFEED_CHARACTERS_ENDPOINT`   | `/api/v1/characters/`      |
    /// | `CHARFEED_STORAGE_HOST`          | `storage.yandexcloud.net/` |
    /// | `CHARFEED_REQUEST_TIMEOUT_SECS`  | `30`                       |
    ///
    /// A malformed or zero timeout is rejected rather than defaulted.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let origin = lookup("CHARFEED_API_ORIGIN")
            .unwrap_or_else(|| "http://localhost:8000".into())
            .trim_end_matches('/')
            .to_string();

        let production = lookup("CHARFEED_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let configured = lookup("CHARFEED_BASE_URL");
        let base_url = resolve_base_url(configured.as_deref(), production, &origin);

        let characters_endpoint = lookup("CHARFEED_CHARACTERS_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_CHARACTERS_ENDPOINT.into());

        let storage_host_marker = lookup("CHARFEED_STORAGE_HOST")
            .unwrap_or_else(|| DEFAULT_STORAGE_HOST_MARKER.into());

        let request_timeout_secs = match lookup("CHARFEED_REQUEST_TIMEOUT_SECS") {
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ClientError::Config(format!(
                        "CHARFEED_REQUEST_TIMEOUT_SECS must be a positive integer, got {raw:?}"
                    )))
                }
            },
        };

        Ok(Self {
            origin,
            base_url,
            characters_endpoint,
            storage_host_marker,
            request_timeout_secs,
        })
    }

    /// Development configuration pointing at `origin`.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        let origin: String = origin.into();
        let origin = origin.trim_end_matches('/').to_string();
        Self {
            base_url: origin.clone(),
            origin,
            characters_endpoint: DEFAULT_CHARACTERS_ENDPOINT.into(),
            storage_host_marker: DEFAULT_STORAGE_HOST_MARKER.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Absolute URL for an API path.
    ///
    /// An absolute base URL wins; otherwise the (possibly empty) relative
    /// base is appended to the origin.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if is_absolute(&self.base_url) {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{}{path}", self.origin, self.base_url)
        }
    }

    /// Photo resolver rooted at the public base URL.
    pub fn photo_resolver(&self) -> PhotoUrlResolver {
        PhotoUrlResolver::new(self.base_url.clone(), self.storage_host_marker.clone())
    }

    /// Catalog endpoints in the order they should be tried, without repeats.
    pub fn catalog_endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = Vec::with_capacity(FALLBACK_CHARACTERS_ENDPOINTS.len() + 1);
        let primary = self.characters_endpoint.trim();
        for candidate in std::iter::once(primary).chain(FALLBACK_CHARACTERS_ENDPOINTS.iter().copied()) {
            if !candidate.is_empty() && !endpoints.iter().any(|e| e == candidate) {
                endpoints.push(candidate.to_string());
            }
        }
        endpoints
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Decide the public base URL.
///
/// In production the base is empty (same-origin, avoiding mixed-content
/// errors behind a reverse proxy) unless an explicit domain is configured;
/// IP-address hosts are ignored. Outside production the configured value,
/// or the origin, is used.
pub fn resolve_base_url(configured: Option<&str>, production: bool, origin: &str) -> String {
    let configured = configured
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty());

    match configured {
        Some(url) if production => {
            if host_is_domain(url) {
                url.to_string()
            } else {
                tracing::warn!(base_url = url, "Ignoring non-domain base URL in production");
                String::new()
            }
        }
        Some(url) => url.to_string(),
        None if production => String::new(),
        None => origin.trim_end_matches('/').to_string(),
    }
}

fn host_is_domain(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_err(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn lookup_defaults() {
        let config = ApiConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.origin, "http://localhost:8000");
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.characters_endpoint, DEFAULT_CHARACTERS_ENDPOINT);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn lookup_reads_overrides() {
        let config = ApiConfig::from_lookup(lookup_from(&[
            ("CHARFEED_API_ORIGIN", "http://api.internal:9000/"),
            ("CHARFEED_ENV", "Production"),
            ("CHARFEED_BASE_URL", "http://10.1.2.3"),
            ("CHARFEED_REQUEST_TIMEOUT_SECS", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.origin, "http://api.internal:9000");
        assert_eq!(config.base_url, "");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn lookup_rejects_bad_timeout() {
        for raw in ["abc", "0", "-3", ""] {
            assert_matches!(
                ApiConfig::from_lookup(lookup_from(&[("CHARFEED_REQUEST_TIMEOUT_SECS", raw)])),
                Err(ClientError::Config(_)),
                "timeout {raw:?}"
            );
        }
    }

    #[test]
    fn production_without_base_is_relative() {
        assert_eq!(resolve_base_url(None, true, "http://10.0.0.1:8000"), "");
    }

    #[test]
    fn production_ignores_ip_hosts() {
        assert_eq!(resolve_base_url(Some("http://10.0.0.1:8000"), true, ""), "");
        assert_eq!(resolve_base_url(Some("http://[::1]:8000"), true, ""), "");
    }

    #[test]
    fn production_keeps_explicit_domain() {
        assert_eq!(
            resolve_base_url(Some("https://chat.example.com/"), true, ""),
            "https://chat.example.com"
        );
    }

    #[test]
    fn development_falls_back_to_origin() {
        assert_eq!(
            resolve_base_url(None, false, "http://localhost:8000/"),
            "http://localhost:8000"
        );
        assert_eq!(
            resolve_base_url(Some("http://192.168.1.5"), false, "x"),
            "http://192.168.1.5"
        );
    }

    #[test]
    fn url_joins_origin_and_relative_base() {
        let mut config = ApiConfig::for_origin("http://api.local/");
        assert_eq!(config.url("/a"), "http://api.local/a");

        config.base_url = String::new();
        assert_eq!(config.url("/a"), "http://api.local/a");

        config.base_url = "https://cdn.example".into();
        assert_eq!(config.url("/a"), "https://cdn.example/a");
        assert_eq!(config.url("https://other/x"), "https://other/x");
    }

    #[test]
    fn catalog_endpoints_skip_duplicates() {
        let mut config = ApiConfig::for_origin("http://x");
        assert_eq!(
            config.catalog_endpoints(),
            vec!["/api/v1/characters/", "/api/characters/"]
        );

        config.characters_endpoint = "/custom/".into();
        assert_eq!(config.catalog_endpoints().len(), 3);
        assert_eq!(config.catalog_endpoints()[0], "/custom/");
    }
}
