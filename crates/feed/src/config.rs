use std::time::Duration;

use charfeed_core::cache::DEFAULT_PAGE_SIZE;
use charfeed_core::error::CoreError;
use charfeed_core::filter::ContentMode;

/// Catalog page requested on every full fetch.
pub const DEFAULT_CATALOG_LIMIT: u64 = 1000;

/// Background reload period.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Concurrent rating requests during a ratings refresh.
pub const DEFAULT_RATING_CONCURRENCY: usize = 8;

/// Feed behavior loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// `limit` sent with every catalog fetch.
    pub catalog_limit: u64,
    /// Characters revealed per page.
    pub page_size: usize,
    /// `None` disables background polling.
    pub poll_interval: Option<Duration>,
    /// Content mode the feed starts in.
    pub content_mode: ContentMode,
    pub rating_concurrency: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            catalog_limit: DEFAULT_CATALOG_LIMIT,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: Some(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            content_mode: ContentMode::Safe,
            rating_concurrency: DEFAULT_RATING_CONCURRENCY,
        }
    }
}

impl FeedConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `CHARFEED_CATALOG_LIMIT`       | `1000`  |
    /// | `CHARFEED_PAGE_SIZE`           | `26`    |
    /// | `CHARFEED_POLL_INTERVAL_SECS`  | `30`    |
    /// | `CHARFEED_CONTENT_MODE`        | `safe`  |
    /// | `CHARFEED_RATING_CONCURRENCY`  | `8`     |
    ///
    /// A poll interval of `0` disables polling.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`FeedConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let catalog_limit = parse_or(&lookup, "CHARFEED_CATALOG_LIMIT", defaults.catalog_limit)?;
        let page_size = parse_or(&lookup, "CHARFEED_PAGE_SIZE", defaults.page_size)?;
        let poll_secs = parse_or(&lookup, "CHARFEED_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        let rating_concurrency =
            parse_or(&lookup, "CHARFEED_RATING_CONCURRENCY", defaults.rating_concurrency)?;
        let content_mode = match lookup("CHARFEED_CONTENT_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.content_mode,
        };

        let config = Self {
            catalog_limit,
            page_size,
            poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
            content_mode,
            rating_concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.catalog_limit == 0 {
            return Err(CoreError::Validation("catalog limit must be positive".into()));
        }
        if self.page_size == 0 {
            return Err(CoreError::Validation("page size must be positive".into()));
        }
        if self.rating_concurrency == 0 {
            return Err(CoreError::Validation("rating concurrency must be positive".into()));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} is not a valid number: {raw:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = FeedConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.catalog_limit, 1000);
        assert_eq!(config.page_size, 26);
        assert_eq!(config.poll_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_poll_interval_disables_polling() {
        let config =
            FeedConfig::from_lookup(lookup(&[("CHARFEED_POLL_INTERVAL_SECS", "0")])).unwrap();
        assert_eq!(config.poll_interval, None);
    }

    #[test]
    fn reads_content_mode_and_sizes() {
        let config = FeedConfig::from_lookup(lookup(&[
            ("CHARFEED_CONTENT_MODE", "NSFW"),
            ("CHARFEED_PAGE_SIZE", "10"),
            ("CHARFEED_CATALOG_LIMIT", "50"),
        ]))
        .unwrap();
        assert_eq!(config.content_mode, ContentMode::Nsfw);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.catalog_limit, 50);
    }

    #[test]
    fn rejects_bad_values() {
        assert_matches!(
            FeedConfig::from_lookup(lookup(&[("CHARFEED_PAGE_SIZE", "0")])),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            FeedConfig::from_lookup(lookup(&[("CHARFEED_CATALOG_LIMIT", "lots")])),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            FeedConfig::from_lookup(lookup(&[("CHARFEED_CONTENT_MODE", "spicy")])),
            Err(CoreError::InvalidContentMode(_))
        );
    }
}
