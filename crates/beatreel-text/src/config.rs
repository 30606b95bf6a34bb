//! Text client configuration.

use std::time::Duration;
use url::Url;

use crate::error::{TextError, TextResult};

/// Connection settings for the HTTP text-completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct TextClientConfig {
    /// Completion endpoint; receives `POST {prompt, max_tokens}`
    pub endpoint: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt, for transient failures only
    pub max_retries: u32,
    /// Base backoff delay, doubled per retry and capped at five seconds
    pub retry_base_delay: Duration,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
}

impl TextClientConfig {
    pub fn new(endpoint: &str) -> TextResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| TextError::InvalidUrl {
            url: endpoint.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            endpoint,
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
            api_key: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Read `TEXT_SERVICE_URL`, `TEXT_SERVICE_TIMEOUT` (seconds),
    /// `TEXT_SERVICE_RETRIES` and `TEXT_SERVICE_API_KEY`.
    ///
    /// Returns `Ok(None)` when no URL is set.
    pub fn from_env() -> TextResult<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TextResult<Option<Self>> {
        let Some(url) = lookup("TEXT_SERVICE_URL").filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        let mut config = Self::new(url.trim())?;
        if let Some(secs) = lookup("TEXT_SERVICE_TIMEOUT").and_then(|s| s.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = lookup("TEXT_SERVICE_RETRIES").and_then(|s| s.parse().ok()) {
            config.max_retries = retries;
        }
        config.api_key = lookup("TEXT_SERVICE_API_KEY").filter(|k| !k.is_empty());
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_unset_url_is_none() {
        assert!(TextClientConfig::from_lookup(lookup(&[])).unwrap().is_none());
        assert!(TextClientConfig::from_lookup(lookup(&[("TEXT_SERVICE_URL", " ")]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reads_overrides() {
        let config = TextClientConfig::from_lookup(lookup(&[
            ("TEXT_SERVICE_URL", "http://localhost:9000/complete"),
            ("TEXT_SERVICE_TIMEOUT", "7"),
            ("TEXT_SERVICE_RETRIES", "0"),
            ("TEXT_SERVICE_RETRIES_IGNORED", "x"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.endpoint.as_str(), "http://localhost:9000/complete");
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.max_retries, 0);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_url() {
        let err = TextClientConfig::from_lookup(lookup(&[("TEXT_SERVICE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, TextError::InvalidUrl { .. }));
    }
}
