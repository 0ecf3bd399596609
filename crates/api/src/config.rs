use std::env;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {key}: {raw}")]
    InvalidNumber { key: &'static str, raw: String },
}

/// Backoff settings for requests that are safe to repeat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): exponential, capped, with
    /// up to 25% random jitter added.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_delay
            .saturating_mul(1_u32 << exp)
            .min(self.max_delay);
        let jitter_cap = u64::try_from(base.as_millis() / 4).unwrap_or(0);
        if jitter_cap == 0 {
            return base;
        }
        let jitter = rand::rng().random_range(0..=jitter_cap);
        base + Duration::from_millis(jitter)
    }
}

/// Connection settings for the remote study service.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: Url,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Config pointing at `base_url` with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if the URL does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            access_token: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read `STUDY_API_BASE_URL`, `STUDY_API_TOKEN`, `STUDY_API_TIMEOUT_SECS` and
    /// `STUDY_API_MAX_RETRIES` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("STUDY_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let mut config = Self::new(&base_url)?;

        config.access_token = lookup("STUDY_API_TOKEN").filter(|v| !v.trim().is_empty());

        if let Some(raw) = lookup("STUDY_API_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: "STUDY_API_TIMEOUT_SECS",
                raw: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("STUDY_API_MAX_RETRIES") {
            config.retry.max_retries =
                raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    key: "STUDY_API_MAX_RETRIES",
                    raw: raw.clone(),
                })?;
        }

        Ok(config)
    }

    /// Absolute URL for an endpoint path relative to the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.endpoint("/study/session/start"), "http://localhost:8000/api/study/session/start");
        assert_eq!(config.access_token, None);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("STUDY_API_BASE_URL", "https://cards.example.com/api/"),
            ("STUDY_API_TOKEN", "abc"),
            ("STUDY_API_TIMEOUT_SECS", "5"),
            ("STUDY_API_MAX_RETRIES", "0"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint("auth/login"), "https://cards.example.com/api/auth/login");
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = ClientConfig::from_lookup(lookup_from(&[("STUDY_API_BASE_URL", "ftp://x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));

        let err = ClientConfig::from_lookup(lookup_from(&[("STUDY_API_MAX_RETRIES", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn retry_delay_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };
        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
        let late = policy.delay_for(6);
        assert!(late >= Duration::from_millis(300) && late <= Duration::from_millis(375));
    }
}
