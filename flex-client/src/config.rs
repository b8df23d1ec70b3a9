//! Build API client configuration.
//!
//! Defaults point at the production Build API. Override via environment
//! variables or explicit construction for staging and tests.

use url::Url;

/// Production Build API base URL.
pub const DEFAULT_BASE_URL: &str = "https://flex-build-api.sharetribe.com/v1/build-api/";

/// Connect and read timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for connecting to the Build API.
///
/// Custom `Debug` implementation redacts the `api_key` field.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is resolved against. Always ends in `/`.
    pub base_url: Url,
    /// Marketplace API key. Requests fail with `NotLoggedIn` without one.
    pub api_key: Option<String>,
    /// Connect timeout and per-read idle timeout, in seconds. Not a limit
    /// on the length of a whole transfer.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("base URL", base_url)?,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FLEX_API_BASE_URL` (default: [`DEFAULT_BASE_URL`])
    /// - `FLEX_API_TIMEOUT_SECS` (default: 300)
    ///
    /// The API key is resolved separately by the caller.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            std::env::var("FLEX_API_BASE_URL").ok().as_deref(),
            std::env::var("FLEX_API_TIMEOUT_SECS").ok().as_deref(),
        )
    }

    fn from_values(base_url: Option<&str>, timeout: Option<&str>) -> Result<Self, ConfigError> {
        let base_url = parse_base_url("FLEX_API_BASE_URL", base_url.unwrap_or(DEFAULT_BASE_URL))?;
        let timeout_secs = match timeout {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.to_string()))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            base_url,
            api_key: None,
            timeout_secs,
        })
    }
}

/// Parse a base URL, adding the trailing `/` that `Url::join` needs to keep
/// the last path segment.
fn parse_base_url(source: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(source.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(
            source.to_string(),
            "not a base URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid timeout `{0}`: expected a number of seconds")]
    InvalidTimeout(String),
}
