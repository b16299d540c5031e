//! Client configuration: API base URL and request timeout. Constructible
//! explicitly or from the environment; values are public, never secrets.

use crate::error::Error;
use std::time::Duration;
use url::Url;

/// Default request timeout (milliseconds) applied to all requests.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Environment variable holding the API base URL.
pub const ENV_BASE_URL: &str = "PORTERO_API_BASE_URL";
/// Environment variable overriding the request timeout, in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "PORTERO_TIMEOUT_MS";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Builds a config from a base URL with the default timeout.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed, has no host, or uses a
    /// scheme other than http/https.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let url = Url::parse(base_url.trim())
            .map_err(|err| Error::Config(format!("invalid base URL: {err}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::Config(format!("unsupported scheme: {scheme}")));
            }
        }

        if url.host().is_none() {
            return Err(Error::Config("base URL has no host".to_string()));
        }

        Ok(Self {
            base_url: url,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `PORTERO_API_BASE_URL` (required) and `PORTERO_TIMEOUT_MS`
    /// (optional) from the environment.
    ///
    /// # Errors
    /// Returns an error if the base URL is missing or invalid, or the
    /// timeout is not an integer.
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var(ENV_BASE_URL)
            .map_err(|_| Error::Config(format!("{ENV_BASE_URL} is not set")))?;
        let mut config = Self::new(&base_url)?;

        if let Ok(timeout) = std::env::var(ENV_TIMEOUT_MS) {
            let millis: u64 = timeout
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{ENV_TIMEOUT_MS} is not a number")))?;
            config.timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Joins the base URL and a request path with exactly one separator.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{}", path.trim_start_matches('/'))
    }
}
