use std::fmt;
use std::time::Duration;

use crate::error::Error;

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://dev.wetransfer.com/v2";

/// Timeout applied to every HTTP exchange, part uploads included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings a [`Session`](crate::Session) is built from.
#[derive(Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl SessionConfig {
    /// Config for `api_key` against the default base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks the base URL scheme and strips trailing slashes.
    pub(crate) fn normalized_base_url(&self) -> Result<String, Error> {
        let url = self.base_url.trim().trim_end_matches('/');
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(Error::InvalidUrl(format!(
                "base URL must start with http:// or https://: {url}"
            )));
        }
        Ok(url.to_string())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
