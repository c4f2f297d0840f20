use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for [`FirecrawlConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FirecrawlConfigBuilder {
    api_key: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl FirecrawlConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: None,
        }
    }

    /// Points the client at a self-hosted instance.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how long a single scrape may take.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> FirecrawlConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        FirecrawlConfig {
            api_key: self.api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

impl Debug for FirecrawlConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirecrawlConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for [`FirecrawlClient`](crate::FirecrawlClient).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FirecrawlConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

impl FirecrawlConfig {
    pub(crate) fn scrape_url(&self) -> String {
        format!("{}/v1/scrape", self.base_url)
    }
}

impl Debug for FirecrawlConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirecrawlConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
