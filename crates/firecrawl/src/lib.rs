//! A small client for the Firecrawl scrape API.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use url::Url;

pub use config::{FirecrawlConfig, FirecrawlConfigBuilder};
pub use proto::{PageMetadata, ScrapedPage};
use proto::{ScrapeRequest, ScrapeResponse};

/// The kind of error that occurred while scraping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The target is not an absolute http(s) URL.
    InvalidUrl,
    /// The service did not answer in time.
    Timeout,
    /// The service answered with a non-success status.
    Status(u16),
    /// The service accepted the request but could not scrape the page.
    Rejected,
    /// The answer could not be decoded.
    InvalidResponse,
    /// The service could not be reached.
    Network,
}

/// Error type for [`FirecrawlClient`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Network
        };
        Error::new(err.to_string(), kind)
    }
}

/// Parses `raw` as an absolute http or https URL.
pub fn validate_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        Error::new(format!("invalid URL `{raw}`: {err}"), ErrorKind::InvalidUrl)
    })?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        scheme => Err(Error::new(
            format!("unsupported URL `{raw}` (scheme `{scheme}`)"),
            ErrorKind::InvalidUrl,
        )),
    }
}

/// Firecrawl API client. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct FirecrawlClient {
    client: Client,
    config: Arc<FirecrawlConfig>,
}

impl FirecrawlClient {
    /// Creates a new client with the given configuration.
    #[inline]
    pub fn new(config: FirecrawlConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Scrapes `url` and returns its markdown rendering.
    ///
    /// The URL is validated before anything is sent.
    pub fn scrape(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ScrapedPage, Error>> + Send + 'static {
        let request = validate_url(url).map(|url| {
            debug!("scraping {url}");
            self.client
                .post(self.config.scrape_url())
                .bearer_auth(&self.config.api_key)
                .timeout(self.config.timeout)
                .json(&ScrapeRequest {
                    url: url.as_str(),
                    formats: &["markdown"],
                })
        });

        async move {
            let resp = request?.send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            decode_response(status, &body)
        }
    }
}

fn decode_response(status: StatusCode, body: &str) -> Result<ScrapedPage, Error> {
    let parsed = serde_json::from_str::<ScrapeResponse>(body);
    if !status.is_success() {
        let reason = parsed
            .ok()
            .and_then(|resp| resp.error)
            .unwrap_or_else(|| status.to_string());
        return Err(Error::new(
            format!("scrape failed with {status}: {reason}"),
            ErrorKind::Status(status.as_u16()),
        ));
    }

    let resp = parsed.map_err(|err| {
        Error::new(format!("malformed answer: {err}"), ErrorKind::InvalidResponse)
    })?;
    match resp {
        ScrapeResponse {
            success: true,
            data: Some(page),
            ..
        } => Ok(page),
        ScrapeResponse { error, .. } => Err(Error::new(
            error.unwrap_or_else(|| "scrape returned no data".to_owned()),
            ErrorKind::Rejected,
        )),
    }
}
