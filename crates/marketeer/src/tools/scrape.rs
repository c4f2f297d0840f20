use std::sync::Arc;

use async_trait::async_trait;
use marketeer_core::tool::{Error as ToolError, Tool, ToolResult};
use marketeer_firecrawl::{Error as ScrapeError, FirecrawlClient, ScrapedPage};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

/// Something that can turn a URL into page content.
#[async_trait]
pub trait Scraper: Send + Sync + 'static {
    /// Scrapes the page at `url`.
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScrapeError>;
}

#[async_trait]
impl Scraper for FirecrawlClient {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScrapeError> {
        FirecrawlClient::scrape(self, url).await
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct ScrapeWebsiteParameters {
    #[schemars(description = "Absolute http(s) URL of the website.")]
    url: String,
}

/// A tool for fetching a website as markdown plus metadata.
pub struct ScrapeWebsiteTool {
    scraper: Arc<dyn Scraper>,
    parameter_schema: Value,
}

impl ScrapeWebsiteTool {
    /// Creates a new scrape tool backed by `scraper`.
    #[inline]
    pub fn new(scraper: impl Scraper) -> Self {
        ScrapeWebsiteTool {
            scraper: Arc::new(scraper),
            parameter_schema: schema_for!(ScrapeWebsiteParameters).to_value(),
        }
    }
}

impl Tool for ScrapeWebsiteTool {
    type Input = ScrapeWebsiteParameters;

    fn name(&self) -> &str {
        "scrape_website"
    }

    fn description(&self) -> &str {
        "Scrapes the content of a website and returns it as markdown \
        together with the page metadata."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ScrapeWebsiteParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let scraper = Arc::clone(&self.scraper);
        async move {
            let page = scraper.scrape(&input.url).await.map_err(|err| {
                warn!("failed to scrape {}: {err}", input.url);
                ToolError::execution_error().with_reason(err.to_string())
            })?;
            debug!(
                "scraped {} ({} bytes of markdown)",
                input.url,
                page.markdown.len()
            );
            serde_json::to_string(&page).map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })
        }
    }
}
