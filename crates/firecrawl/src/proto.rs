use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScrapeRequest<'a> {
    pub url: &'a str,
    pub formats: &'static [&'static str],
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScrapeResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<ScrapedPage>,
    pub error: Option<String>,
}

/// The content of a scraped page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// The page rendered as markdown.
    #[serde(default)]
    pub markdown: String,
    /// What the service knows about the page.
    #[serde(default)]
    pub metadata: PageMetadata,
}

/// Page metadata reported by the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// The `<title>` of the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The meta description of the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The URL that was finally fetched.
    #[serde(rename = "sourceURL", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// The status code the target site answered with.
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Everything else, e.g. Open Graph tags.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
