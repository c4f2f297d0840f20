use std::env;
use std::fmt::{self, Debug, Formatter};

use marketeer_core::{Error, ErrorKind, ModelClient};
use marketeer_firecrawl::{FirecrawlClient, FirecrawlConfigBuilder};
use marketeer_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

use crate::config::AgentsConfig;

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const FIRECRAWL_API_KEY: &str = "FIRECRAWL_API_KEY";

/// API keys of the external services.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    openai_api_key: String,
    firecrawl_api_key: String,
}

impl Credentials {
    /// Creates credentials from explicit keys.
    pub fn new<S1, S2>(openai_api_key: S1, firecrawl_api_key: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            openai_api_key: openai_api_key.into(),
            firecrawl_api_key: firecrawl_api_key.into(),
        }
    }

    /// Reads `OPENAI_API_KEY` and `FIRECRAWL_API_KEY` from the environment.
    #[inline]
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads both keys through `lookup`, failing with
    /// [`ErrorKind::MissingCredential`] if either is unset or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key).filter(|value| !value.trim().is_empty()).ok_or_else(
                || {
                    Error::new(ErrorKind::MissingCredential)
                        .with_reason(format!("{key} is not set"))
                },
            )
        };
        Ok(Self {
            openai_api_key: require(OPENAI_API_KEY)?,
            firecrawl_api_key: require(FIRECRAWL_API_KEY)?,
        })
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .field("firecrawl_api_key", &"<redacted>")
            .finish()
    }
}

/// Optional overrides for the external services.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// The completion model, `gpt-4o-mini` if unset.
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible service.
    pub openai_base_url: Option<String>,
    /// Base URL of the Firecrawl service.
    pub firecrawl_base_url: Option<String>,
}

/// Everything the pipeline needs, created once at startup.
#[derive(Clone)]
pub struct Context {
    model_client: ModelClient,
    scraper: FirecrawlClient,
    agents: AgentsConfig,
}

impl Context {
    /// Creates the service clients.
    pub fn new(
        credentials: Credentials,
        options: ContextOptions,
        agents: AgentsConfig,
    ) -> Self {
        let mut openai_config =
            OpenAIConfigBuilder::with_api_key(credentials.openai_api_key);
        if let Some(model) = options.model {
            openai_config = openai_config.with_model(model);
        }
        if let Some(base_url) = options.openai_base_url {
            openai_config = openai_config.with_base_url(base_url);
        }
        let openai_config = openai_config.build();
        info!("using model {}", openai_config.model());

        let mut firecrawl_config =
            FirecrawlConfigBuilder::with_api_key(credentials.firecrawl_api_key);
        if let Some(base_url) = options.firecrawl_base_url {
            firecrawl_config = firecrawl_config.with_base_url(base_url);
        }

        Self {
            model_client: ModelClient::new(OpenAIProvider::new(openai_config)),
            scraper: FirecrawlClient::new(firecrawl_config.build()),
            agents,
        }
    }

    /// Returns the completion client shared by the engine and the tools.
    #[inline]
    pub fn model_client(&self) -> &ModelClient {
        &self.model_client
    }

    /// Returns the scraping client.
    #[inline]
    pub fn scraper(&self) -> &FirecrawlClient {
        &self.scraper
    }

    /// Returns the role configuration.
    #[inline]
    pub fn agents(&self) -> &AgentsConfig {
        &self.agents
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(
        vars: &'a HashMap<&str, &str>,
    ) -> impl Fn(&str) -> Option<String> + 'a {
        |key: &str| vars.get(key).map(|value| value.to_string())
    }

    #[test]
    fn test_credentials() {
        let vars = HashMap::from([
            (OPENAI_API_KEY, "sk-test"),
            (FIRECRAWL_API_KEY, "fc-test"),
        ]);
        let credentials = Credentials::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(credentials, Credentials::new("sk-test", "fc-test"));

        let debug = format!("{credentials:?}");
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_credentials() {
        let vars = HashMap::from([(OPENAI_API_KEY, "sk-test")]);
        let err = Credentials::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.reason().contains(FIRECRAWL_API_KEY));

        let vars = HashMap::from([
            (OPENAI_API_KEY, "  "),
            (FIRECRAWL_API_KEY, "fc-test"),
        ]);
        let err = Credentials::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.reason().contains(OPENAI_API_KEY));
    }

    #[test]
    fn test_context() {
        let agents = include_str!("../../../agents_config.toml")
            .parse::<AgentsConfig>()
            .unwrap();
        let context = Context::new(
            Credentials::new("sk-test", "fc-test"),
            ContextOptions {
                model: Some("gpt-4o".to_owned()),
                ..Default::default()
            },
            agents.clone(),
        );
        assert_eq!(context.model_client().provider_name(), "openai");
        assert_eq!(context.agents(), &agents);
    }
}
