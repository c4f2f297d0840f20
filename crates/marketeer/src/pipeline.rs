use std::sync::Arc;

use marketeer_core::role::{RoleDefinition, RoleId, RoleSet};
use marketeer_core::tool::{Registry, handoff_tool_name};
use marketeer_core::{
    DEFAULT_MAX_CORRECTION_CYCLES, Engine, EngineBuilder, Error, ErrorKind,
    Event, ModelClient,
};

use crate::config::AgentsConfig;
use crate::context::Context;
use crate::tools::*;

/// Returns the definitions of the five pipeline roles, with the names and
/// instructions taken from `agents`.
///
/// The hand-off graph is fixed:
/// `user_interface_agent` → `website_scraper_agent` → `analyst_agent` →
/// `campaign_idea_agent` → `copywriter_agent`.
pub fn role_definitions(
    agents: &AgentsConfig,
) -> Result<Vec<RoleDefinition>, Error> {
    let wiring: [(RoleId, &[&str], Option<RoleId>); 5] = [
        (
            RoleId::UserInterface,
            &["scrape_website"],
            Some(RoleId::WebsiteScraper),
        ),
        (
            RoleId::WebsiteScraper,
            &["scrape_website"],
            Some(RoleId::Analyst),
        ),
        (
            RoleId::Analyst,
            &["analyze_website_content"],
            Some(RoleId::CampaignIdea),
        ),
        (
            RoleId::CampaignIdea,
            &["create_campaign_idea"],
            Some(RoleId::Copywriter),
        ),
        (RoleId::Copywriter, &["generate_copy"], None),
    ];

    wiring
        .into_iter()
        .map(|(id, tools, handoff)| {
            let agent = agents.get(id).ok_or_else(|| {
                Error::new(ErrorKind::ConfigKeyMissing)
                    .with_reason(format!("`agents.{id}`"))
            })?;
            let mut definition = tools.iter().fold(
                RoleDefinition::new(id, &agent.name, &agent.instructions),
                |definition, tool| definition.with_tool(*tool),
            );
            if let Some(target) = handoff {
                definition = definition.with_tool(handoff_tool_name(target));
            }
            Ok(definition)
        })
        .collect()
}

/// A builder that assembles the tools, the roles and the engine.
pub struct PipelineBuilder {
    model_client: ModelClient,
    scrape_tool: ScrapeWebsiteTool,
    agents: AgentsConfig,
    max_correction_cycles: usize,
    on_event: Option<Arc<dyn Fn(Event) + Send + Sync>>,
}

impl PipelineBuilder {
    /// Creates a builder from explicit parts.
    pub fn new(
        model_client: ModelClient,
        scraper: impl Scraper,
        agents: AgentsConfig,
    ) -> Self {
        Self {
            model_client,
            scrape_tool: ScrapeWebsiteTool::new(scraper),
            agents,
            max_correction_cycles: DEFAULT_MAX_CORRECTION_CYCLES,
            on_event: None,
        }
    }

    /// Creates a builder from the process-wide context.
    #[inline]
    pub fn with_context(context: &Context) -> Self {
        Self::new(
            context.model_client().clone(),
            context.scraper().clone(),
            context.agents().clone(),
        )
    }

    /// Sets the bound on consecutive invalid tool calls.
    #[inline]
    pub fn with_max_correction_cycles(mut self, max: usize) -> Self {
        self.max_correction_cycles = max;
        self
    }

    /// Attaches a callback to be invoked on engine progress.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(Event) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(on_event));
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<Engine, Error> {
        let model_client = self.model_client;
        let mut registry = Registry::new();
        registry.register(self.scrape_tool)?;
        registry
            .register(AnalyzeWebsiteContentTool::new(model_client.clone()))?;
        registry.register(CreateCampaignIdeaTool::new(model_client.clone()))?;
        registry.register(GenerateCopyTool::new(model_client.clone()))?;

        let roles = role_definitions(&self.agents)?
            .into_iter()
            .fold(RoleSet::builder(registry), |builder, definition| {
                builder.role(definition)
            })
            .build()?;

        let mut engine_builder =
            EngineBuilder::with_model_client(model_client, roles)
                .with_max_correction_cycles(self.max_correction_cycles);
        if let Some(on_event) = self.on_event {
            engine_builder =
                engine_builder.on_event(move |event| on_event(event));
        }
        Ok(engine_builder.build())
    }
}
