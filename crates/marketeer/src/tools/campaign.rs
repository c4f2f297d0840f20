use marketeer_core::ModelClient;
use marketeer_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};

use super::generate_completion;

#[derive(Deserialize, JsonSchema)]
pub struct CreateCampaignIdeaParameters {
    #[schemars(description = "Who the campaign is aimed at.")]
    target_audience: String,
    #[schemars(description = "What the campaign should achieve.")]
    goals: String,
}

/// A tool that proposes a campaign for an audience and a set of goals.
pub struct CreateCampaignIdeaTool {
    model_client: ModelClient,
    parameter_schema: Value,
}

impl CreateCampaignIdeaTool {
    /// Creates a new campaign tool.
    #[inline]
    pub fn new(model_client: ModelClient) -> Self {
        CreateCampaignIdeaTool {
            model_client,
            parameter_schema: schema_for!(CreateCampaignIdeaParameters)
                .to_value(),
        }
    }
}

impl Tool for CreateCampaignIdeaTool {
    type Input = CreateCampaignIdeaParameters;

    fn name(&self) -> &str {
        "create_campaign_idea"
    }

    fn description(&self) -> &str {
        "Creates a campaign idea based on the target audience and goals."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CreateCampaignIdeaParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let model_client = self.model_client.clone();
        async move {
            let brief = format!(
                "Target Audience: {}\nGoals: {}",
                input.target_audience, input.goals
            );
            let idea = generate_completion(
                model_client,
                "marketing strategist",
                "Create an innovative campaign idea.",
                brief,
            )
            .await?;
            Ok(json!({ "campaign_idea": idea }).to_string())
        }
    }
}
