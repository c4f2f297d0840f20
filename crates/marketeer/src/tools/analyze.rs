use marketeer_core::ModelClient;
use marketeer_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};

use super::generate_completion;

#[derive(Deserialize, JsonSchema)]
pub struct AnalyzeWebsiteContentParameters {
    #[schemars(description = "The scraped website content.")]
    content: String,
}

/// A tool that extracts marketing insights from website content.
pub struct AnalyzeWebsiteContentTool {
    model_client: ModelClient,
    parameter_schema: Value,
}

impl AnalyzeWebsiteContentTool {
    /// Creates a new analysis tool.
    #[inline]
    pub fn new(model_client: ModelClient) -> Self {
        AnalyzeWebsiteContentTool {
            model_client,
            parameter_schema: schema_for!(AnalyzeWebsiteContentParameters)
                .to_value(),
        }
    }
}

impl Tool for AnalyzeWebsiteContentTool {
    type Input = AnalyzeWebsiteContentParameters;

    fn name(&self) -> &str {
        "analyze_website_content"
    }

    fn description(&self) -> &str {
        "Analyzes website content and provides key marketing insights."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: AnalyzeWebsiteContentParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let model_client = self.model_client.clone();
        async move {
            let analysis = generate_completion(
                model_client,
                "marketing analyst",
                "Analyze the content and provide key insights.",
                input.content,
            )
            .await?;
            Ok(json!({ "analysis": analysis }).to_string())
        }
    }
}
