use marketeer_core::ModelClient;
use marketeer_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};

use super::generate_completion;

#[derive(Deserialize, JsonSchema)]
pub struct GenerateCopyParameters {
    #[schemars(description = "The creative brief to write copy for.")]
    brief: String,
}

/// A tool that writes marketing copy from a brief.
pub struct GenerateCopyTool {
    model_client: ModelClient,
    parameter_schema: Value,
}

impl GenerateCopyTool {
    /// Creates a new copywriting tool.
    #[inline]
    pub fn new(model_client: ModelClient) -> Self {
        GenerateCopyTool {
            model_client,
            parameter_schema: schema_for!(GenerateCopyParameters).to_value(),
        }
    }
}

impl Tool for GenerateCopyTool {
    type Input = GenerateCopyParameters;

    fn name(&self) -> &str {
        "generate_copy"
    }

    fn description(&self) -> &str {
        "Generates marketing copy based on a brief."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: GenerateCopyParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let model_client = self.model_client.clone();
        async move {
            let copy = generate_completion(
                model_client,
                "copywriter",
                "Create compelling copy based on the brief.",
                input.brief,
            )
            .await?;
            Ok(json!({ "copy": copy }).to_string())
        }
    }
}
