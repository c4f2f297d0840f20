//! The domain tools the roles can call.

mod analyze;
mod campaign;
mod copy;
mod scrape;

use marketeer_core::ModelClient;
use marketeer_core::tool::Error as ToolError;

pub use analyze::AnalyzeWebsiteContentTool;
pub use campaign::CreateCampaignIdeaTool;
pub use copy::GenerateCopyTool;
pub use scrape::{ScrapeWebsiteTool, Scraper};

/// Asks the backend, playing `role`, to perform `task` on `content`.
async fn generate_completion(
    model_client: ModelClient,
    role: &'static str,
    task: &'static str,
    content: String,
) -> Result<String, ToolError> {
    model_client
        .complete_text(format!("You are a {role}. {task}"), content)
        .await
        .map_err(|err| {
            ToolError::execution_error()
                .with_reason(format!("completion failed: {err}"))
        })
}
