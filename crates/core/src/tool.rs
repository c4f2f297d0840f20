//! Tool call supports.

mod error;
mod object;
mod registry;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub(crate) use object::{PreparedCall, ToolObject, ToolObjectImpl};
pub use registry::{Registry, ToolRef, handoff_tool_name};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A domain tool that can be called by the model.
///
/// Implementations should hold only immutable state (clients, prompts,
/// configuration) that is cloned into the future returned by
/// [`Tool::execute`].
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the JSON schema of the tool's parameters.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}
