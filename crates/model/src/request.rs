use serde_json::Value;

use crate::response::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelRequest {
    /// The system instructions of the role that is asking.
    pub instructions: String,
    /// The conversation so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools the role is allowed to call.
    pub tools: Vec<ModelTool>,
}

/// A complete message in the history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelMessage {
    /// A user input text.
    User(String),
    /// Text produced by an assistant role.
    Assistant(String),
    /// A tool call that an assistant role asked for.
    ///
    /// Every `ToolCall` is expected to be answered by a [`ModelMessage::Tool`]
    /// carrying the same id later in the history.
    ToolCall(ToolCallRequest),
    /// A tool call result.
    Tool(ToolCallResult),
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The identifier of the tool call request this result answers.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// JSON schema of the tool's arguments object.
    pub parameters: Value,
}
