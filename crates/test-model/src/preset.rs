use marketeer_model::{ErrorKind, ToolCallRequest};
use serde_json::Value;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresetEvent {
    MessageDelta(String),
    ToolCall(ToolCallRequest),
}

/// The preset answer to one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request fails with this kind instead of streaming.
    pub failure: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// A plain text answer delivered as a single delta.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// An answer that only asks for one tool call.
    pub fn tool_call<S1, S2>(id: S1, name: S2, arguments: Value) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::with_events([PresetEvent::ToolCall(ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        })])
    }

    /// A request that fails before any event is produced.
    #[inline]
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            events: vec![],
            failure: Some(kind),
        }
    }
}
