//! Conversation-related types.

use std::fmt::{self, Display};

use marketeer_model::{ModelMessage, ToolCallRequest, ToolCallResult};
use serde_json::json;

use crate::ErrorKind;
use crate::role::RoleId;

/// Who produced a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Speaker {
    /// The human user.
    User,
    /// One of the pipeline roles.
    Role(RoleId),
    /// A tool, by name.
    Tool(String),
    /// The engine itself.
    System,
}

/// The content of a turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnContent {
    /// Plain text.
    Text(String),
    /// A tool invocation requested by the backend.
    ToolCall(ToolCallRequest),
    /// The output of a domain tool.
    ToolResult {
        /// The invocation this result answers.
        call_id: String,
        /// The tool output.
        output: String,
    },
    /// A rejected or failed invocation.
    ToolError {
        /// The invocation this error answers.
        call_id: String,
        /// What went wrong.
        kind: ErrorKind,
        /// Feedback shown to the backend.
        message: String,
    },
    /// Control moved from one role to another.
    Handoff {
        /// The hand-off invocation.
        call_id: String,
        /// The role that gave up control.
        from: RoleId,
        /// The role that took over.
        to: RoleId,
    },
}

/// A single entry of the conversation history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    speaker: Speaker,
    content: TurnContent,
}

impl Turn {
    #[inline]
    pub(crate) fn new(speaker: Speaker, content: TurnContent) -> Self {
        Self { speaker, content }
    }

    /// Returns who produced this turn.
    #[inline]
    pub fn speaker(&self) -> &Speaker {
        &self.speaker
    }

    /// Returns the content of this turn.
    #[inline]
    pub fn content(&self) -> &TurnContent {
        &self.content
    }

    pub(crate) fn to_model_message(&self) -> ModelMessage {
        match &self.content {
            TurnContent::Text(text) => match self.speaker {
                Speaker::User => ModelMessage::User(text.clone()),
                _ => ModelMessage::Assistant(text.clone()),
            },
            TurnContent::ToolCall(req) => ModelMessage::ToolCall(req.clone()),
            TurnContent::ToolResult { call_id, output } => {
                ModelMessage::Tool(ToolCallResult {
                    id: call_id.clone(),
                    content: output.clone(),
                })
            }
            TurnContent::ToolError {
                call_id, message, ..
            } => ModelMessage::Tool(ToolCallResult {
                id: call_id.clone(),
                content: format!("Error: {message}"),
            }),
            TurnContent::Handoff { call_id, to, .. } => {
                ModelMessage::Tool(ToolCallResult {
                    id: call_id.clone(),
                    content: json!({ "assistant": to.as_str() }).to_string(),
                })
            }
        }
    }
}

impl Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.speaker {
            Speaker::User => write!(f, "[user] ")?,
            Speaker::Role(id) => write!(f, "[{id}] ")?,
            Speaker::Tool(name) => write!(f, "[tool {name}] ")?,
            Speaker::System => write!(f, "[system] ")?,
        }
        match &self.content {
            TurnContent::Text(text) => write!(f, "{text}"),
            TurnContent::ToolCall(req) => {
                write!(f, "calls {}({})", req.name, req.arguments)
            }
            TurnContent::ToolResult { output, .. } => write!(f, "{output}"),
            TurnContent::ToolError { kind, message, .. } => {
                write!(f, "{kind}: {message}")
            }
            TurnContent::Handoff { from, to, .. } => {
                write!(f, "{from} hands off to {to}")
            }
        }
    }
}

/// An append-only conversation history with the currently active role.
#[derive(Clone, Debug)]
pub struct Conversation {
    turns: Vec<Turn>,
    active_role: RoleId,
}

impl Conversation {
    /// Creates an empty conversation starting at the given role.
    #[inline]
    pub fn new(entry: RoleId) -> Self {
        Self {
            turns: vec![],
            active_role: entry,
        }
    }

    /// Returns every turn, oldest first.
    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the role currently in control.
    #[inline]
    pub fn active_role(&self) -> RoleId {
        self.active_role
    }

    /// Returns the number of turns.
    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub(crate) fn push(&mut self, turn: Turn) {
        trace!("append turn: {turn}");
        self.turns.push(turn);
    }

    #[inline]
    pub(crate) fn set_active_role(&mut self, role: RoleId) {
        self.active_role = role;
    }

    pub(crate) fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.turns.iter().map(Turn::to_model_message).collect()
    }
}
