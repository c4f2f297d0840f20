//! The hand-off engine.

mod builder;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use marketeer_model::{ModelRequest, ToolCallRequest};
use serde_json::Value;
use tracing::Instrument;

pub use builder::EngineBuilder;

use crate::conversation::{Conversation, Speaker, Turn, TurnContent};
use crate::model_client::{Completion, ModelClient};
use crate::role::{Role, RoleId, RoleSet};
use crate::tool;
use crate::{Error, ErrorKind};

/// The default bound on consecutive invalid tool calls.
pub const DEFAULT_MAX_CORRECTION_CYCLES: usize = 3;

/// Where a [`Run`] currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Waiting for the next user input.
    AwaitingUserInput,
    /// A request to the backend is in flight.
    Dispatching,
    /// A domain tool is running.
    ExecutingTool,
    /// Control is moving to another role.
    HandingOff,
    /// A terminal role produced its final answer.
    Done,
    /// The run stopped with an error.
    Failed,
}

/// Progress notifications emitted while a run is driven.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A text fragment streamed from the active role.
    Delta {
        /// The speaking role.
        role: RoleId,
        /// The fragment.
        text: String,
    },
    /// The active role invoked a domain tool.
    ToolCall {
        /// The calling role.
        role: RoleId,
        /// The tool name.
        tool: String,
    },
    /// A tool call was rejected and sent back for correction.
    Correction {
        /// The offending role.
        role: RoleId,
        /// The error reported to the backend.
        error: Error,
    },
    /// Control moved to another role.
    Handoff {
        /// The role giving up control.
        from: RoleId,
        /// The role taking over.
        to: RoleId,
    },
}

/// What a submission produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The active role answered and waits for more input.
    Reply(String),
    /// A terminal role produced the final answer.
    Done(String),
}

impl Outcome {
    /// Returns the answer text.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            Outcome::Reply(content) | Outcome::Done(content) => content,
        }
    }

    /// Returns `true` if the run has finished.
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }
}

type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Drives conversations through a [`RoleSet`].
///
/// Cloning is cheap; clones share the same roles and backend.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    model_client: ModelClient,
    roles: RoleSet,
    max_correction_cycles: usize,
    on_event: Option<EventHandler>,
}

impl Engine {
    /// Returns the roles this engine dispatches to.
    #[inline]
    pub fn roles(&self) -> &RoleSet {
        &self.inner.roles
    }

    /// Returns the bound on consecutive invalid tool calls.
    #[inline]
    pub fn max_correction_cycles(&self) -> usize {
        self.inner.max_correction_cycles
    }

    /// Starts a new run with `entry` as the active role.
    pub fn start(&self, entry: RoleId) -> Result<Run, Error> {
        if self.roles().get(entry).is_none() {
            return Err(Error::new(ErrorKind::InvalidConfig)
                .with_reason(format!("entry role `{entry}` is not defined")));
        }
        Ok(Run {
            engine: self.clone(),
            conversation: Conversation::new(entry),
            stage: Stage::AwaitingUserInput,
            corrections: 0,
        })
    }

    fn role(&self, id: RoleId) -> &Role {
        // Entry roles are checked in `start`, and hand-off targets are
        // resolved when the role set is built.
        self.roles()
            .get(id)
            .expect("internal state is inconsistent: active role is unknown")
    }

    fn emit(&self, event: Event) {
        if let Some(on_event) = &self.inner.on_event {
            on_event(event);
        }
    }
}

/// A single conversation being driven by an [`Engine`].
pub struct Run {
    engine: Engine,
    conversation: Conversation,
    stage: Stage,
    corrections: usize,
}

impl Run {
    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Consumes the run and returns its conversation.
    #[inline]
    pub fn into_conversation(self) -> Conversation {
        self.conversation
    }

    /// Returns the current stage.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the role currently in control.
    #[inline]
    pub fn active_role(&self) -> &Role {
        self.engine.role(self.conversation.active_role())
    }

    /// Appends the user input and drives the roles until one of them
    /// answers in text.
    ///
    /// Submitting to a run that is [`Stage::Done`] or [`Stage::Failed`]
    /// fails with [`ErrorKind::RunFinished`].
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Turns are appended whole: a tool call
    /// is committed together with its result, so dropping the future
    /// leaves a consistent history and the run accepts new input.
    pub async fn submit(
        &mut self,
        input: impl Into<String>,
    ) -> Result<Outcome, Error> {
        if matches!(self.stage, Stage::Done | Stage::Failed) {
            return Err(Error::new(ErrorKind::RunFinished));
        }

        self.corrections = 0;
        self.conversation
            .push(Turn::new(Speaker::User, TurnContent::Text(input.into())));

        let result = self.drive().instrument(debug_span!("submit")).await;
        self.stage = match &result {
            Ok(Outcome::Reply(_)) => Stage::AwaitingUserInput,
            Ok(Outcome::Done(_)) => Stage::Done,
            Err(err) => {
                warn!("run failed: {err}");
                Stage::Failed
            }
        };
        result
    }

    async fn drive(&mut self) -> Result<Outcome, Error> {
        let engine = self.engine.clone();
        loop {
            self.stage = Stage::Dispatching;
            let role = engine.role(self.conversation.active_role());
            let mut completion = dispatch(&engine, role, &self.conversation)
                .instrument(debug_span!("dispatch", role = %role.id()))
                .await?;

            if completion.tool_calls.is_empty() {
                let content = completion.content;
                self.conversation.push(Turn::new(
                    Speaker::Role(role.id()),
                    TurnContent::Text(content.clone()),
                ));
                return Ok(if role.is_terminal() {
                    Outcome::Done(content)
                } else {
                    Outcome::Reply(content)
                });
            }

            if completion.tool_calls.len() > 1 {
                warn!(
                    "{} asked for {} tool calls, only the first one is used",
                    role.id(),
                    completion.tool_calls.len()
                );
            }
            let call = completion.tool_calls.swap_remove(0);

            if !completion.content.is_empty() {
                self.conversation.push(Turn::new(
                    Speaker::Role(role.id()),
                    TurnContent::Text(completion.content),
                ));
            }

            let Some(tool) = role.allowed_tool(&call.name) else {
                let known = engine.roles().registry().contains(&call.name);
                let reason = if known {
                    format!("{} may not call `{}`", role.id(), call.name)
                } else {
                    format!("no tool named `{}` exists", call.name)
                };
                let err =
                    Error::new(ErrorKind::ToolNotPermitted).with_reason(reason);
                self.reject(role.id(), call, err)?;
                continue;
            };

            if let Some(target) = tool.handoff_target() {
                if !takes_no_arguments(&call.arguments) {
                    let err = Error::new(ErrorKind::InvalidToolArguments)
                        .with_reason(format!(
                            "`{}` takes no arguments",
                            call.name
                        ));
                    self.reject(role.id(), call, err)?;
                    continue;
                }
                self.stage = Stage::HandingOff;
                self.hand_off(role.id(), target, call);
                continue;
            }

            let prepared = match tool.prepare(call.arguments.clone()) {
                Some(Ok(prepared)) => prepared,
                Some(Err(err)) => {
                    let err = Error::new(ErrorKind::InvalidToolArguments)
                        .with_reason(err.reason());
                    self.reject(role.id(), call, err)?;
                    continue;
                }
                None => unreachable!("hand-off tools are handled above"),
            };

            self.stage = Stage::ExecutingTool;
            engine.emit(Event::ToolCall {
                role: role.id(),
                tool: call.name.clone(),
            });
            match prepared.await {
                Ok(output) => {
                    self.corrections = 0;
                    let call_id = call.id.clone();
                    let speaker = Speaker::Tool(call.name.clone());
                    self.push_call(role.id(), call);
                    self.conversation.push(Turn::new(
                        speaker,
                        TurnContent::ToolResult { call_id, output },
                    ));
                }
                Err(err) if err.kind() == tool::ErrorKind::InvalidInput => {
                    let err = Error::new(ErrorKind::InvalidToolArguments)
                        .with_reason(err.reason());
                    self.reject(role.id(), call, err)?;
                }
                Err(err) => {
                    let reason = format!("`{}`: {}", call.name, err.reason());
                    let err = Error::new(ErrorKind::ToolExecutionError)
                        .with_reason(reason);
                    self.push_failure(role.id(), call, &err);
                    return Err(err);
                }
            }
        }
    }

    /// Records an invalid call and decides whether another correction
    /// cycle is allowed.
    ///
    /// The count covers consecutive rejections only; a valid tool call
    /// or a hand-off resets it.
    fn reject(
        &mut self,
        role: RoleId,
        call: ToolCallRequest,
        err: Error,
    ) -> Result<(), Error> {
        debug!("rejected tool call from {role}: {err}");
        self.push_failure(role, call, &err);

        let max = self.engine.max_correction_cycles();
        if max == 0 {
            return Err(err);
        }
        self.corrections += 1;
        if self.corrections > max {
            return Err(Error::new(ErrorKind::MaxCorrectionCyclesExceeded)
                .with_reason(format!(
                    "gave up after {max} correction cycles, last error: {err}"
                )));
        }
        self.engine.emit(Event::Correction { role, error: err });
        Ok(())
    }

    fn hand_off(&mut self, from: RoleId, to: RoleId, call: ToolCallRequest) {
        info!("{from} hands off to {to}");
        self.corrections = 0;
        let call_id = call.id.clone();
        self.push_call(from, call);
        self.conversation.push(Turn::new(
            Speaker::System,
            TurnContent::Handoff { call_id, from, to },
        ));
        self.conversation.set_active_role(to);
        self.engine.emit(Event::Handoff { from, to });
    }

    fn push_call(&mut self, role: RoleId, call: ToolCallRequest) {
        self.conversation
            .push(Turn::new(Speaker::Role(role), TurnContent::ToolCall(call)));
    }

    fn push_failure(
        &mut self,
        role: RoleId,
        call: ToolCallRequest,
        err: &Error,
    ) {
        let call_id = call.id.clone();
        let speaker = Speaker::Tool(call.name.clone());
        self.push_call(role, call);
        self.conversation.push(Turn::new(
            speaker,
            TurnContent::ToolError {
                call_id,
                kind: err.kind(),
                message: err.reason().into_owned(),
            },
        ));
    }
}

fn takes_no_arguments(arguments: &Value) -> bool {
    match arguments {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

async fn dispatch(
    engine: &Engine,
    role: &Role,
    conversation: &Conversation,
) -> Result<Completion, Error> {
    let req = ModelRequest {
        instructions: role.system_prompt().to_owned(),
        messages: conversation.to_model_messages(),
        tools: role.tool_definitions(),
    };
    let on_delta = {
        let engine = engine.clone();
        let role = role.id();
        move |text| engine.emit(Event::Delta { role, text })
    };
    engine
        .inner
        .model_client
        .send_request(req, on_delta)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::BackendUnavailable)
                .with_reason(format!("{} ({})", err, err.kind()))
        })
}
