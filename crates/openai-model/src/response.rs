use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use marketeer_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};
use serde_json::{Map, Value};

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, ToolCallDelta};

const DONE_SENTINEL: &str = "[DONE]";

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextPayload = (Result<Option<String>, Error>, Sse);

#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn patch(&mut self, delta: ToolCallDelta) {
        if let Some(id) = delta.id {
            self.id.push_str(&id);
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                self.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                self.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> ToolCallRequest {
        // Malformed arguments are passed on as a raw string, so the
        // engine's validation reports them back to the model.
        let arguments = if self.arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&self.arguments)
                .unwrap_or(Value::String(self.arguments))
        };
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

/// Turns chat-completion chunks into model events.
///
/// Text deltas are emitted as soon as they arrive. Tool calls are
/// assembled from their fragments and emitted, ordered by index, once
/// the choice finishes, followed by the completion event.
#[derive(Default)]
struct Decoder {
    tool_calls: BTreeMap<u32, PartialToolCall>,
    completed: bool,
}

impl Decoder {
    fn ingest(
        &mut self,
        chunk: ChatCompletionChunk,
        out: &mut VecDeque<ModelResponseEvent>,
    ) {
        if self.completed {
            // Trailing usage chunks.
            return;
        }
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    out.push_back(ModelResponseEvent::MessageDelta(content));
                }
            }
            for delta in choice.delta.tool_calls.into_iter().flatten() {
                self.tool_calls.entry(delta.index).or_default().patch(delta);
            }
            if let Some(reason) = choice.finish_reason {
                let reason = match reason.as_str() {
                    "tool_calls" => ModelFinishReason::ToolCalls,
                    "length" => ModelFinishReason::Length,
                    _ => ModelFinishReason::Stop,
                };
                self.complete(reason, out);
            }
        }
    }

    fn finish(&mut self, out: &mut VecDeque<ModelResponseEvent>) {
        if !self.completed {
            let reason = if self.tool_calls.is_empty() {
                ModelFinishReason::Stop
            } else {
                ModelFinishReason::ToolCalls
            };
            self.complete(reason, out);
        }
    }

    fn complete(
        &mut self,
        reason: ModelFinishReason,
        out: &mut VecDeque<ModelResponseEvent>,
    ) {
        let tool_calls = std::mem::take(&mut self.tool_calls);
        out.extend(
            tool_calls
                .into_values()
                .map(|call| ModelResponseEvent::ToolCall(call.finish())),
        );
        out.push_back(ModelResponseEvent::Completed(reason));
        self.completed = true;
    }
}

/// A streamed chat completion.
pub struct OpenAIResponse {
    next_payload: Option<PinnedFuture<NextPayload>>,
    decoder: Decoder,
    pending: VecDeque<ModelResponseEvent>,
}

impl OpenAIResponse {
    pub fn from_sse(sse: Sse) -> Self {
        Self {
            next_payload: Some(read_payload(sse)),
            decoder: Decoder::default(),
            pending: VecDeque::new(),
        }
    }
}

fn read_payload(mut sse: Sse) -> PinnedFuture<NextPayload> {
    Box::pin(async move {
        let payload = sse.next_event().await.map_err(|err| {
            Error::new(format!("broken stream: {err:?}"), ErrorKind::Unavailable)
        });
        (payload, sse)
    })
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Ok(Some(event)));
            }
            let Some(next_payload) = &mut this.next_payload else {
                return Poll::Ready(Ok(None));
            };

            let (payload, sse) = ready!(next_payload.as_mut().poll(cx));
            this.next_payload = None;
            let payload = match payload {
                Ok(Some(payload)) if payload != DONE_SENTINEL => payload,
                Ok(_) => {
                    this.decoder.finish(&mut this.pending);
                    continue;
                }
                Err(err) => return Poll::Ready(Err(err)),
            };
            trace!("got sse payload: {payload}");

            let chunk = match serde_json::from_str::<ChatCompletionChunk>(
                &payload,
            ) {
                Ok(chunk) => chunk,
                Err(err) => {
                    return Poll::Ready(Err(Error::new(
                        format!("malformed chunk: {err}"),
                        ErrorKind::InvalidResponse,
                    )));
                }
            };
            this.decoder.ingest(chunk, &mut this.pending);
            this.next_payload = Some(read_payload(sse));
        }
    }
}
