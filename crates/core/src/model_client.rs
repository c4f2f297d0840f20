//! A type-erased client over any model provider.

use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use marketeer_model::{
    ModelFinishReason, ModelMessage, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

type SendRequestResult = Result<Completion, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a model provider that hides the provider's type
/// from the rest of the pipeline.
///
/// Cloning is cheap; clones share the same provider.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    provider_name: Arc<str>,
}

impl ModelClient {
    /// Wraps the given provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let provider_name = Arc::from(provider.name());
        // `ModelClient` has no generic parameter, so `P` is erased here.
        let handler_fn: HandlerFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_delta).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            provider_name,
        }
    }

    /// Returns the name of the wrapped provider.
    #[inline]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Sends a request and waits for the complete response.
    ///
    /// `on_delta` is called with every text fragment as it streams in.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: impl Fn(String) + Send + 'static,
    ) -> Result<Completion, Box<dyn ModelProviderError>> {
        (self.handler_fn)(req, Box::new(on_delta)).await
    }

    /// Runs a single-shot, tool-less completion and returns its text.
    pub async fn complete_text(
        &self,
        instructions: impl Into<String>,
        input: impl Into<String>,
    ) -> Result<String, Box<dyn ModelProviderError>> {
        let req = ModelRequest {
            instructions: instructions.into(),
            messages: vec![ModelMessage::User(input.into())],
            tools: vec![],
        };
        let completion = self.send_request(req, |_| {}).await?;
        Ok(completion.content)
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// The concatenated text of the response.
    pub content: String,
    /// Tool calls requested by the model, in order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_delta: Box<dyn Fn(String) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut completion = Completion::default();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                completion.content.push_str(&msg);
                on_delta(msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                completion.tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                completion.finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(completion)
}
