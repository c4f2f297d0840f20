//! A scripted fake completion backend for tests.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use marketeer_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: VecDeque<ModelResponseEvent>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // Every field is `Unpin`.
        let this = self.get_mut();
        if this.events.is_empty() {
            return Poll::Ready(Ok(None));
        }

        let delay = this.delay;
        let sleep = this.sleep.get_or_insert_with(|| Box::pin(sleep(delay)));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        Poll::Ready(Ok(this.events.pop_front()))
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Responses are handed out in the order they were added, one per
/// request, regardless of what the request contains. Every request is
/// recorded so that tests can assert what the backend was shown. Clones
/// share the same script.
///
/// When the script runs out, requests fail with
/// [`ErrorKind::Unavailable`].
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().responses.push_back(preset);
    }

    /// Sets the delay before each streamed event.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of responses not consumed yet.
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn name(&self) -> &str {
        "test"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let result = match script.responses.pop_front() {
            None => Err(Error {
                message: "script exhausted",
                kind: ErrorKind::Unavailable,
            }),
            Some(PresetResponse {
                failure: Some(kind),
                ..
            }) => Err(Error {
                message: "preset failure",
                kind,
            }),
            Some(preset) => Ok(make_response(
                preset,
                self.delay.unwrap_or(Duration::from_millis(1)),
            )),
        };
        ready(result)
    }
}

fn make_response(preset: PresetResponse, delay: Duration) -> TestModelResponse {
    let has_tool_call = preset
        .events
        .iter()
        .any(|event| matches!(event, PresetEvent::ToolCall(_)));

    let mut events: VecDeque<_> = preset
        .events
        .into_iter()
        .map(|event| match event {
            PresetEvent::MessageDelta(msg) => {
                ModelResponseEvent::MessageDelta(msg)
            }
            PresetEvent::ToolCall(req) => ModelResponseEvent::ToolCall(req),
        })
        .collect();
    events.push_back(ModelResponseEvent::Completed(if has_tool_call {
        ModelFinishReason::ToolCalls
    } else {
        ModelFinishReason::Stop
    }));

    TestModelResponse {
        events,
        delay,
        sleep: None,
    }
}
