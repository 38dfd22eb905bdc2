//! A scripted fake model for testing the agent without a network.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use research_agent_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, OpaqueMessage,
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
    turn: usize,
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let event = match this.events.get(this.event_idx) {
                Some(PresetEvent::MessageDelta(msg)) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                Some(PresetEvent::ToolCall(req)) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
                None if this.event_idx == this.events.len() => {
                    let has_tool_call = this
                        .events
                        .iter()
                        .any(|event| matches!(event, PresetEvent::ToolCall(_)));
                    ModelResponseEvent::Completed(if has_tool_call {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    })
                }
                // Polled after completion.
                None => return Poll::Ready(Ok(None)),
            };
            this.event_idx += 1;
            return Poll::Ready(Ok(Some(event)));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        let id = format!("turn:{}", self.turn);
        Some(OpaqueMessage::new(id, self.events.clone()))
    }
}

#[derive(Default)]
struct SharedState {
    requests: Vec<ModelRequest>,
    failed_attempts: HashMap<usize, u64>,
}

/// A fake model that answers from a script.
///
/// The response for a request is chosen by counting the model messages
/// already present in it: the first request (no model messages yet) gets
/// the first preset, the request after one tool round gets the second, and
/// so on. When the script runs out, the request fails unless
/// [`TestModelProvider::repeat_last`] is set.
///
/// Clones share the same request log, so a test can keep one clone for
/// assertions and hand another to the agent.
///
/// # Note
///
/// This type copies requests around freely. Use it only in tests.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Vec<PresetResponse>,
    repeat_last: bool,
    delay: Option<Duration>,
    state: Arc<Mutex<SharedState>>,
}

impl TestModelProvider {
    /// Appends a response for the next model turn.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.push(preset);
    }

    /// Keeps answering with the last preset once the script runs out.
    #[inline]
    pub fn repeat_last(&mut self) {
        self.repeat_last = true;
    }

    /// Sets the delay before each streamed event.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock_state().requests.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let turn = req
            .messages
            .iter()
            .filter(|msg| msg.is_from_model())
            .count();

        let preset = match self.script.get(turn) {
            Some(preset) => preset,
            None if self.repeat_last => match self.script.last() {
                Some(preset) => preset,
                None => {
                    return Err(Error {
                        message: "empty script",
                        kind: ErrorKind::Other,
                    });
                }
            },
            None => {
                return Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::Other,
                });
            }
        };

        if let Some(failures) = preset.failures {
            let mut state = self.lock_state();
            let attempts = state.failed_attempts.entry(turn).or_default();
            if failures == 0 || *attempts < failures {
                *attempts += 1;
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
        }

        Ok(TestModelResponse {
            turn,
            events: preset.events.clone(),
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.lock_state().requests.push(req.clone());
        ready(self.respond(req))
    }
}
