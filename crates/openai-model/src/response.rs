use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use research_agent_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use serde_json::Value;

use crate::Error;
use crate::io::Sse;
use crate::proto::{ChatCompletionChunk, Choice, Message, ToolCall};

/// Everything read from the stream so far.
struct StreamState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    finish_reason: Option<ModelFinishReason>,
    // Events decoded but not yet handed out. Text deltas are queued as soon
    // as they arrive; tool calls and the completion marker are queued once
    // the stream ends, when the tool call arguments are complete.
    ready: VecDeque<ModelResponseEvent>,
    finished: bool,
}

impl StreamState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: String::new(),
            reasoning_content: None,
            tool_calls: vec![],
            finish_reason: None,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    fn apply_chunk(&mut self, chunk: ChatCompletionChunk) -> Result<(), Error> {
        if self.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }
        // Usage-only chunks have no choices.
        for choice in chunk.choices {
            self.apply_choice(choice)?;
        }
        Ok(())
    }

    fn apply_choice(&mut self, choice: Choice) -> Result<(), Error> {
        let delta = choice.delta;
        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            self.content.push_str(&content);
            self.ready.push_back(ModelResponseEvent::MessageDelta(content));
        }
        if let Some(reasoning_content) = delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_default()
                .push_str(&reasoning_content);
        }
        for tool_call in delta.tool_calls.into_iter().flatten() {
            self.merge_tool_call(tool_call);
        }

        match choice.finish_reason.as_deref() {
            None => {}
            Some("tool_calls") => {
                self.finish_reason = Some(ModelFinishReason::ToolCalls);
            }
            Some("content_filter") => {
                return Err(Error::new(
                    "response was blocked by the content filter",
                    ErrorKind::Moderated,
                ));
            }
            Some(_) => self.finish_reason = Some(ModelFinishReason::Stop),
        }
        Ok(())
    }

    fn merge_tool_call(&mut self, delta: ToolCall) {
        let Some(partial) =
            self.tool_calls.iter_mut().find(|t| t.index == delta.index)
        else {
            self.tool_calls.push(delta);
            return;
        };

        if let Some(id) = delta.id {
            partial.id.get_or_insert_default().push_str(&id);
        }
        if let Some(ty) = delta.r#type {
            partial.r#type.get_or_insert_default().push_str(&ty);
        }
        let Some(function) = delta.function else {
            return;
        };
        match &mut partial.function {
            Some(partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial.function = Some(function),
        }
    }

    /// Queues the tool calls and the completion marker.
    fn finish(&mut self) {
        self.finished = true;
        for tool_call in &self.tool_calls {
            self.ready
                .push_back(ModelResponseEvent::ToolCall(to_request(tool_call)));
        }
        let reason = self.finish_reason.unwrap_or(if self.tool_calls.is_empty()
        {
            ModelFinishReason::Stop
        } else {
            ModelFinishReason::ToolCalls
        });
        self.ready.push_back(ModelResponseEvent::Completed(reason));
    }

    fn into_message(self) -> Option<(String, Message)> {
        let content = (!self.content.is_empty()).then_some(self.content);
        Some((
            self.id?,
            Message::Assistant {
                content,
                tool_calls: (!self.tool_calls.is_empty())
                    .then_some(self.tool_calls),
                reasoning_content: self.reasoning_content,
            },
        ))
    }
}

fn to_request(tool_call: &ToolCall) -> ToolCallRequest {
    let function = tool_call.function.as_ref();
    let raw_arguments = function
        .and_then(|f| f.arguments.as_deref())
        .unwrap_or_default();
    let arguments = if raw_arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw_arguments).unwrap_or_else(|err| {
            warn!("tool call arguments are not JSON ({err}): {raw_arguments}");
            Value::Null
        })
    };
    ToolCallRequest {
        id: tool_call.id.clone().unwrap_or_default(),
        name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
        arguments,
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, StreamState), Error>;

pin_project! {
    /// A streamed chat-completion response.
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        let state = StreamState::new(sse);
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, state) = match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), state)) => (event, state),
            Ok((None, state)) => {
                *this.next_event_fut = None;
                *this.full_msg = state.into_message();
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_event_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        *this.next_event_fut = Some(Box::pin(next_event(state)));
        Poll::Ready(Ok(Some(event)))
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(mut state: StreamState) -> NextEvent {
    loop {
        if let Some(event) = state.ready.pop_front() {
            return Ok((Some(event), state));
        }
        if state.finished {
            return Ok((None, state));
        }

        let sse_event = match state.sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                state.finish();
                continue;
            }
            Err(err) => {
                return Err(Error::new(
                    format!("malformed event stream: {err:?}"),
                    ErrorKind::Other,
                ));
            }
        };
        trace!("got sse event: {sse_event}");
        if sse_event == "[DONE]" {
            state.finish();
            continue;
        }

        let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        state.apply_chunk(chunk)?;
    }
}
