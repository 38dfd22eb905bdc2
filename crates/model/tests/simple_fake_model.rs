use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::{Pin, pin};
use std::task::{self, Poll};

use research_agent_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ToolCallRequest, ToolCallResult,
};
use serde_json::json;

#[derive(Debug)]
struct FakeError(ErrorKind);

impl Display for FakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fake error: {}", self.0)
    }
}

impl Error for FakeError {}

impl ModelProviderError for FakeError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Replays a fixed list of events, one per poll.
struct FakeResponse {
    events: Vec<ModelResponseEvent>,
    next: usize,
}

impl ModelResponse for FakeResponse {
    type Error = FakeError;

    fn poll_next_event(
        mut self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let event = self.events.get(self.next).cloned();
        self.next += 1;
        Poll::Ready(Ok(event))
    }
}

/// Asks for a search when the last message is the user query, and
/// answers with the observation once a tool result is present.
struct FakeProvider;

impl ModelProvider for FakeProvider {
    type Error = FakeError;
    type Response = FakeResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let events = match req.messages.last() {
            Some(ModelMessage::User(query)) => vec![
                ModelResponseEvent::ToolCall(ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "search".to_owned(),
                    arguments: json!({ "input": query }),
                }),
                ModelResponseEvent::Completed(ModelFinishReason::ToolCalls),
            ],
            Some(ModelMessage::Tool(result)) => vec![
                ModelResponseEvent::MessageDelta(result.content.clone()),
                ModelResponseEvent::Completed(ModelFinishReason::Stop),
            ],
            _ => return ready(Err(FakeError(ErrorKind::Other))),
        };
        ready(Ok(FakeResponse { events, next: 0 }))
    }
}

async fn collect(resp: FakeResponse) -> Vec<ModelResponseEvent> {
    let mut resp = pin!(resp);
    let mut events = vec![];
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .unwrap()
    {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_tool_round_trip() {
    let provider = FakeProvider;
    let mut req = ModelRequest {
        messages: vec![ModelMessage::User("capital of France".to_owned())],
        tools: vec![],
    };

    let events = collect(provider.send_request(&req).await.unwrap()).await;
    let ModelResponseEvent::ToolCall(call) = &events[0] else {
        panic!("expected a tool call, got {events:?}");
    };
    assert_eq!(call.arguments, json!({ "input": "capital of France" }));
    assert_eq!(
        events[1],
        ModelResponseEvent::Completed(ModelFinishReason::ToolCalls)
    );

    req.messages.push(ModelMessage::Tool(ToolCallResult {
        id: call.id.clone(),
        content: "Paris is the capital.".to_owned(),
    }));
    let events = collect(provider.send_request(&req).await.unwrap()).await;
    assert_eq!(
        events,
        vec![
            ModelResponseEvent::MessageDelta(
                "Paris is the capital.".to_owned()
            ),
            ModelResponseEvent::Completed(ModelFinishReason::Stop),
        ]
    );
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest {
        messages: vec![],
        tools: vec![],
    };
    let Err(err) = FakeProvider.send_request(&req).await else {
        panic!("empty request should fail");
    };
    assert_eq!(err.kind(), ErrorKind::Other);
}
