use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use backoff::ExponentialBackoff;
use research_agent_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent, OpaqueMessage, ToolCallRequest,
};
use tracing::Instrument;

pub(crate) type ModelClientError = Box<dyn ModelProviderError>;
pub(crate) type TranscriptFn = Arc<dyn Fn(&str) + Send + Sync>;

type SendRequestResult = Result<ModelClientResponse, ModelClientError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, TranscriptFn) -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub(crate) struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // Erase `P` so the agent doesn't need a generic parameter.
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_transcript).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and collects the whole response.
    ///
    /// Transient provider failures (see
    /// [`ErrorKind::is_transient`](research_agent_model::ErrorKind::is_transient))
    /// are retried according to `backoff`; any other failure is returned at
    /// once. Deltas of an attempt that fails midway may already have been
    /// passed to `on_transcript`.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: TranscriptFn,
        backoff: ExponentialBackoff,
    ) -> SendRequestResult {
        let mut attempt = 0_u32;
        backoff::future::retry(backoff, || {
            attempt += 1;
            if attempt > 1 {
                debug!("retrying model request (attempt {attempt})");
            }
            let fut = (self.handler_fn)(req.clone(), Arc::clone(&on_transcript));
            async move {
                fut.await.map_err(|err| {
                    if err.kind().is_transient() {
                        warn!("transient model error: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub(crate) struct ModelClientResponse {
    pub transcript: String,
    pub opaque_msg: Option<OpaqueMessage>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: TranscriptFn,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut transcript = String::new();
    let opaque_msg;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

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
            // The response ended without errors, so the provider can now
            // give us a replayable message for it.
            opaque_msg = pinned_resp.make_opaque_message();
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                on_transcript(&msg);
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        opaque_msg,
        tool_calls,
        finish_reason,
    })
}
