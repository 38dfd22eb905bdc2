mod builder;
mod error;

use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use research_agent_model::{ModelMessage, ModelRequest, ToolCallRequest};
use serde_json::Value;
use tokio::time::timeout;
use tracing::Instrument;

use crate::model_client::{ModelClient, ModelClientResponse, TranscriptFn};
use crate::prompt::PromptContext;
use crate::tool::{self, ToolInput, ToolRegistry};
use crate::trace::{Trace, TraceStep};
pub use builder::{AgentBuilder, DEFAULT_MAX_ROUNDS};
pub use error::AgentError;

pub(crate) type EventFn = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCall {
    /// The identifier the model gave this call.
    pub id: String,
    /// The requested tool name.
    pub name: String,
    /// The raw arguments, as decoded from the model.
    pub arguments: Value,
}

impl ToolCall {
    /// The input text of the call, as recorded in the trace.
    ///
    /// Falls back to the raw JSON when the arguments carry no input text.
    pub fn input_text(&self) -> String {
        ToolInput::from_arguments(self.arguments.clone())
            .unwrap_or_else(|_| self.arguments.to_string())
    }
}

impl From<ToolCallRequest> for ToolCall {
    #[inline]
    fn from(req: ToolCallRequest) -> Self {
        Self {
            id: req.id,
            name: req.name,
            arguments: req.arguments,
        }
    }
}

/// What one complete model response asks the agent to do.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelReply {
    /// Run these tools, in order, then ask again.
    ToolCalls(Vec<ToolCall>),
    /// The run is over; this is the raw final text.
    FinalAnswer(String),
}

impl ModelReply {
    /// Any tool call wins over text, which is then only a preamble.
    fn from_response(resp: &ModelClientResponse) -> Result<Self, AgentError> {
        if !resp.tool_calls.is_empty() {
            if resp.tool_calls.iter().any(|req| req.name.trim().is_empty()) {
                return Err(AgentError::MalformedReply {
                    reason: "tool call without a name",
                    transcript: resp.transcript.clone(),
                });
            }
            let calls = resp.tool_calls.iter().cloned().map(Into::into);
            return Ok(ModelReply::ToolCalls(calls.collect()));
        }
        if resp.transcript.trim().is_empty() {
            return Err(AgentError::MalformedReply {
                reason: "neither text nor tool calls",
                transcript: resp.transcript.clone(),
            });
        }
        Ok(ModelReply::FinalAnswer(resp.transcript.clone()))
    }
}

/// Progress of a run, reported through [`AgentBuilder::on_event`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentEvent {
    /// A model round is about to be sent. Rounds count from 1.
    RoundStarted {
        /// The round number.
        round: usize,
    },
    /// A text delta streamed by the model.
    Transcript(String),
    /// A tool is about to run.
    ToolCall {
        /// The round that requested the call.
        round: usize,
        /// The call.
        call: ToolCall,
    },
    /// A tool has finished.
    ToolResult {
        /// The round that requested the call.
        round: usize,
        /// The recorded step.
        step: TraceStep,
    },
    /// The model gave its final answer.
    Finished {
        /// Model rounds used.
        rounds: usize,
    },
}

/// A finished run.
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    /// The model's final raw text. Not validated against any schema.
    pub output: String,
    /// Every tool step of the run.
    pub trace: Trace,
    /// Model rounds used, including the final one.
    pub rounds: usize,
}

/// A research agent: a model, a set of tools, and the loop between them.
///
/// The agent itself holds no per-run state. [`Agent::run`] takes `&self`,
/// so one agent can serve many concurrent runs; each run owns its trace.
pub struct Agent {
    model_client: ModelClient,
    tools: Arc<ToolRegistry>,
    persona: String,
    format_instructions: String,
    max_rounds: usize,
    round_timeout: Option<Duration>,
    backoff: ExponentialBackoff,
    on_event: Option<EventFn>,
}

impl Agent {
    /// Answers `query`, calling tools as the model asks.
    ///
    /// Tool failures (including unknown tools and tool timeouts) do not end
    /// the run; they are shown to the model as observations. The run fails
    /// only if the model cannot be reached, sends an unusable reply, runs
    /// out of rounds, or exceeds the round timeout.
    pub async fn run(&self, query: &str) -> Result<AgentOutcome, AgentError> {
        let span = info_span!("agent run", max_rounds = self.max_rounds);
        self.run_loop(query).instrument(span).await
    }

    /// The tools offered to the model.
    #[inline]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// The formatting instructions embedded in the system message.
    #[inline]
    pub fn format_instructions(&self) -> &str {
        &self.format_instructions
    }

    async fn run_loop(&self, query: &str) -> Result<AgentOutcome, AgentError> {
        let definitions = self.tools.definitions();
        let mut trace = Trace::default();
        let mut last_transcript = String::new();

        for round in 1..=self.max_rounds {
            debug!("starting round {round}");
            self.emit(AgentEvent::RoundStarted { round });

            let ctx = PromptContext {
                persona: &self.persona,
                format_instructions: &self.format_instructions,
                history: &[],
                query,
                trace: &trace,
            };
            let req = ctx.to_request(definitions.clone());
            let resp = self.call_model(round, req).await?;

            let calls = match ModelReply::from_response(&resp)? {
                ModelReply::FinalAnswer(output) => {
                    info!("final answer after {round} rounds");
                    self.emit(AgentEvent::Finished { rounds: round });
                    return Ok(AgentOutcome {
                        output,
                        trace,
                        rounds: round,
                    });
                }
                ModelReply::ToolCalls(calls) => calls,
            };

            last_transcript.clone_from(&resp.transcript);
            let msg = match resp.opaque_msg {
                Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
                // Downgrade to a text-only message.
                None => ModelMessage::Assistant(resp.transcript),
            };
            trace.begin_round(msg);
            for call in calls {
                let step = self.execute_tool(round, call).await;
                trace.push_step(step);
            }
        }

        warn!("no final answer after {} rounds", self.max_rounds);
        Err(AgentError::MaxIterationsExceeded {
            rounds: self.max_rounds,
            transcript: last_transcript,
            trace,
        })
    }

    async fn call_model(
        &self,
        round: usize,
        req: ModelRequest,
    ) -> Result<ModelClientResponse, AgentError> {
        let on_transcript: TranscriptFn = match &self.on_event {
            Some(on_event) => {
                let on_event = Arc::clone(on_event);
                Arc::new(move |delta: &str| {
                    on_event(AgentEvent::Transcript(delta.to_owned()));
                })
            }
            None => Arc::new(|_: &str| {}),
        };
        let fut = self.model_client.send_request(
            req,
            on_transcript,
            self.backoff.clone(),
        );

        let resp_or_err = match self.round_timeout {
            Some(limit) => timeout(limit, fut).await.map_err(|_| {
                warn!("round {round} timed out");
                AgentError::RoundTimeout {
                    round,
                    timeout: limit,
                }
            })?,
            None => fut.await,
        };
        resp_or_err.map_err(|err| AgentError::Model {
            kind: err.kind(),
            message: err.to_string(),
        })
    }

    async fn execute_tool(&self, round: usize, call: ToolCall) -> TraceStep {
        self.emit(AgentEvent::ToolCall {
            round,
            call: call.clone(),
        });

        let span = debug_span!("tool", name = %call.name, id = %call.id);
        let input = call.input_text();
        let fut = self
            .tools
            .invoke(&call.name, call.arguments)
            .instrument(span.clone());
        let result = match self.round_timeout {
            Some(limit) => timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(tool::Error::execution_error()
                    .with_reason(format!("timed out after {limit:?}")))
            }),
            None => fut.await,
        };

        let (observation, is_error) = match result {
            Ok(output) => (output, false),
            Err(err) => {
                span.in_scope(|| warn!("tool failed: {err}"));
                (err.to_string(), true)
            }
        };
        let step = TraceStep {
            call_id: call.id,
            action: call.name,
            input,
            observation,
            is_error,
        };
        self.emit(AgentEvent::ToolResult {
            round,
            step: step.clone(),
        });
        step
    }

    #[inline]
    fn emit(&self, event: AgentEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(event);
        }
    }
}
