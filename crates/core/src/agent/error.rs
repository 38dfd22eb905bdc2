use std::time::Duration;

use research_agent_model::ErrorKind;
use thiserror::Error;

use crate::trace::Trace;

/// A run that ended without a final answer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider failed, after any retries.
    #[error("model request failed ({kind}): {message}")]
    Model {
        /// The provider's error kind.
        kind: ErrorKind,
        /// The provider's error message.
        message: String,
    },
    /// The model sent a reply the agent cannot act on.
    #[error("malformed model reply: {reason}")]
    MalformedReply {
        /// What is wrong with the reply.
        reason: &'static str,
        /// The raw text of the reply.
        transcript: String,
    },
    /// The round limit was reached without a final answer.
    #[error("no final answer after {rounds} rounds")]
    MaxIterationsExceeded {
        /// The round limit.
        rounds: usize,
        /// The text of the last model reply, often empty.
        transcript: String,
        /// Every step taken before giving up.
        trace: Trace,
    },
    /// A model round took longer than allowed.
    #[error("round {round} timed out after {timeout:?}")]
    RoundTimeout {
        /// The round that timed out.
        round: usize,
        /// The configured limit.
        timeout: Duration,
    },
}

impl AgentError {
    /// The raw model text involved in the failure, if any.
    ///
    /// When the round limit is hit this is the last reply text, or the
    /// last tool observation if the model said nothing.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            AgentError::MalformedReply { transcript, .. } => Some(transcript),
            AgentError::MaxIterationsExceeded {
                transcript, trace, ..
            } => {
                if transcript.is_empty() {
                    trace.last_step().map(|step| step.observation.as_str())
                } else {
                    Some(transcript)
                }
            }
            _ => None,
        }
    }

    /// The partial trace, if the run got far enough to have one.
    pub fn trace(&self) -> Option<&Trace> {
        match self {
            AgentError::MaxIterationsExceeded { trace, .. } => Some(trace),
            _ => None,
        }
    }
}
