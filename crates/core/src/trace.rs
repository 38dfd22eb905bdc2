//! The record of what happened during a run.

use research_agent_model::{ModelMessage, ToolCallResult};

/// One tool invocation and what came back.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceStep {
    /// The identifier the model gave this call.
    pub call_id: String,
    /// The requested tool name.
    pub action: String,
    /// The input text passed to the tool.
    pub input: String,
    /// The tool output, or the error text shown to the model.
    pub observation: String,
    /// Whether the observation is an error.
    pub is_error: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TraceRound {
    request: ModelMessage,
    steps: Vec<TraceStep>,
}

/// Every tool round of a run, in order.
///
/// A round is the model message that asked for tools followed by one step
/// per requested call. The trace is replayed into each later request, so
/// the model sees its own earlier calls and their observations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Trace {
    rounds: Vec<TraceRound>,
}

impl Trace {
    /// Returns `true` if no tool was called.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rounds.iter().all(|round| round.steps.is_empty())
    }

    /// Returns the number of steps across all rounds.
    pub fn len(&self) -> usize {
        self.rounds.iter().map(|round| round.steps.len()).sum()
    }

    /// Iterates over all steps in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &TraceStep> {
        self.rounds.iter().flat_map(|round| round.steps.iter())
    }

    /// Returns the last step, if any.
    pub fn last_step(&self) -> Option<&TraceStep> {
        self.steps().last()
    }

    pub(crate) fn begin_round(&mut self, request: ModelMessage) {
        self.rounds.push(TraceRound {
            request,
            steps: vec![],
        });
    }

    pub(crate) fn push_step(&mut self, step: TraceStep) {
        match self.rounds.last_mut() {
            Some(round) => round.steps.push(step),
            None => {
                warn!("tool step recorded outside of a round");
            }
        }
    }

    /// Renders the trace as conversation messages.
    pub fn to_messages(&self) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(self.rounds.len() + self.len());
        for round in &self.rounds {
            messages.push(round.request.clone());
            messages.extend(round.steps.iter().map(|step| {
                ModelMessage::Tool(ToolCallResult {
                    id: step.call_id.clone(),
                    content: step.observation.clone(),
                })
            }));
        }
        messages
    }
}
