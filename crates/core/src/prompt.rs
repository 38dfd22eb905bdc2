//! Assembling the prompt for each model call.

use research_agent_model::{ModelMessage, ModelRequest, ModelTool};

use crate::trace::Trace;

/// Everything that goes into one request, borrowed from the running agent.
#[derive(Clone, Copy, Debug)]
pub struct PromptContext<'a> {
    /// The persona text.
    pub persona: &'a str,
    /// How to shape the final answer.
    pub format_instructions: &'a str,
    /// Prior conversation turns, placed before the query.
    pub history: &'a [ModelMessage],
    /// The user's question.
    pub query: &'a str,
    /// Tool rounds so far.
    pub trace: &'a Trace,
}

impl PromptContext<'_> {
    /// The system message: persona, then formatting instructions.
    pub fn system_message(&self) -> String {
        let persona = self.persona.trim_end();
        if persona.is_empty() {
            return self.format_instructions.to_owned();
        }
        format!("{persona}\n{}", self.format_instructions)
    }

    /// The ordered conversation for the model.
    pub fn to_messages(&self) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(2 + self.history.len());
        messages.push(ModelMessage::System(self.system_message()));
        messages.extend_from_slice(self.history);
        messages.push(ModelMessage::User(self.query.to_owned()));
        messages.extend(self.trace.to_messages());
        messages
    }

    /// Builds the request for this context.
    #[inline]
    pub fn to_request(&self, tools: Vec<ModelTool>) -> ModelRequest {
        ModelRequest {
            messages: self.to_messages(),
            tools,
        }
    }
}
