use research_agent_core::{AgentError, OutputError};
use thiserror::Error;

/// Why a research run produced no record.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The model never produced a final answer.
    #[error("the agent did not finish: {0}")]
    Agent(#[from] AgentError),
    /// The model finished, but its answer does not fit the schema.
    #[error("the agent's answer is malformed: {0}")]
    Output(#[from] OutputError),
}

impl ResearchError {
    /// The raw model text behind the failure, if there is one.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            ResearchError::Agent(err) => err.raw_output(),
            ResearchError::Output(err) => Some(err.raw()),
        }
    }
}
