//! The research agent loop: prompt assembly, tool calling, and the
//! structured-output contract of the final answer.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod model_client;
pub mod prompt;
pub mod schema;
pub mod tool;
pub mod trace;

pub use agent::{
    Agent, AgentBuilder, AgentError, AgentEvent, AgentOutcome,
    DEFAULT_MAX_ROUNDS, ModelReply, ToolCall,
};
pub use schema::{
    FieldType, OutputError, RESEARCH_RECORD, ResearchRecord, Schema,
    SchemaField, Violation,
};
pub use tool::{Tool, ToolRegistry, ToolResult};
pub use trace::{Trace, TraceStep};
