use std::sync::Arc;
use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use research_agent_model::ModelProvider;

use super::{Agent, AgentEvent, EventFn};
use crate::model_client::ModelClient;
use crate::schema::{RESEARCH_RECORD, Schema};
use crate::tool::{Tool, ToolRegistry};

/// The default round limit.
pub const DEFAULT_MAX_ROUNDS: usize = 15;

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    persona: String,
    format_instructions: String,
    tools: ToolRegistry,
    shared_tools: Option<Arc<ToolRegistry>>,
    max_rounds: usize,
    round_timeout: Option<Duration>,
    backoff: ExponentialBackoff,
    on_event: Option<EventFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            persona: String::new(),
            format_instructions: RESEARCH_RECORD.format_instructions(),
            tools: ToolRegistry::default(),
            shared_tools: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_timeout: None,
            backoff: ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(Duration::from_secs(60)))
                .build(),
            on_event: None,
        }
    }

    /// Sets the persona that opens the system message.
    #[inline]
    pub fn with_persona<S: Into<String>>(mut self, persona: S) -> Self {
        self.persona = persona.into();
        self
    }

    /// Sets the schema the final answer must follow.
    #[inline]
    pub fn with_schema(mut self, schema: &Schema) -> Self {
        self.format_instructions = schema.format_instructions();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    /// Uses an already built registry, e.g. one shared with other agents.
    ///
    /// This replaces tools added with [`AgentBuilder::with_tool`].
    #[inline]
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.shared_tools = Some(tools);
        self
    }

    /// Sets the maximum number of model rounds. Values below 1 count as 1.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Bounds each model round and each tool call.
    #[inline]
    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round_timeout = Some(timeout);
        self
    }

    /// Sets the retry policy for transient model errors.
    #[inline]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attaches a callback that receives progress events of every run.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(on_event));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let tools = match self.shared_tools {
            Some(tools) => tools,
            None => Arc::new(self.tools),
        };
        Agent {
            model_client: self.model_client,
            tools,
            persona: self.persona,
            format_instructions: self.format_instructions,
            max_rounds: self.max_rounds,
            round_timeout: self.round_timeout,
            backoff: self.backoff,
            on_event: self.on_event,
        }
    }
}
