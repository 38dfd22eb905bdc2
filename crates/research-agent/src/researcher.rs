use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use research_agent_core::{
    Agent, AgentBuilder, AgentEvent, ResearchRecord, Tool, ToolRegistry,
    Trace,
};
use research_agent_model::ModelProvider;

use crate::error::ResearchError;
use crate::tools::*;

const PERSONA: &str = include_str!("./persona.md");

/// A researcher builder.
///
/// See [`Researcher`].
pub struct ResearcherBuilder {
    agent_builder: AgentBuilder,
    output_path: Option<PathBuf>,
    lookup_chars: Option<usize>,
    custom_tools: Vec<Box<dyn FnOnce(&mut ToolRegistry) + Send>>,
}

impl ResearcherBuilder {
    /// Creates a researcher builder with a specified model provider.
    ///
    /// The researcher starts with the `search`, `lookup` and `save` tools
    /// in their default configuration.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder =
            AgentBuilder::with_model_provider(provider).with_persona(PERSONA);
        Self {
            agent_builder,
            output_path: None,
            lookup_chars: None,
            custom_tools: Vec::new(),
        }
    }

    /// Replaces the persona that opens the system message.
    #[inline]
    pub fn with_persona<S: Into<String>>(mut self, persona: S) -> Self {
        self.agent_builder = self.agent_builder.with_persona(persona);
        self
    }

    /// Adds a tool.
    ///
    /// A tool named like one of the defaults replaces it, whatever the
    /// order of the builder calls, and the settings for that default
    /// ([`with_output_path`](Self::with_output_path),
    /// [`with_lookup_chars`](Self::with_lookup_chars)) then have no effect.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let register = move |tools: &mut ToolRegistry| tools.register(tool);
        self.custom_tools.push(Box::new(register));
        self
    }

    /// Makes the default `save` tool write to `path`.
    #[inline]
    pub fn with_output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets how many characters the default `lookup` tool returns.
    #[inline]
    pub fn with_lookup_chars(mut self, chars: usize) -> Self {
        self.lookup_chars = Some(chars);
        self
    }

    /// Sets the maximum number of model rounds.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_rounds(max_rounds);
        self
    }

    /// Bounds each model round and each tool call.
    #[inline]
    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.agent_builder = self.agent_builder.with_round_timeout(timeout);
        self
    }

    /// Attaches a callback that receives progress events.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_event(on_event);
        self
    }

    /// Builds a new researcher.
    pub fn build(self) -> Researcher {
        let mut lookup = LookupTool::new();
        if let Some(chars) = self.lookup_chars {
            lookup = lookup.with_doc_content_chars_max(chars);
        }
        let mut save = SaveTool::new();
        if let Some(path) = self.output_path {
            save = save.with_destination(path);
        }
        let mut tools = ToolRegistry::default()
            .with_tool(SearchTool::new())
            .with_tool(lookup)
            .with_tool(save);
        for register in self.custom_tools {
            register(&mut tools);
        }

        let agent = self.agent_builder.with_tools(Arc::new(tools)).build();
        Researcher { agent }
    }
}

/// The result of a successful research run.
#[derive(Clone, Debug)]
pub struct Research {
    /// The validated answer.
    pub record: ResearchRecord,
    /// The tool steps that led to it.
    pub trace: Trace,
    /// Model rounds used.
    pub rounds: usize,
}

/// A research assistant: an agent with the research tools whose final
/// answer is checked against the [`ResearchRecord`] schema.
///
/// The researcher is basically a wrapper around [`Agent`], and like the
/// agent it can serve concurrent queries.
pub struct Researcher {
    agent: Agent,
}

impl Researcher {
    /// Researches `query` and validates the answer.
    pub async fn research(&self, query: &str) -> Result<Research, ResearchError> {
        let outcome = self.agent.run(query).await?;
        let record = ResearchRecord::parse(&outcome.output).inspect_err(|err| {
            warn!("final answer rejected: {err}");
        })?;
        info!("research finished in {} rounds", outcome.rounds);
        Ok(Research {
            record,
            trace: outcome.trace,
            rounds: outcome.rounds,
        })
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}
