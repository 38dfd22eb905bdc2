use std::collections::HashMap;
use std::pin::Pin;

use research_agent_model::ModelTool;
use serde_json::Value;

use crate::tool::{AnyTool, Error, Tool, ToolInput, ToolObject, ToolResult};

/// The fixed set of tools offered to the model.
///
/// Build it once, then share it (usually through an `Arc`) with every run.
/// Tools keep their registration order, which is also the order of the
/// catalog sent to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Adds a tool. A tool with the same name replaces the earlier one,
    /// keeping its position.
    pub fn register<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        let tool: Box<dyn ToolObject> = Box::new(AnyTool(tool));
        match self.index.get(&name) {
            Some(&idx) => {
                debug!("replacing tool: {name}");
                self.tools[idx] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Adds a tool, builder style.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Finds a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn ToolObject> {
        let idx = *self.index.get(name)?;
        self.tools.get(idx).map(|tool| &**tool)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    /// The tool catalog for a model request.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .iter()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: ToolInput::schema().clone(),
            })
            .collect()
    }

    /// Calls the named tool with the model-supplied arguments.
    pub fn invoke(
        &self,
        name: &str,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let Some(tool) = self.lookup(name) else {
            warn!("tool not found: {name}");
            let available = self.names().collect::<Vec<_>>().join(", ");
            let err = Error::not_found().with_reason(format!(
                "{name} is not a valid tool, try one of [{available}]."
            ));
            return Box::pin(std::future::ready(Err(err)));
        };
        trace!("invoking tool {name} with args: {arguments:?}");
        tool.execute(arguments)
    }

    /// Returns the number of tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if there are no tools.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
