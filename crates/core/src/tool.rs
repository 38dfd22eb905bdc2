//! Tools the model can call.

mod error;
mod registry;

use std::pin::Pin;
use std::sync::LazyLock;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use registry::ToolRegistry;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Every tool takes one text input and produces one text output. The
/// function-calling parameters are the same for all tools (see
/// [`ToolInput`]), so implementations only describe what the input means.
///
/// Tools are shared by concurrent runs, so they should behave like
/// stateless objects. Anything a tool needs (an HTTP client, a file path)
/// should be set up at construction and cloned into each execution.
pub trait Tool: Send + Sync + 'static {
    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool, shown to the model.
    fn description(&self) -> &str;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// The arguments object of every tool call.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct ToolInput {
    /// The text input for the tool.
    pub input: String,
}

impl ToolInput {
    /// Extracts the input text from call arguments.
    ///
    /// Accepts `{"input": "<text>"}` or a bare JSON string.
    pub fn from_arguments(arguments: Value) -> Result<String, Error> {
        if let Value::String(input) = arguments {
            return Ok(input);
        }
        serde_json::from_value::<ToolInput>(arguments)
            .map(|args| args.input)
            .map_err(|err| Error::invalid_input().with_reason(err.to_string()))
    }

    /// The JSON schema of the arguments object.
    pub fn schema() -> &'static Value {
        static SCHEMA: LazyLock<Value> =
            LazyLock::new(|| schema_for!(ToolInput).to_value());
        &SCHEMA
    }
}

/// A type-erased [`Tool`], as stored in a [`ToolRegistry`].
pub trait ToolObject: Send + Sync + 'static {
    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Decodes the call arguments and executes the tool.
    fn execute(
        &self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;

    /// Executes the tool with a plain text input.
    #[inline]
    fn invoke(
        &self,
        input: String,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        self.execute(Value::String(input))
    }
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    fn execute(
        &self,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        match ToolInput::from_arguments(arguments) {
            Ok(input) => Box::pin(self.0.execute(input)),
            Err(err) => Box::pin(std::future::ready(Err(err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_input_from_arguments() {
        assert_eq!(
            ToolInput::from_arguments(json!({ "input": "q" })).unwrap(),
            "q"
        );
        assert_eq!(ToolInput::from_arguments(json!("q")).unwrap(), "q");

        for bad in [json!({}), json!({ "input": 1 }), json!(null), json!([])] {
            let err = ToolInput::from_arguments(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_input_schema() {
        let schema = ToolInput::schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["input"]["type"], "string");
        assert_eq!(schema["required"], json!(["input"]));
    }
}
