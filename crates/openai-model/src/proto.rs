use research_agent_model::{ModelMessage, ModelRequest, ModelTool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub r#type: Option<String>,
    pub function: Option<FunctionToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub reasoning_content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    stream: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

// -----------
// Conversions
// -----------

pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let tools: Vec<_> = req.tools.iter().map(create_tool).collect();
    // The field is rejected by the API when no tools are sent.
    let parallel_tool_calls =
        (!tools.is_empty()).then_some(config.parallel_tool_calls);
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools,
        parallel_tool_calls,
        stream_options: Some(StreamOptions {
            include_usage: true,
        }),
        stream: true,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: Some(content.clone()),
            tool_calls: None,
            reasoning_content: None,
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
        ModelMessage::Opaque(opaque_message) => {
            // Opaque messages from this provider always hold a `Message`.
            match opaque_message.to_raw::<Message>() {
                Some(msg) => msg.clone(),
                None => {
                    warn!("foreign opaque message: {opaque_message:?}");
                    Message::Assistant {
                        content: None,
                        tool_calls: None,
                        reasoning_content: None,
                    }
                }
            }
        }
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use research_agent_model::{OpaqueMessage, ToolCallResult};
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    fn search_tool() -> ModelTool {
        ModelTool {
            name: "search".to_owned(),
            description: "Search the web.".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": { "input": { "type": "string" } },
                "required": ["input"]
            }),
        }
    }

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System("You are a research assistant.".to_owned()),
                ModelMessage::User("Capital of France?".to_owned()),
            ],
            tools: vec![search_tool()],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let expected = ChatCompletionRequest {
            model: "custom".to_owned(),
            messages: vec![
                Message::System {
                    content: "You are a research assistant.".to_owned(),
                },
                Message::User {
                    content: "Capital of France?".to_owned(),
                },
            ],
            tools: vec![Tool {
                r#type: "function",
                function: FunctionTool {
                    name: "search".to_owned(),
                    description: "Search the web.".to_owned(),
                    parameters: search_tool().parameters,
                },
            }],
            parallel_tool_calls: Some(false),
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            stream: true,
        };
        assert_eq!(create_request(&request, &config), expected);
    }

    #[test]
    fn test_replays_tool_round() {
        let assistant = Message::Assistant {
            content: None,
            tool_calls: Some(vec![ToolCall {
                index: Some(0),
                id: Some("call_1".to_owned()),
                r#type: Some("function".to_owned()),
                function: Some(FunctionToolCall {
                    name: Some("search".to_owned()),
                    arguments: Some(r#"{"input":"France"}"#.to_owned()),
                }),
            }]),
            reasoning_content: None,
        };
        let request = ModelRequest {
            messages: vec![
                ModelMessage::Opaque(OpaqueMessage::new(
                    "chatcmpl-1",
                    assistant.clone(),
                )),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: "Paris is the capital.".to_owned(),
                }),
            ],
            tools: vec![],
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        let body =
            serde_json::to_value(create_request(&request, &config)).unwrap();

        assert_eq!(body["messages"][0], serde_json::to_value(&assistant).unwrap());
        assert_eq!(
            body["messages"][1],
            json!({
                "role": "tool",
                "tool_call_id": "call_1",
                "content": "Paris is the capital."
            })
        );
        assert!(body.get("tools").is_none());
        assert!(body.get("parallel_tool_calls").is_none());
    }
}
