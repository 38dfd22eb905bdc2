use std::future::ready;

use research_agent::core::tool::ToolResult;
use research_agent::core::{AgentError, OutputError, Tool, Violation};
use research_agent::{ResearchError, ResearcherBuilder};
use research_agent_test_model::{PresetResponse, TestModelProvider};
use serde_json::json;
use tempfile::TempDir;

/// Answers every query from a fixed page, so tests never touch the network.
struct StubSearch;

impl Tool for StubSearch {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for information."
    }

    fn execute(
        &self,
        _input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok("Paris is the capital and largest city of France. \
                  (en.wikipedia.org/wiki/Paris)"
            .to_owned()))
    }
}

fn final_answer() -> String {
    json!({
        "topic": "Capital of France",
        "summary": "Paris is the capital of France.",
        "sources": ["en.wikipedia.org/wiki/Paris"],
        "tools_used": ["search", "save"]
    })
    .to_string()
}

#[tokio::test]
async fn test_search_then_save() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("research_output.txt");

    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_1",
        "search",
        "capital of France",
    ));
    model_provider.add_response(PresetResponse::tool_call(
        "call_2",
        "save",
        "Paris is the capital of France.",
    ));
    model_provider.add_response(PresetResponse::text(format!(
        "```json\n{}\n```",
        final_answer()
    )));

    let researcher = ResearcherBuilder::with_model_provider(model_provider.clone())
        .with_tool(StubSearch)
        .with_output_path(&output)
        .build();
    let research = researcher
        .research("Capital of France, then save.")
        .await
        .unwrap();

    let record = &research.record;
    assert_eq!(record.topic(), "Capital of France");
    assert_eq!(record.summary(), "Paris is the capital of France.");
    assert_eq!(record.sources(), ["en.wikipedia.org/wiki/Paris"]);
    assert_eq!(record.tools_used(), ["search", "save"]);
    assert_eq!(research.rounds, 3);

    let actions: Vec<_> =
        research.trace.steps().map(|step| step.action.as_str()).collect();
    assert_eq!(actions, ["search", "save"]);
    let save_step = research.trace.last_step().unwrap();
    assert_eq!(
        save_step.observation,
        format!("Data saved to {}", output.display())
    );

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.matches("--- Research Output ---").count(), 1);
    assert!(content.ends_with("\n\nParis is the capital of France.\n\n"));

    // The model saw the tool catalog in registration order.
    let requests = model_provider.requests();
    assert_eq!(requests.len(), 3);
    let names: Vec<_> =
        requests[0].tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, ["search", "lookup", "save"]);
}

#[tokio::test]
async fn test_malformed_answer() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text(
        json!({ "topic": "Capital of France", "summary": "Paris." }).to_string(),
    ));

    let researcher = ResearcherBuilder::with_model_provider(model_provider)
        .with_tool(StubSearch)
        .build();
    let err = researcher.research("Capital of France?").await.unwrap_err();

    let ResearchError::Output(OutputError::SchemaViolation { violation, .. }) =
        &err
    else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(*violation, Violation::MissingField("sources"));
    assert!(err.raw_output().unwrap().contains("Paris."));
}

#[tokio::test]
async fn test_prose_answer() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Paris, obviously."));

    let researcher = ResearcherBuilder::with_model_provider(model_provider)
        .with_tool(StubSearch)
        .build();
    let err = researcher.research("Capital of France?").await.unwrap_err();
    assert!(matches!(
        err,
        ResearchError::Output(OutputError::Decode { .. })
    ));
    assert_eq!(err.raw_output(), Some("Paris, obviously."));
}

#[tokio::test]
async fn test_never_finishes() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call("call", "search", "q"));
    model_provider.repeat_last();

    let researcher = ResearcherBuilder::with_model_provider(model_provider.clone())
        .with_tool(StubSearch)
        .with_max_rounds(2)
        .build();
    let err = researcher.research("Capital of France?").await.unwrap_err();
    assert!(matches!(
        err,
        ResearchError::Agent(AgentError::MaxIterationsExceeded { rounds: 2, .. })
    ));
    assert!(err.raw_output().is_some_and(|raw| !raw.is_empty()));
    assert_eq!(model_provider.requests().len(), 2);
}
