//! Test: Prompt nodes - template rendering, LLM calls and output shaping

use crate::helpers::*;
use agentflow::execution::ExecutionEvent;
use agentflow::llm::EchoLlmProvider;
use serde_json::json;
use std::time::Duration;

const EXTRACT: &str = r#"
name: "Extract entities"
id: extract
settings:
  simulated_delay_ms: 0
templates:
  - id: extract
    name: Entity extraction
    content: "In a {{ tone }} way, list the people in: {{ text }}"
    variables: [tone, text]
nodes:
  - id: request
    type: input
    description: document
  - id: entities
    type: prompt
    config:
      templateId: extract
      inputMapping:
        text: request
      variables:
        tone: terse
      outputFields: [people]
edges:
  - { id: e1, source: request, target: entities }
"#;

/// Mapped and static variables reach the prompt; JSON output is projected
#[tokio::test]
async fn test_prompt_node_renders_and_shapes_output() {
    let llm = MockLlm::new(vec![
        "```json\n{\"people\": [\"Ada\", \"Grace\"], \"places\": [\"London\"]}\n```",
    ]);
    let prompts = llm.prompts();

    let result = run_config(&config(EXTRACT), json!("Ada met Grace in London"), llm).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.final_output(), Some(&json!({"people": ["Ada", "Grace"]})));

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(
        prompts[0],
        "In a terse way, list the people in: Received input (document): Ada met Grace in London"
    );
}

/// Token usage and model reach both the event and the record
#[tokio::test]
async fn test_prompt_metadata_is_reported() {
    let llm = MockLlm::new(vec!["{\"people\": []}"]).with_delay(Duration::from_millis(20));

    let result = run_config(&config(EXTRACT), json!("nobody here"), llm).await;

    assert_pipeline_completed(&result);
    let metadata = &result.record().node_result("entities").unwrap().metadata;
    assert!(metadata.duration_ms >= 20);
    assert_eq!(metadata.model.as_deref(), Some("mock"));
    assert_eq!(metadata.token_usage.unwrap().total_tokens, 15);

    let event_metadata = result
        .events
        .iter()
        .find_map(|e| match e {
            ExecutionEvent::NodeComplete {
                node_id, metadata, ..
            } if node_id == "entities" => Some(metadata.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(&event_metadata, metadata);
}

/// Plain text completions are kept as strings
#[tokio::test]
async fn test_plain_text_completion() {
    let yaml = r#"
name: "Echo"
templates:
  - id: say
    content: "Say: {{ input }}"
nodes:
  - id: speak
    type: prompt
    config:
      templateId: say
"#;

    let result = run_config(&config(yaml), json!("hello there"), EchoLlmProvider).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.final_output(), Some(&json!("Say: hello there")));
}

/// A structured run input is mapped by dotted path
#[tokio::test]
async fn test_structured_input_mapping() {
    let yaml = r#"
name: "Greeting"
templates:
  - id: greet
    content: "Hello {{ name }} from {{ city }}"
nodes:
  - id: greet
    type: prompt
    config:
      templateId: greet
      inputMapping:
        name: user.name
        city: user.address.city
"#;

    let llm = MockLlm::new(vec!["hi"]);
    let prompts = llm.prompts();
    let input = json!({"user": {"name": "Lin", "address": {"city": "Oslo"}}});

    let result = run_config(&config(yaml), input, llm).await;

    assert_pipeline_completed(&result);
    assert_eq!(prompts.lock().unwrap()[0], "Hello Lin from Oslo");
    assert_eq!(result.final_output(), Some(&json!("hi")));
}
