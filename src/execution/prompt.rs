//! Prompt executor - renders a template and calls the LLM

use crate::{
    core::Node,
    execution::executor::{input_text, NodeContext, NodeError, NodeExecutor, NodeOutput},
    llm::{CompletionOptions, LlmProvider},
    persistence::NodeMetadata,
    template::TemplateRenderer,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Node type handled by [`PromptExecutor`]
pub const PROMPT_NODE_TYPE: &str = "prompt";

/// Variable holding the whole input when it is not structured
pub const INPUT_VARIABLE: &str = "input";

/// Configuration of a prompt node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptNodeConfig {
    #[serde(alias = "templateId")]
    pub template_id: String,

    /// Template variable -> dotted field path in a structured input
    #[serde(default, alias = "inputMapping")]
    pub input_mapping: BTreeMap<String, String>,

    /// Static variables, used when the input does not provide them
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Fields kept from a structured completion
    #[serde(default, alias = "outputFields")]
    pub output_fields: Vec<String>,

    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, alias = "stopSequences")]
    pub stop_sequences: Vec<String>,
}

fn default_max_tokens() -> u32 {
    CompletionOptions::default().max_tokens
}

fn default_temperature() -> f32 {
    CompletionOptions::default().temperature
}

impl PromptNodeConfig {
    pub fn from_node(node: &Node) -> Result<Self, NodeError> {
        serde_json::from_value(node.config.clone())
            .map_err(|e| NodeError::InvalidConfig(format!("node '{}': {}", node.id, e)))
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop_sequences: self.stop_sequences.clone(),
        }
    }
}

/// Executes `prompt` nodes
pub struct PromptExecutor {
    templates: Arc<dyn TemplateRenderer>,
    llm: Arc<dyn LlmProvider>,
}

impl PromptExecutor {
    pub fn new(templates: Arc<dyn TemplateRenderer>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { templates, llm }
    }
}

#[async_trait]
impl NodeExecutor for PromptExecutor {
    fn name(&self) -> &str {
        PROMPT_NODE_TYPE
    }

    fn can_execute(&self, node: &Node) -> bool {
        node.node_type == PROMPT_NODE_TYPE
    }

    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let started = Instant::now();
        let config = PromptNodeConfig::from_node(node)?;

        let variables = extract_variables(input, &config);
        let prompt = self.templates.render(&config.template_id, &variables)?;
        debug!("Rendered prompt for node {}: {}", node.id, prompt);

        let completion = self
            .llm
            .complete(&prompt, &config.completion_options())
            .await?;

        info!(
            "Prompt node {} completed with model '{}' ({} chars)",
            node.id,
            completion.model,
            completion.text.len()
        );

        let output = shape_output(&completion.text, &config.output_fields);
        let metadata = NodeMetadata {
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            token_usage: completion.usage,
            model: (!completion.model.is_empty()).then_some(completion.model),
            error: None,
        };

        Ok(NodeOutput::new(output).with_metadata(metadata))
    }
}

/// Object view of an input: objects directly, strings holding a JSON object
fn as_structured(input: &Value) -> Option<Map<String, Value>> {
    match input {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

fn lookup<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Template variables for a prompt node.
///
/// A structured input contributes only the mapped fields; with no mapping,
/// or with unstructured input, the whole input becomes `input`. Static
/// variables fill whatever is still missing.
pub fn extract_variables(input: &Value, config: &PromptNodeConfig) -> HashMap<String, String> {
    let mut variables = HashMap::new();

    match as_structured(input) {
        Some(fields) if !config.input_mapping.is_empty() => {
            for (variable, path) in &config.input_mapping {
                if let Some(value) = lookup(&fields, path) {
                    variables.insert(variable.clone(), input_text(value));
                }
            }
        }
        _ => {
            variables.insert(INPUT_VARIABLE.to_string(), input_text(input));
        }
    }

    for (key, value) in &config.variables {
        variables
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    variables
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Parse a completion as JSON and keep the configured fields; raw text otherwise
pub fn shape_output(text: &str, output_fields: &[String]) -> Value {
    let parsed = match serde_json::from_str::<Value>(strip_code_fence(text)) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => return Value::String(text.to_string()),
    };

    match parsed {
        Value::Object(map) if !output_fields.is_empty() => {
            let projected: Map<String, Value> = output_fields
                .iter()
                .filter_map(|field| map.get(field).map(|v| (field.clone(), v.clone())))
                .collect();
            Value::Object(projected)
        }
        other => other,
    }
}
