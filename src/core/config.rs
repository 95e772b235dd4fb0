//! Pipeline configuration from YAML or JSON files

use crate::core::{validation, Edge, Node, PipelineDefinition};
use crate::template::{PromptTemplate, TemplateStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for the simulated executor delay
pub const MAX_SIMULATED_DELAY_MS: u64 = 5_000;

/// Top-level pipeline file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline ID (defaults to the name)
    #[serde(default)]
    pub id: Option<String>,

    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub edges: Vec<Edge>,

    /// Prompt templates referenced by prompt nodes
    #[serde(default)]
    pub templates: Vec<PromptTemplate>,

    /// Engine settings
    #[serde(default)]
    pub settings: EngineSettings,
}

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum nodes running at once within a wave (None = unbounded)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Artificial delay of simulated node types
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,
}

fn default_simulated_delay_ms() -> u64 {
    100
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            simulated_delay_ms: default_simulated_delay_ms(),
        }
    }
}

impl EngineSettings {
    /// Simulated delay, capped at [`MAX_SIMULATED_DELAY_MS`]
    pub fn simulated_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.simulated_delay_ms.min(MAX_SIMULATED_DELAY_MS))
    }
}

impl PipelineConfig {
    /// Load a pipeline file; `.json` files are parsed as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.check_templates()?;
        Ok(config)
    }

    /// Parse pipeline configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.check_templates()?;
        Ok(config)
    }

    fn check_templates(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for template in &self.templates {
            if !seen.insert(&template.id) {
                anyhow::bail!("Duplicate template ID: {}", template.id);
            }
        }
        Ok(())
    }

    /// Structural validation of the graph (edges and cycles)
    pub fn validate(&self) -> validation::ValidationResult {
        validation::validate(&self.to_pipeline())
    }

    /// Convert config to a pipeline definition
    pub fn to_pipeline(&self) -> PipelineDefinition {
        PipelineDefinition {
            id: self.id.clone().unwrap_or_else(|| self.name.clone()),
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Template store holding the file's templates
    pub fn template_store(&self) -> TemplateStore {
        let store = TemplateStore::new();
        for template in &self.templates {
            store.register(template.clone());
        }
        store
    }
}
