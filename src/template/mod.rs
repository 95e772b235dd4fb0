//! Prompt templates and rendering
//!
//! Templates use `{{ name }}` placeholders. A template's required variables
//! are the ones it declares, or every placeholder when it declares none.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{OnceLock, RwLock};
use thiserror::Error;

/// Template rendering failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Missing variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),
}

/// Renders a template by ID with a set of variables
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, TemplateError>;
}

/// A stored prompt template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Template body with `{{ variable }}` placeholders
    pub content: String,

    /// Declared variables; empty means "every placeholder"
    #[serde(default)]
    pub variables: Vec<String>,
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

impl PromptTemplate {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            content: content.into(),
            variables: Vec::new(),
        }
    }

    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = variables.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Placeholder names appearing in the content, sorted and deduplicated
    pub fn placeholders(&self) -> Vec<String> {
        placeholder_regex()
            .captures_iter(&self.content)
            .map(|c| c[1].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn required_variables(&self) -> Vec<String> {
        if self.variables.is_empty() {
            self.placeholders()
        } else {
            self.variables.clone()
        }
    }

    /// Substitute variables; unknown placeholders render empty
    pub fn render(&self, variables: &HashMap<String, String>) -> Result<String, TemplateError> {
        let missing: Vec<String> = self
            .required_variables()
            .into_iter()
            .filter(|v| !variables.contains_key(v))
            .collect();

        if !missing.is_empty() {
            return Err(TemplateError::MissingVariables(missing));
        }

        let rendered = placeholder_regex().replace_all(&self.content, |caps: &regex::Captures| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }
}

/// In-memory template registry
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: RwLock<HashMap<String, PromptTemplate>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template
    pub fn register(&self, template: PromptTemplate) {
        let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
        templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, id: &str) -> Option<PromptTemplate> {
        let templates = self.templates.read().unwrap_or_else(|e| e.into_inner());
        templates.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateRenderer for TemplateStore {
    fn render(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, TemplateError> {
        let template = self
            .get(template_id)
            .ok_or_else(|| TemplateError::NotFound(template_id.to_string()))?;
        template.render(variables)
    }
}
