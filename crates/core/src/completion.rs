//! Text completion port: the abstract capability every handler talks to.
//!
//! Handlers never see a provider directly. They build a [`Prompt`] and ask
//! the port either for free text (`generate`) or for a JSON value that
//! conforms to an output schema (`classify`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// A two-part prompt with `{name}` placeholders filled from `variables`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub human: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl Prompt {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            human: human.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Bind a template variable.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Rendered system part.
    pub fn render_system(&self) -> String {
        render(&self.system, &self.variables)
    }

    /// Rendered human part.
    pub fn render_human(&self) -> String {
        render(&self.human, &self.variables)
    }
}

/// Substitute `{name}` placeholders. Unknown placeholders are left as-is so
/// literal braces (JSON examples, schemas) survive rendering.
fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if variables.contains_key(&after[..close]) => {
                out.push_str(&variables[&after[..close]]);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The external natural-language capability.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// Produce free text for the prompt.
    async fn generate(&self, prompt: &Prompt) -> Result<String, CompletionError>;

    /// Produce a JSON value conforming to `output_schema`.
    ///
    /// Returns `CompletionError::Parse` when the backend answers with
    /// something that is not a conforming JSON object.
    async fn classify(
        &self,
        prompt: &Prompt,
        output_schema: &serde_json::Value,
    ) -> Result<serde_json::Value, CompletionError>;
}
