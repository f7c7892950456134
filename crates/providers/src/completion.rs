//! Completion port backed by any [`Provider`].
//!
//! `generate` is a plain chat completion. `classify` asks the model for a
//! JSON object matching a schema and validates what comes back.

use async_trait::async_trait;
use serde_json::Value;
use slotflow_core::completion::{CompletionPort, Prompt};
use slotflow_core::error::CompletionError;
use slotflow_core::provider::{ChatMessage, Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, trace};

/// Adapts a chat provider to the text completion port.
pub struct ProviderCompletionPort {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    classify_temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderCompletionPort {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            classify_temperature: 0.0,
            max_tokens: None,
        }
    }

    /// Take model, temperatures and token limit from the app config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &slotflow_config::AppConfig) -> Self {
        Self::new(provider, config.effective_model())
            .with_temperature(config.default_temperature)
            .with_classify_temperature(config.routing.classify_temperature)
            .with_max_tokens(config.default_max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_classify_temperature(mut self, temperature: f32) -> Self {
        self.classify_temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    async fn send(
        &self,
        system: String,
        human: String,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let mut request = ProviderRequest::new(
            &self.model,
            vec![ChatMessage::system(system), ChatMessage::user(human)],
        )
        .with_temperature(temperature);
        request.max_tokens = self.max_tokens;

        trace!(provider = self.provider.name(), ?request, "Completion request");
        let response = self.provider.complete(request).await?;
        if let Some(usage) = response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion finished"
            );
        }
        Ok(response.content)
    }
}

#[async_trait]
impl CompletionPort for ProviderCompletionPort {
    async fn generate(&self, prompt: &Prompt) -> Result<String, CompletionError> {
        let text = self
            .send(prompt.render_system(), prompt.render_human(), self.temperature)
            .await?;
        Ok(text.trim().to_string())
    }

    async fn classify(&self, prompt: &Prompt, output_schema: &Value) -> Result<Value, CompletionError> {
        let system = format!("{}\n\n{}", prompt.render_system(), format_instructions(output_schema));
        let raw = self
            .send(system, prompt.render_human(), self.classify_temperature)
            .await?;

        let value = parse_json_object(&raw)?;
        check_required(&value, output_schema, &raw)?;
        Ok(value)
    }
}

fn format_instructions(schema: &Value) -> String {
    let schema_text = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "Respond with a single JSON object that conforms to this JSON schema:\n{schema_text}\n\
         Output only the JSON object, with no explanation and no code fences."
    )
}

/// Remove a surrounding Markdown code fence, if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Byte range of the first balanced `{...}` in `text`.
fn first_object_span(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_json_object(raw: &str) -> Result<Value, CompletionError> {
    let body = strip_code_fences(raw);
    let (start, end) = first_object_span(body)
        .ok_or_else(|| CompletionError::parse("no JSON object in output", raw))?;

    let value: Value = serde_json::from_str(&body[start..end])
        .map_err(|e| CompletionError::parse(format!("invalid JSON: {e}"), raw))?;

    if !value.is_object() {
        return Err(CompletionError::parse("output is not a JSON object", raw));
    }
    Ok(value)
}

fn check_required(value: &Value, schema: &Value, raw: &str) -> Result<(), CompletionError> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    for key in required.iter().filter_map(Value::as_str) {
        if value.get(key).is_none() {
            return Err(CompletionError::parse(
                format!("missing required key '{key}'"),
                raw,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotflow_core::error::ProviderError;
    use slotflow_core::provider::{ChatRole, ProviderResponse};
    use std::sync::Mutex;

    struct CannedProvider {
        reply: Result<String, ProviderError>,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    impl CannedProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().map(|content| ProviderResponse {
                content,
                usage: None,
                model: "canned-model".into(),
            })
        }
    }

    fn intent_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "intent": {"type": "string"},
                "confidence": {"type": "number"},
                "reasoning": {"type": "string"}
            },
            "required": ["intent", "confidence", "reasoning"]
        })
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn finds_first_object_with_braces_in_strings() {
        let text = r#"Sure! {"reasoning": "user typed {field_a}", "n": {"x": 1}} trailing {"b": 2}"#;
        let value = parse_json_object(text).unwrap();
        assert_eq!(value["reasoning"], "user typed {field_a}");
        assert_eq!(value["n"]["x"], 1);
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let err = parse_json_object("I think it is alpha").unwrap_err();
        match err {
            CompletionError::Parse { raw, .. } => assert_eq!(raw, "I think it is alpha"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn classify_parses_and_checks_required_keys() {
        let provider = CannedProvider::replying(
            "```json\n{\"intent\": \"alpha\", \"confidence\": 0.92, \"reasoning\": \"field_a\"}\n```",
        );
        let port = ProviderCompletionPort::new(provider.clone(), "gpt-4o-mini");
        let prompt = Prompt::new("Route {input}", "{input}").var("input", "field_a = 7");

        let value = port.classify(&prompt, &intent_schema()).await.unwrap();
        assert_eq!(value["intent"], "alpha");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].messages[0].role, ChatRole::System);
        assert!(seen[0].messages[0].content.starts_with("Route field_a = 7"));
        assert!(seen[0].messages[0].content.contains("\"required\""));
        assert_eq!(seen[0].messages[1].content, "field_a = 7");
        assert_eq!(seen[0].temperature, 0.0);
    }

    #[tokio::test]
    async fn classify_missing_key_is_parse_error() {
        let provider = CannedProvider::replying(r#"{"intent": "alpha"}"#);
        let port = ProviderCompletionPort::new(provider, "m");
        let err = port
            .classify(&Prompt::new("s", "h"), &intent_schema())
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Parse { .. }));
        assert!(err.to_string().contains("confidence"));
    }

    #[tokio::test]
    async fn generate_trims_and_uses_reply_temperature() {
        let provider = CannedProvider::replying("  What is field_b?\n");
        let port = ProviderCompletionPort::new(provider.clone(), "m").with_temperature(0.4);
        let text = port.generate(&Prompt::new("s", "h")).await.unwrap();
        assert_eq!(text, "What is field_b?");
        assert!((provider.seen.lock().unwrap()[0].temperature - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn transport_failure_is_provider_error() {
        let provider = Arc::new(CannedProvider {
            reply: Err(ProviderError::Network("connection refused".into())),
            seen: Mutex::new(Vec::new()),
        });
        let port = ProviderCompletionPort::new(provider, "m");
        let err = port.generate(&Prompt::new("s", "h")).await.unwrap_err();
        assert!(matches!(err, CompletionError::Provider(ProviderError::Network(_))));
    }

    #[test]
    fn from_config_copies_settings() {
        let mut config = slotflow_config::AppConfig::default();
        config.default_model = "llama3".into();
        let port = ProviderCompletionPort::from_config(CannedProvider::replying(""), &config);
        assert_eq!(port.model, "llama3");
        assert_eq!(port.max_tokens, Some(config.default_max_tokens));
    }

    #[test]
    fn from_config_prefers_provider_model() {
        let mut config = slotflow_config::AppConfig::default();
        config.providers.insert(
            config.default_provider.clone(),
            slotflow_config::ProviderConfig {
                default_model: Some("gpt-4o".into()),
                ..Default::default()
            },
        );
        let port = ProviderCompletionPort::from_config(CannedProvider::replying(""), &config);
        assert_eq!(port.model, "gpt-4o");
    }
}
